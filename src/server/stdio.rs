use super::mcp::McpServer;
use crate::error::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Serve MCP over stdin/stdout until stdin closes.
pub async fn serve_stdio(server: Arc<McpServer>) -> Result<()> {
    tracing::info!("Serving MCP over stdio");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Newline-delimited JSON-RPC. Each frame is dispatched on its own task so a
/// slow tool call does not hold up the rest; replies are written as they finish.
pub async fn serve_lines<R, W>(server: Arc<McpServer>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut tx = Some(tx);
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line(), if tx.is_some() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if let Some(tx) = tx.clone() {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Some(reply) = server.handle_frame(&line).await {
                                let _ = tx.send(reply);
                            }
                        });
                    }
                }
                None => {
                    tracing::info!("stdin closed, finishing in-flight requests");
                    tx = None;
                }
            },
            Some(reply) = rx.recv() => {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            else => break,
        }
    }

    Ok(())
}
