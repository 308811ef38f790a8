use anyhow::Context;
use clap::{Parser, ValueEnum};
use slack_mcp_server::config::load_settings;
use slack_mcp_server::logging::init_tracing;
use slack_mcp_server::provider::ApiProvider;
use slack_mcp_server::server::{McpServer, serve_sse, serve_stdio};
use std::sync::Arc;
use tokio::signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    Stdio,
    Sse,
}

#[derive(Debug, Parser)]
#[command(name = "slack-mcp-server", version, about)]
struct Cli {
    /// Transport to serve MCP over
    #[arg(short, long, value_enum, env = "SLACK_MCP_TRANSPORT", default_value_t = Transport::Stdio)]
    transport: Transport,

    /// SSE bind host (overrides SLACK_MCP_HOST)
    #[arg(long)]
    host: Option<String>,

    /// SSE bind port (overrides SLACK_MCP_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();
    init_tracing();

    tracing::info!(transport = ?cli.transport, "Starting Slack MCP Server");

    let mut settings = load_settings().context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        settings.sse.host = host;
    }
    if let Some(port) = cli.port {
        settings.sse.port = port;
    }
    tracing::info!("Configuration loaded");

    let provider = Arc::new(ApiProvider::from_settings(&settings));
    match provider.provide().await {
        Ok(_) => tracing::info!("Slack provider ready"),
        Err(e) if e.is_fatal() => {
            return Err(anyhow::Error::new(e).context("Failed to connect to Slack"));
        }
        Err(e) => tracing::warn!(
            error = %e,
            "User directory unavailable, continuing with an empty directory"
        ),
    }

    let server = Arc::new(McpServer::with_slack_tools(provider, &settings.tools));

    match cli.transport {
        Transport::Stdio => {
            tokio::select! {
                result = serve_stdio(server) => result?,
                signal_name = shutdown_signal() => {
                    tracing::info!(signal = %signal_name, "Received shutdown signal");
                }
            }
        }
        Transport::Sse => {
            serve_sse(server, &settings.sse, async {
                let signal_name = shutdown_signal().await;
                tracing::info!(signal = %signal_name, "Received shutdown signal, draining connections");
            })
            .await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C), SIGTERM or SIGQUIT on Unix, Ctrl+C elsewhere
async fn shutdown_signal() -> String {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        ) else {
            tracing::warn!("Failed to install Unix signal handlers, listening for Ctrl+C only");
            let _ = signal::ctrl_c().await;
            return "Ctrl+C".to_string();
        };

        tokio::select! {
            _ = sigint.recv() => {
                tracing::debug!("Caught SIGINT signal");
                "SIGINT (Ctrl+C)".to_string()
            }
            _ = sigterm.recv() => {
                tracing::debug!("Caught SIGTERM signal");
                "SIGTERM".to_string()
            }
            _ = sigquit.recv() => {
                tracing::debug!("Caught SIGQUIT signal");
                "SIGQUIT".to_string()
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
        tracing::debug!("Caught Ctrl+C signal");
        "Ctrl+C".to_string()
    }
}
