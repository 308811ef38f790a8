mod auth;
mod mcp;
mod session;
mod sse;
mod stdio;
mod tool;
pub mod types;

pub use auth::{AuthDecision, Credential, UnauthorizedReason, authorize, require_api_key};
pub use mcp::{McpServer, SERVER_NAME};
pub use session::{SessionGuard, SessionId, SessionRegistry, generate_session_id};
pub use sse::{MESSAGE_PATH, SSE_PATH, SseState, router, serve_sse};
pub use stdio::{serve_lines, serve_stdio};
pub use tool::{ToolDefinition, ToolHandler, parse_arguments};
