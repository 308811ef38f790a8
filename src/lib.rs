pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod provider;
pub mod server;
pub mod slack;
pub mod text;
pub mod transport;

pub use error::{Result, SlackMcpError};
