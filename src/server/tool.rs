use crate::error::{Result, SlackMcpError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A tool exposed to MCP clients.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Handles one registered tool. Errors are reported to the caller as a tool
/// error result and never tear down the server.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, arguments: Value) -> Result<String>;
}

/// Decode tool arguments; a missing object counts as `{}`.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| SlackMcpError::InvalidArgument(e.to_string()))
}
