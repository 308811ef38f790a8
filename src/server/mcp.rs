use super::tool::ToolHandler;
use super::types::{
    INVALID_PARAMS, INVALID_REQUEST, InitializeResult, JsonRpcMessage, JsonRpcResponse,
    METHOD_NOT_FOUND, McpToolDef, PARSE_ERROR, PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
    ToolsCallParams, ToolsCallResult, ToolsCapability, ToolsListResult,
};
use crate::config::ToolsConfig;
use crate::handler::{ChannelsHandler, ConversationsHandler};
use crate::logging::{Timer, log_error};
use crate::provider::ApiProvider;
use serde_json::Value;
use std::sync::Arc;

pub const SERVER_NAME: &str = "Slack MCP Server";

/// Tool registry and JSON-RPC dispatcher shared by every transport.
pub struct McpServer {
    tools: Vec<Arc<dyn ToolHandler>>,
}

impl McpServer {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Server with every Slack tool registered against one shared provider.
    pub fn with_slack_tools(provider: Arc<ApiProvider>, config: &ToolsConfig) -> Self {
        let mut channels = ChannelsHandler::new(provider.clone());
        if config.normalize_channel_text {
            channels = channels.with_normalized_text();
        }

        Self::new()
            .with_tool(Arc::new(ConversationsHandler::new(provider)))
            .with_tool(Arc::new(channels))
    }

    pub fn with_tool(mut self, tool: Arc<dyn ToolHandler>) -> Self {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(tool);
        self
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }

    /// Handle one raw frame. Returns the serialized reply, if the frame warrants one.
    pub async fn handle_frame(&self, frame: &str) -> Option<String> {
        let response = match serde_json::from_str::<JsonRpcMessage>(frame) {
            Ok(message) => self.handle_message(message).await?,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse JSON-RPC frame");
                JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("parse error: {e}"))
            }
        };

        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON-RPC response");
                None
            }
        }
    }

    /// Dispatch a parsed message. Notifications never get a response.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        let Some(id) = message.id.clone() else {
            tracing::debug!(method = %message.method, "Received notification");
            return None;
        };

        if message.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                format!("unsupported jsonrpc version {:?}", message.jsonrpc),
            ));
        }

        let response = match message.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, to_value(self.initialize_result())),
            "ping" => JsonRpcResponse::success(id, Value::Object(Default::default())),
            "tools/list" => JsonRpcResponse::success(id, to_value(self.tools_list())),
            "tools/call" => match message.params.map(serde_json::from_value::<ToolsCallParams>) {
                Some(Ok(params)) => self.call_tool(id, params).await,
                Some(Err(e)) => {
                    JsonRpcResponse::failure(id, INVALID_PARAMS, format!("invalid params: {e}"))
                }
                None => JsonRpcResponse::failure(id, INVALID_PARAMS, "missing params"),
            },
            other => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                logging: Some(Value::Object(Default::default())),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        }
    }

    fn tools_list(&self) -> ToolsListResult {
        ToolsListResult {
            tools: self
                .tools
                .iter()
                .map(|t| {
                    let def = t.definition();
                    McpToolDef {
                        name: def.name.into(),
                        description: def.description.into(),
                        input_schema: def.input_schema,
                    }
                })
                .collect(),
        }
    }

    async fn call_tool(&self, id: Value, params: ToolsCallParams) -> JsonRpcResponse {
        let Some(tool) = self.find_tool(&params.name) else {
            return JsonRpcResponse::failure(
                id,
                INVALID_PARAMS,
                format!("unknown tool: {}", params.name),
            );
        };

        let _timer = Timer::new(format!("tools/call {}", params.name));
        let result = match tool.call(params.arguments).await {
            Ok(text) => ToolsCallResult::text(text),
            Err(e) => {
                log_error(&format!("tools/call {}", params.name), &e);
                ToolsCallResult::error(e.to_string())
            }
        };
        JsonRpcResponse::success(id, to_value(result))
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Result, SlackMcpError};
    use crate::server::ToolDefinition;
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes its `text` argument; fails when `fail` is set.
    pub(crate) struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo",
                description: "Echo text back",
                input_schema: json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: Value) -> Result<String> {
            if arguments["fail"].as_bool().unwrap_or(false) {
                return Err(SlackMcpError::InvalidArgument("asked to fail".into()));
            }
            Ok(arguments["text"].as_str().unwrap_or_default().to_string())
        }
    }

    pub(crate) fn echo_server() -> McpServer {
        McpServer::new().with_tool(Arc::new(EchoTool))
    }

    async fn roundtrip(server: &McpServer, frame: Value) -> Value {
        let reply = server.handle_frame(&frame.to_string()).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let reply = roundtrip(
            &echo_server(),
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(reply["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(reply["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notifications_get_no_reply() {
        let server = echo_server();
        let reply = server
            .handle_frame(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let reply = echo_server().handle_frame("{not json").await.unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert!(reply["id"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let reply = roundtrip(
            &echo_server(),
            json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"}),
        )
        .await;
        assert_eq!(reply["id"], "a");
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tools_call_success_and_failure() {
        let server = echo_server();

        let ok = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"text": "hi"}}}),
        )
        .await;
        assert_eq!(ok["result"]["isError"], false);
        assert_eq!(ok["result"]["content"][0]["text"], "hi");

        let failed = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"fail": true}}}),
        )
        .await;
        assert_eq!(failed["result"]["isError"], true);
        assert!(
            failed["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("asked to fail")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_params() {
        let server = echo_server();

        let unknown = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await;
        assert_eq!(unknown["error"]["code"], INVALID_PARAMS);

        let missing = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call"}),
        )
        .await;
        assert_eq!(missing["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_slack_tools_registered() {
        let (_, provider) =
            crate::provider::tests::ready_provider(crate::provider::tests::FakeSlack::default())
                .await;
        let server = McpServer::with_slack_tools(provider, &ToolsConfig::default());
        assert_eq!(
            server.tool_names(),
            vec!["conversations_history", "channels_list"]
        );

        let list = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/list"}),
        )
        .await;
        let tools = list["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1]["inputSchema"]["required"][0], "channel_types");
    }

    #[tokio::test]
    async fn test_channels_list_through_dispatch() {
        let (_, provider) =
            crate::provider::tests::ready_provider(crate::provider::tests::FakeSlack::default())
                .await;
        let server = McpServer::with_slack_tools(provider, &ToolsConfig::default());

        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call",
                   "params": {"name": "channels_list", "arguments": {"channel_types": "bogus"}}}),
        )
        .await;
        assert_eq!(reply["result"]["isError"], true);

        let reply = roundtrip(
            &server,
            json!({"jsonrpc": "2.0", "id": 8, "method": "tools/call",
                   "params": {"name": "channels_list", "arguments": {"channel_types": "public_channel"}}}),
        )
        .await;
        assert_eq!(
            reply["result"]["content"][0]["text"],
            "ID,Name,Topic,Purpose,MemberCount,Cursor\n"
        );
    }

    #[tokio::test]
    async fn test_channel_text_setting_reaches_handler() {
        use crate::provider::tests::{FakeSlack, ready_provider};
        use crate::slack::{ChannelsPage, SlackChannel, SlackTextValue};

        let channel = SlackChannel {
            id: "C1".into(),
            name: "general".into(),
            topic: Some(SlackTextValue {
                value: "This is the Topic".into(),
            }),
            num_members: Some(2),
            ..Default::default()
        };
        let api = FakeSlack {
            channels: ChannelsPage {
                channels: vec![channel],
                next_cursor: String::new(),
            },
            ..Default::default()
        };
        let (_, provider) = ready_provider(api).await;
        let call = json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call",
                          "params": {"name": "channels_list",
                                     "arguments": {"channel_types": "public_channel"}}});

        let verbatim = McpServer::with_slack_tools(provider.clone(), &ToolsConfig::default());
        let reply = roundtrip(&verbatim, call.clone()).await;
        assert!(
            reply["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("C1,#general,This is the Topic,,2,")
        );

        let config = ToolsConfig {
            normalize_channel_text: true,
        };
        let normalized = McpServer::with_slack_tools(provider, &config);
        let reply = roundtrip(&normalized, call).await;
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("C1,#general,topic,,2,"));
    }
}
