use crate::error::{Result, SlackMcpError};
use crate::slack::api::{
    ChannelsPage, ChannelsPageRequest, HistoryPage, HistoryRequest, SlackApi, UsersPage,
};
use crate::slack::{
    AuthTestResponse, ResponseMetadata, SlackChannel, SlackMessage, SlackUser,
};
use crate::transport::HttpTransport;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const SLACK_API_BASE: &str = "https://slack.com/api/";

/// Every Slack response carries `ok`, and `error` when `ok` is false.
#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsListResponse {
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct ConversationsHistoryResponse {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<SlackUser>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

/// Slack web API client speaking form-encoded POSTs through a pluggable transport.
pub struct SlackWebClient {
    transport: Arc<dyn HttpTransport>,
    token: String,
    api_base: String,
}

impl SlackWebClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: impl Into<String>) -> Self {
        Self {
            transport,
            token: token.into(),
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        if !self.api_base.ends_with('/') {
            self.api_base.push('/');
        }
        self
    }

    /// Rebind to a workspace endpoint such as `https://acme.slack.com/`
    pub fn with_team_url(self, team_url: &str) -> Self {
        let root = team_url.trim_end_matches('/');
        self.with_api_base(format!("{root}/api/"))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Validate the session credentials
    pub async fn auth_test(&self) -> Result<AuthTestResponse> {
        self.call("auth.test", Vec::new()).await
    }

    /// Form-encoded POST to `method`. The transport owns the only HTTP client.
    fn build_request(&self, method: &str, form: &[(&str, String)]) -> Result<Request> {
        let url = Url::parse(&format!("{}{}", self.api_base, method)).map_err(|e| {
            SlackMcpError::Config(format!("Invalid Slack API URL {}{method}: {e}", self.api_base))
        })?;
        let body = serde_urlencoded::to_string(form)
            .map_err(|e| SlackMcpError::Internal(format!("Failed to encode {method} form: {e}")))?;

        let mut request = Request::new(Method::POST, url);
        request.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        *request.body_mut() = Some(body.into());
        Ok(request)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<T> {
        let mut form = vec![("token", self.token.clone())];
        form.extend(params);

        let request = self.build_request(method, &form)?;

        tracing::debug!(method = %method, "Calling Slack API");
        let response = self.transport.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackMcpError::SlackApi(format!(
                "{method} returned HTTP {status}"
            )));
        }

        let body = response.bytes().await?;
        let envelope: Envelope = serde_json::from_slice(&body)?;
        if !envelope.ok {
            let error = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(SlackMcpError::SlackApi(format!("{method}: {error}")));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn list_channels_page(&self, request: &ChannelsPageRequest) -> Result<ChannelsPage> {
        let types = request
            .types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut params = vec![("types", types), ("limit", request.limit.to_string())];
        if let Some(cursor) = request.cursor.as_ref().filter(|c| !c.is_empty()) {
            params.push(("cursor", cursor.clone()));
        }

        let response: ConversationsListResponse = self.call("conversations.list", params).await?;
        Ok(ChannelsPage {
            channels: response.channels,
            next_cursor: response.response_metadata.next_cursor,
        })
    }

    async fn history_page(&self, request: &HistoryRequest) -> Result<HistoryPage> {
        let mut params = vec![
            ("channel", request.channel.as_str().to_string()),
            ("limit", request.limit.to_string()),
            ("inclusive", "false".to_string()),
        ];
        if let Some(oldest) = &request.oldest {
            params.push(("oldest", oldest.clone()));
        }
        if let Some(cursor) = request.cursor.as_ref().filter(|c| !c.is_empty()) {
            params.push(("cursor", cursor.clone()));
        }

        let response: ConversationsHistoryResponse =
            self.call("conversations.history", params).await?;
        Ok(HistoryPage {
            messages: response.messages,
            next_cursor: response.response_metadata.next_cursor,
            has_more: response.has_more,
        })
    }

    async fn list_users_page(&self, limit: u32, cursor: Option<&str>) -> Result<UsersPage> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            params.push(("cursor", cursor.to_string()));
        }

        let response: UsersListResponse = self.call("users.list", params).await?;
        Ok(UsersPage {
            users: response.members,
            next_cursor: response.response_metadata.next_cursor,
        })
    }
}
