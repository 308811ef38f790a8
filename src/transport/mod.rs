//! Outbound HTTP transport and the session-cookie decorator.
//!
//! Slack's browser session API authenticates a request by the `d` cookie that
//! accompanies the `xoxc-` token. [`UserAgentTransport`] stamps that cookie pair
//! and a browser user-agent on every request before handing it to the wrapped
//! transport.

use crate::error::{Result, SlackMcpError};
use async_trait::async_trait;
use http::header::{COOKIE, HeaderValue, USER_AGENT};
use reqwest::{Request, Response};

/// Sends a fully built request. Errors and responses are returned verbatim.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response>;
}

/// Transport backed by a configured `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        Ok(self.client.execute(request).await?)
    }
}

/// Decorator that overwrites `User-Agent` and `Cookie` on every request.
///
/// The request is taken by value, so the caller's copy can never observe the
/// rewritten headers.
pub struct UserAgentTransport<T> {
    inner: T,
    user_agent: HeaderValue,
    cookie: HeaderValue,
}

impl<T: HttpTransport> UserAgentTransport<T> {
    pub fn new(inner: T, user_agent: &str, cookie: &str, ds_cookie: &str) -> Result<Self> {
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| SlackMcpError::Config(format!("Invalid user agent: {e}")))?;
        let cookie = HeaderValue::from_str(&format!("d={cookie};d-s={ds_cookie}"))
            .map_err(|e| SlackMcpError::Config(format!("Invalid session cookie: {e}")))?;

        Ok(Self {
            inner,
            user_agent,
            cookie,
        })
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for UserAgentTransport<T> {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        let headers = request.headers_mut();
        headers.insert(USER_AGENT, self.user_agent.clone());
        headers.insert(COOKIE, self.cookie.clone());

        self.inner.execute(request).await
    }
}
