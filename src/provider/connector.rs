use crate::config::{Settings, SlackConfig, TlsConfig};
use crate::error::{Result, SlackMcpError};
use crate::slack::{SlackApi, SlackWebClient};
use crate::transport::{HttpTransport, ReqwestTransport, UserAgentTransport};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces an authenticated Slack client. Runs at most once per provider.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn SlackApi>>;
}

/// Connects to the real Slack web API using browser session credentials.
pub struct WebConnector {
    slack: SlackConfig,
    tls: TlsConfig,
}

impl WebConnector {
    pub fn new(settings: &Settings) -> Self {
        Self {
            slack: settings.slack.clone(),
            tls: settings.tls.clone(),
        }
    }

    fn build_transport(&self) -> Result<Arc<dyn HttpTransport>> {
        let client = build_http_client(&self.tls)?;
        let transport = UserAgentTransport::new(
            ReqwestTransport::new(client),
            &self.slack.user_agent,
            &self.slack.cookie,
            &self.slack.ds_cookie,
        )?;
        Ok(Arc::new(transport) as Arc<dyn HttpTransport>)
    }
}

#[async_trait]
impl Connector for WebConnector {
    async fn connect(&self) -> Result<Arc<dyn SlackApi>> {
        let transport = self.build_transport()?;
        let client = SlackWebClient::new(transport, self.slack.token.clone());

        let auth = client
            .auth_test()
            .await
            .map_err(|e| SlackMcpError::Handshake(e.to_string()))?;

        tracing::info!(
            team = %auth.team,
            team_id = %auth.team_id,
            user = %auth.user,
            user_id = %auth.user_id,
            url = %auth.url,
            "Authenticated with Slack"
        );

        Ok(Arc::new(client.with_team_url(&auth.url)) as Arc<dyn SlackApi>)
    }
}

/// Build the underlying HTTP client from proxy and trust-root settings
pub fn build_http_client(tls: &TlsConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Some(proxy) = &tls.proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| SlackMcpError::Config(format!("Invalid proxy {proxy:?}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    if let Some(path) = &tls.server_ca {
        let pem = std::fs::read(path).map_err(|e| {
            SlackMcpError::Config(format!("Failed to read CA file {}: {e}", path.display()))
        })?;
        let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
            SlackMcpError::Config(format!("Invalid CA file {}: {e}", path.display()))
        })?;
        if certs.is_empty() {
            tracing::warn!(path = %path.display(), "No certificates found in CA file, using system roots only");
        }
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    if tls.insecure {
        tracing::warn!("TLS certificate verification is DISABLED");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| SlackMcpError::Config(format!("Failed to build HTTP client: {e}")))
}
