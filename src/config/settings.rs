use crate::error::{Result, SlackMcpError};
use std::path::PathBuf;

/// Browser user-agent presented to Slack on every outbound request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";
pub const DEFAULT_DS_COOKIE: &str = "1744415074";
pub const DEFAULT_USERS_CACHE: &str = ".users_cache.json";
pub const DEFAULT_SSE_HOST: &str = "127.0.0.1";
pub const DEFAULT_SSE_PORT: u16 = 13080;

#[derive(Debug, Clone)]
pub struct Settings {
    pub slack: SlackConfig,
    pub tls: TlsConfig,
    pub cache: CacheConfig,
    pub sse: SseConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// `xoxc-` session token
    pub token: String,
    /// `d` session cookie (`xoxd-`)
    pub cookie: String,
    /// `d-s` secondary cookie
    pub ds_cookie: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub proxy: Option<String>,
    pub server_ca: Option<PathBuf>,
    pub insecure: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// `Some` only when user caching is enabled.
    pub users_cache: Option<PathBuf>,
}

/// Output options for the tool handlers.
#[derive(Debug, Clone, Default)]
pub struct ToolsConfig {
    /// Run channel topic and purpose through the text normalizer.
    pub normalize_channel_text: bool,
}

#[derive(Debug, Clone)]
pub struct SseConfig {
    pub api_key: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            host: DEFAULT_SSE_HOST.to_string(),
            port: DEFAULT_SSE_PORT,
        }
    }
}

pub fn load_settings() -> Result<Settings> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    Settings::from_lookup(|key| std::env::var(key).ok())
}

impl Settings {
    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| SlackMcpError::Config(format!("{key} not set")))
        };

        let slack = SlackConfig {
            token: require("SLACK_MCP_XOXC_TOKEN")?,
            cookie: require("SLACK_MCP_XOXD_TOKEN")?,
            ds_cookie: get("SLACK_MCP_DS_COOKIE").unwrap_or_else(|| DEFAULT_DS_COOKIE.to_string()),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        };

        let proxy = get("SLACK_MCP_PROXY");
        if let Some(proxy) = &proxy {
            reqwest::Url::parse(proxy).map_err(|e| {
                SlackMcpError::Config(format!("Invalid SLACK_MCP_PROXY {proxy:?}: {e}"))
            })?;
        }

        let server_ca = get("SLACK_MCP_SERVER_CA").map(PathBuf::from);
        let insecure = get("SLACK_MCP_SERVER_CA_INSECURE").is_some();
        if insecure && server_ca.is_some() {
            return Err(SlackMcpError::Config(
                "SLACK_MCP_SERVER_CA and SLACK_MCP_SERVER_CA_INSECURE are mutually exclusive"
                    .to_string(),
            ));
        }

        let tls = TlsConfig {
            proxy,
            server_ca,
            insecure,
        };

        // Only an explicit "true" enables the on-disk users cache
        let cache = CacheConfig {
            users_cache: (lookup("SLACK_MCP_ENABLE_USER_CACHE").as_deref() == Some("true")).then(
                || {
                    get("SLACK_MCP_USERS_CACHE")
                        .unwrap_or_else(|| DEFAULT_USERS_CACHE.to_string())
                        .into()
                },
            ),
        };

        let sse = SseConfig {
            api_key: get("SLACK_MCP_SSE_API_KEY"),
            host: get("SLACK_MCP_HOST").unwrap_or_else(|| DEFAULT_SSE_HOST.to_string()),
            port: get("SLACK_MCP_PORT")
                .map(|p| {
                    p.parse()
                        .map_err(|_| SlackMcpError::Config(format!("Invalid SLACK_MCP_PORT: {p}")))
                })
                .transpose()?
                .unwrap_or(DEFAULT_SSE_PORT),
        };

        let tools = ToolsConfig {
            normalize_channel_text: lookup("SLACK_MCP_NORMALIZE_CHANNEL_TEXT").as_deref()
                == Some("true"),
        };

        Ok(Settings {
            slack,
            tls,
            cache,
            sse,
            tools,
        })
    }
}
