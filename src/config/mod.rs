mod settings;

pub use settings::{
    CacheConfig, DEFAULT_DS_COOKIE, DEFAULT_USER_AGENT, DEFAULT_USERS_CACHE, Settings,
    SlackConfig, SseConfig, TlsConfig, ToolsConfig, load_settings,
};
