//! Narrow capability surface over the Slack web API.
//!
//! Handlers and the directory bootstrap only ever need these three paged reads,
//! so that is all the trait exposes. `SlackWebClient` implements it against the
//! real API; tests implement it with in-memory doubles.

use crate::error::Result;
use crate::slack::{ChannelId, ChannelType, SlackChannel, SlackMessage, SlackUser};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelsPageRequest {
    pub types: Vec<ChannelType>,
    pub limit: u32,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelsPage {
    pub channels: Vec<SlackChannel>,
    /// Empty when there are no more pages
    pub next_cursor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub channel: ChannelId,
    pub limit: u32,
    pub oldest: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<SlackMessage>,
    pub next_cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UsersPage {
    pub users: Vec<SlackUser>,
    pub next_cursor: String,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn list_channels_page(&self, request: &ChannelsPageRequest) -> Result<ChannelsPage>;

    async fn history_page(&self, request: &HistoryRequest) -> Result<HistoryPage>;

    async fn list_users_page(&self, limit: u32, cursor: Option<&str>) -> Result<UsersPage>;
}
