pub mod api;
mod client;
mod types;

pub use api::{
    ChannelsPage, ChannelsPageRequest, HistoryPage, HistoryRequest, SlackApi, UsersPage,
};
pub use client::{SLACK_API_BASE, SlackWebClient};
pub use types::{
    AuthTestResponse, ChannelId, ChannelType, ResponseMetadata, SlackChannel, SlackMessage,
    SlackTextValue, SlackUser, SlackUserProfile,
};
