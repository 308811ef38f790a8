use crate::error::SlackMcpError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Conversation kinds accepted by `conversations.list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    PublicChannel,
    PrivateChannel,
    MultiPartyDirectMessage,
    DirectMessage,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ChannelType {
    pub const ALL: [ChannelType; 4] = [
        ChannelType::PublicChannel,
        ChannelType::PrivateChannel,
        ChannelType::MultiPartyDirectMessage,
        ChannelType::DirectMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::PublicChannel => "public_channel",
            ChannelType::PrivateChannel => "private_channel",
            ChannelType::MultiPartyDirectMessage => "mpim",
            ChannelType::DirectMessage => "im",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = SlackMcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                SlackMcpError::InvalidArgument(format!(
                    "invalid channel type {s:?}, allowed values: public_channel, private_channel, mpim, im"
                ))
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackTextValue {
    #[serde(default)]
    pub value: String,
}

/// Conversation as returned by `conversations.list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<SlackTextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<SlackTextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_members: Option<u64>,
    #[serde(default)]
    pub is_im: bool,
    #[serde(default)]
    pub is_mpim: bool,
    #[serde(default)]
    pub is_private: bool,
    /// Counterpart of a direct message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SlackChannel {
    pub fn topic(&self) -> &str {
        self.topic.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }

    pub fn purpose(&self) -> &str {
        self.purpose.as_ref().map(|p| p.value.as_str()).unwrap_or("")
    }

    pub fn member_count(&self) -> u64 {
        self.num_members.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackUserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Workspace member. Fields this crate does not read are kept in `extra` so a
/// cached directory round-trips everything the API returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<SlackUserProfile>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackUser {
    /// Full name, preferring the top-level field over the profile's
    pub fn full_name(&self) -> &str {
        self.real_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.profile
                    .as_ref()
                    .and_then(|p| p.real_name.as_deref())
                    .filter(|n| !n.is_empty())
            })
            .unwrap_or(&self.name)
    }
}

/// Message as returned by `conversations.history`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl SlackMessage {
    /// Plain user message, as opposed to joins, topic changes and other notices
    pub fn is_user_message(&self) -> bool {
        self.subtype.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

/// Result of the `auth.test` handshake
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthTestResponse {
    pub url: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
}
