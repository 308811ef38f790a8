use super::table::Table;
use crate::error::{Result, SlackMcpError};
use crate::provider::{ApiProvider, UsersMap};
use crate::server::{ToolDefinition, ToolHandler, parse_arguments};
use crate::slack::{ChannelType, ChannelsPageRequest, SlackChannel};
use crate::text::process_text;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::cmp::Reverse;
use std::sync::Arc;

pub const DEFAULT_CHANNELS_LIMIT: u32 = 100;
pub const MAX_CHANNELS_LIMIT: u32 = 999;

const HEADER: &[&str] = &["ID", "Name", "Topic", "Purpose", "MemberCount", "Cursor"];

#[derive(Debug, Deserialize)]
struct ChannelsArgs {
    channel_types: String,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    limit: Option<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

/// How to order a page of channels before rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Keep the order the platform returned
    None,
    /// Member count, descending
    Popularity,
}

impl SortMode {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("popularity") => Self::Popularity,
            Some(other) if !other.is_empty() => {
                tracing::debug!(sort = other, "Ignoring unknown sort mode");
                Self::None
            }
            _ => Self::None,
        }
    }
}

/// `channels_list` tool: one page of conversations rendered as a table.
pub struct ChannelsHandler {
    provider: Arc<ApiProvider>,
    normalize_text: bool,
}

impl ChannelsHandler {
    pub fn new(provider: Arc<ApiProvider>) -> Self {
        Self {
            provider,
            normalize_text: false,
        }
    }

    /// Pass topic and purpose through the text normalizer before rendering.
    pub fn with_normalized_text(mut self) -> Self {
        self.normalize_text = true;
        self
    }

    fn render(&self, channels: &[SlackChannel], next_cursor: &str, users: &UsersMap) -> String {
        let mut table = Table::new(HEADER);
        let last = channels.len().saturating_sub(1);

        for (i, channel) in channels.iter().enumerate() {
            let (topic, purpose) = if self.normalize_text {
                (process_text(channel.topic()), process_text(channel.purpose()))
            } else {
                (channel.topic().to_string(), channel.purpose().to_string())
            };
            let name = display_name(channel, users);
            let members = channel.member_count().to_string();
            let cursor = if i == last { next_cursor } else { "" };

            table.push_row(&[
                channel.id.as_str(),
                name.as_str(),
                topic.as_str(),
                purpose.as_str(),
                members.as_str(),
                cursor,
            ]);
        }

        table.finish()
    }
}

#[async_trait]
impl ToolHandler for ChannelsHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "channels_list",
            description: "Get list of channels",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_types": {
                        "type": "string",
                        "description": "Comma-separated channel types. Allowed values: 'mpim', 'im', 'public_channel', 'private_channel'. Example: 'public_channel,private_channel,im'"
                    },
                    "sort": {
                        "type": "string",
                        "description": "Type of sorting. Allowed values: 'popularity' - sort by number of members/participants in each channel."
                    },
                    "limit": {
                        "type": "number",
                        "default": DEFAULT_CHANNELS_LIMIT,
                        "description": "The maximum number of items to return. Must be an integer under 1000."
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Cursor for pagination. Use the value of the last row and column in the response as next_cursor field returned from the previous request."
                    }
                },
                "required": ["channel_types"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let args: ChannelsArgs = parse_arguments(arguments)?;

        // Validation happens before the provider is touched so a bad request
        // never reaches the network.
        let types = parse_channel_types(&args.channel_types)?;
        let limit = parse_limit(args.limit.as_ref())?;
        let sort = SortMode::parse(args.sort.as_deref());
        let request = ChannelsPageRequest {
            types,
            limit,
            cursor: args.cursor.filter(|c| !c.is_empty()),
        };

        let api = self.provider.provide().await?;
        let mut page = api.list_channels_page(&request).await?;

        if sort == SortMode::Popularity {
            page.channels.sort_by_key(|c| Reverse(c.member_count()));
        }

        tracing::debug!(
            channels = page.channels.len(),
            has_cursor = !page.next_cursor.is_empty(),
            "Listed channels"
        );

        let users = self.provider.provide_users_map().await;
        Ok(self.render(&page.channels, &page.next_cursor, &users))
    }
}

/// Parse a comma-separated list of channel types, ignoring blank entries.
pub fn parse_channel_types(raw: &str) -> Result<Vec<ChannelType>> {
    let mut types = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let ty: ChannelType = token.parse()?;
        if !types.contains(&ty) {
            types.push(ty);
        }
    }

    if types.is_empty() {
        return Err(SlackMcpError::InvalidArgument(
            "channel_types must name at least one of: mpim, im, public_channel, private_channel"
                .into(),
        ));
    }
    Ok(types)
}

/// Page size from a JSON number or numeric string; clamped below 1000.
fn parse_limit(value: Option<&Value>) -> Result<u32> {
    let limit = match value {
        None | Some(Value::Null) => return Ok(DEFAULT_CHANNELS_LIMIT),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(DEFAULT_CHANNELS_LIMIT),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    match limit {
        Some(0) => Ok(DEFAULT_CHANNELS_LIMIT),
        Some(n) if n < 0 => Err(SlackMcpError::InvalidArgument(format!(
            "limit must not be negative, got {n}"
        ))),
        Some(n) => Ok(n.min(i64::from(MAX_CHANNELS_LIMIT)) as u32),
        None => Err(SlackMcpError::InvalidArgument(format!(
            "limit must be an integer, got {}",
            value.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

fn display_name(channel: &SlackChannel, users: &UsersMap) -> String {
    if channel.is_im {
        let user_id = channel.user.as_deref().unwrap_or(&channel.id);
        let name = users
            .get(user_id)
            .map(|u| u.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(user_id);
        format!("@{name}")
    } else {
        format!("#{}", channel.name)
    }
}
