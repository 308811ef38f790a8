use super::table::Table;
use crate::error::{Result, SlackMcpError};
use crate::provider::{ApiProvider, UsersMap};
use crate::server::{ToolDefinition, ToolHandler, parse_arguments};
use crate::slack::{ChannelId, HistoryRequest, SlackMessage};
use crate::text::process_text;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Arc, LazyLock};

pub const DEFAULT_HISTORY_LIMIT: &str = "1d";
pub const HISTORY_PAGE_SIZE: u32 = 100;
pub const MAX_HISTORY_COUNT: u32 = 1000;

const HEADER: &[&str] = &[
    "UserID", "UserName", "RealName", "Channel", "ThreadTs", "Text", "Time", "Cursor",
];

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)([dwm])$").unwrap());
static COUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    channel_id: String,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<String>,
}

/// What a `limit` argument asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryWindow {
    /// Everything newer than `oldest` (unix seconds), one page at a time
    Since { oldest: i64 },
    /// The latest `n` messages
    Count(u32),
}

impl HistoryWindow {
    /// Interpret `limit` relative to `now`. An empty limit means a day of history,
    /// or a default-sized page when resuming from a cursor.
    pub fn parse(limit: Option<&str>, has_cursor: bool, now: DateTime<Utc>) -> Result<Self> {
        let limit = limit.map(str::trim).unwrap_or_default();
        let limit = match limit {
            "" if has_cursor => return Ok(Self::Count(HISTORY_PAGE_SIZE)),
            "" => DEFAULT_HISTORY_LIMIT,
            other => other,
        };

        if let Some(caps) = RANGE_RE.captures(limit) {
            let n: i64 = caps[1]
                .parse()
                .map_err(|_| SlackMcpError::InvalidArgument(format!("limit {limit:?} is too large")))?;
            let days = match &caps[2] {
                "w" => n.checked_mul(7),
                "m" => n.checked_mul(30),
                _ => Some(n),
            };
            let oldest = days
                .and_then(Duration::try_days)
                .and_then(|range| now.checked_sub_signed(range))
                .ok_or_else(|| {
                    SlackMcpError::InvalidArgument(format!("limit {limit:?} is too large"))
                })?;
            return Ok(Self::Since {
                oldest: oldest.timestamp(),
            });
        }

        if COUNT_RE.is_match(limit) {
            return match limit.parse::<u32>() {
                Ok(n) if (1..=MAX_HISTORY_COUNT).contains(&n) => Ok(Self::Count(n)),
                _ => Err(SlackMcpError::InvalidArgument(format!(
                    "limit must be between 1 and {MAX_HISTORY_COUNT}, got {limit}"
                ))),
            };
        }

        Err(SlackMcpError::InvalidArgument(format!(
            "limit {limit:?} must be a message count (e.g. 50) or a time range (e.g. 1d, 2w, 3m)"
        )))
    }

    fn into_request(self, channel: ChannelId, cursor: Option<String>) -> HistoryRequest {
        match self {
            Self::Since { oldest } => HistoryRequest {
                channel,
                limit: HISTORY_PAGE_SIZE,
                oldest: Some(oldest.to_string()),
                cursor,
            },
            Self::Count(limit) => HistoryRequest {
                channel,
                limit,
                oldest: None,
                cursor,
            },
        }
    }
}

/// `conversations_history` tool: one page of a channel's messages.
pub struct ConversationsHandler {
    provider: Arc<ApiProvider>,
}

impl ConversationsHandler {
    pub fn new(provider: Arc<ApiProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ToolHandler for ConversationsHandler {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "conversations_history",
            description: "Get messages from the channel by channel_id, the last row/column in the response is used as 'cursor' parameter for pagination if not empty",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_id": {
                        "type": "string",
                        "description": "ID of the channel in format Cxxxxxxxxxx"
                    },
                    "cursor": {
                        "type": "string",
                        "description": "Cursor for pagination. Use the value of the last row and column in the response as next_cursor field returned from the previous request."
                    },
                    "limit": {
                        "type": "string",
                        "default": DEFAULT_HISTORY_LIMIT,
                        "description": "Limit of messages to fetch in format of maximum ranges of time (e.g. 1d - 1 day, 30d - 30 days, 90d - 90 days which is a default limit for free tier history) or number of messages (e.g. 50). Must be empty when 'cursor' is provided."
                    }
                },
                "required": ["channel_id"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<String> {
        let args: HistoryArgs = parse_arguments(arguments)?;

        let channel_id = args.channel_id.trim();
        if channel_id.is_empty() {
            return Err(SlackMcpError::InvalidArgument(
                "channel_id must not be empty".into(),
            ));
        }
        let cursor = args.cursor.filter(|c| !c.is_empty());
        let window = HistoryWindow::parse(args.limit.as_deref(), cursor.is_some(), Utc::now())?;
        let request = window.into_request(ChannelId::new(channel_id), cursor);

        let api = self.provider.provide().await?;
        let page = api.history_page(&request).await?;

        tracing::debug!(
            channel = %request.channel,
            messages = page.messages.len(),
            has_more = page.has_more,
            "Fetched conversation history"
        );

        let next_cursor = if page.has_more {
            page.next_cursor.as_str()
        } else {
            ""
        };
        let users = self.provider.provide_users_map().await;
        Ok(render(channel_id, &page.messages, next_cursor, &users))
    }
}

fn render(channel: &str, messages: &[SlackMessage], next_cursor: &str, users: &UsersMap) -> String {
    let mut table = Table::new(HEADER);
    let visible: Vec<&SlackMessage> = messages.iter().filter(|m| m.is_user_message()).collect();
    let last = visible.len().saturating_sub(1);

    for (i, message) in visible.into_iter().enumerate() {
        let user_id = message.user.as_deref().unwrap_or_default();
        let (user_name, real_name) = match users.get(user_id) {
            Some(user) => (user.name.as_str(), user.full_name()),
            None => (user_id, user_id),
        };
        let text = process_text(&message.text);
        let time = format_ts(&message.ts);
        let cursor = if i == last { next_cursor } else { "" };

        table.push_row(&[
            user_id,
            user_name,
            real_name,
            channel,
            message.thread_ts.as_deref().unwrap_or_default(),
            text.as_str(),
            time.as_str(),
            cursor,
        ]);
    }

    // A page of nothing but notices still has to hand back its cursor.
    if table.is_empty() && !next_cursor.is_empty() {
        table.push_row(&["", "", "", channel, "", "", "", next_cursor]);
    }

    table.finish()
}

/// Render a `1700000000.000100` style timestamp as RFC 3339 UTC.
fn format_ts(ts: &str) -> String {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    let parsed = secs.parse::<i64>().ok().and_then(|secs| {
        let micros = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<6}").get(..6)?.parse::<u32>().ok()?
        };
        DateTime::<Utc>::from_timestamp(secs, micros * 1_000)
    });

    match parsed {
        Some(time) => time.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => ts.to_string(),
    }
}
