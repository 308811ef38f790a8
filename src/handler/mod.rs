mod channels;
mod conversations;
mod table;

pub use channels::{
    ChannelsHandler, DEFAULT_CHANNELS_LIMIT, MAX_CHANNELS_LIMIT, SortMode, parse_channel_types,
};
pub use conversations::{ConversationsHandler, HistoryWindow};
pub use table::Table;
