//! Binance raw streams
//!
//! Raw streams are selected by URL (`/ws/<symbol>@<channel>`), so no
//! subscribe frame is sent.

use crate::relay::upstream::ChannelSubscription;

pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Stream name: lowercase symbol without separators, then `@channel`
pub fn stream_name(channel: &str, inst_id: &str) -> String {
    let symbol: String = inst_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    format!("{}@{}", symbol, channel)
}

pub fn subscription(base_url: &str, channel: &str, inst_id: &str) -> ChannelSubscription {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), stream_name(channel, inst_id));
    ChannelSubscription::public(url, Vec::new())
}
