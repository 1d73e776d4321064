//! Trait definitions for exchange clients

use async_trait::async_trait;
use futures_util::Stream;
use rust_decimal::Decimal;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;

use super::errors::Result;
use super::types::{
    Balance, Exchange, MarginMode, OrderAck, OrderBook, OrderRequest, PositionMode, PositionSide,
    SymbolInfo,
};
use crate::relay::upstream::{
    open_message_stream, ChannelSubscription, DEFAULT_HEARTBEAT_INTERVAL,
};

/// Lazy, unbounded sequence of upstream text frames. Reconnect to restart it.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Capabilities every exchange client offers
///
/// Each call signs independently; nothing is cached between calls except
/// symbol metadata.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Fetch instrument metadata, replacing any cached copy
    async fn get_symbol_info(&self, inst_id: &str) -> Result<SymbolInfo>;

    /// Balances with a nonzero total
    async fn get_balances(&self) -> Result<Vec<Balance>>;

    async fn get_order_book(&self, inst_id: &str) -> Result<OrderBook>;

    /// Submit an order sized in exchange-native units.
    ///
    /// Returns the raw acknowledgment. Only transport failures and non-2xx
    /// statuses are errors; in-band codes are left for the caller.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck>;

    /// Connection plan (URL, login, subscribe frames) for a channel
    fn channel_subscription(&self, channel: &str, inst_id: &str) -> Result<ChannelSubscription>;

    /// Keepalive ping interval for streams opened by this client
    fn heartbeat_interval(&self) -> Duration {
        DEFAULT_HEARTBEAT_INTERVAL
    }

    /// Open a channel and yield its text frames
    async fn stream_channel(&self, channel: &str, inst_id: &str) -> Result<MessageStream> {
        let subscription = self.channel_subscription(channel, inst_id)?;
        open_message_stream(&subscription, self.heartbeat_interval()).await
    }
}

/// Account configuration and sizing inputs needed before placing a
/// derivatives order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DerivativesClient: Send + Sync {
    /// Instrument metadata, served from cache when present
    async fn instrument_info(&self, inst_id: &str) -> Result<SymbolInfo>;

    async fn last_price(&self, inst_id: &str) -> Result<Decimal>;

    async fn set_position_mode(&self, mode: PositionMode) -> Result<Value>;

    async fn set_margin_mode(&self, inst_id: &str, mode: MarginMode) -> Result<Value>;

    async fn set_leverage(
        &self,
        inst_id: &str,
        leverage: u32,
        margin_mode: MarginMode,
        position_side: PositionSide,
    ) -> Result<Value>;

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck>;
}
