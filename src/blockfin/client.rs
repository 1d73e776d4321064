//! BlockFin client combining REST, WebSocket and the symbol cache

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::auth::BlockFinSigner;
use super::rest::{BlockFinRestClient, DEFAULT_BASE_URL};
use super::websocket::{BlockFinWebSocket, PositionStream, DEFAULT_PRIVATE_URL, DEFAULT_PUBLIC_URL};
use crate::common::errors::Result;
use crate::common::symbols::SymbolCache;
use crate::common::traits::{DerivativesClient, ExchangeClient};
use crate::common::types::{
    Balance, Exchange, MarginMode, OrderAck, OrderBook, OrderRequest, PositionMode, PositionSide,
    SymbolInfo,
};
use crate::config::types::{AppSettings, ExchangeConfig};
use crate::relay::upstream::ChannelSubscription;

/// Combined BlockFin client for perpetual swaps
pub struct BlockFinClient {
    rest: BlockFinRestClient,
    ws: BlockFinWebSocket,
    symbols: SymbolCache,
}

impl BlockFinClient {
    pub fn new(rest: BlockFinRestClient, ws: BlockFinWebSocket) -> Self {
        Self {
            rest,
            ws,
            symbols: SymbolCache::new(),
        }
    }

    /// Build from configuration. Missing credentials fail here, not at call time.
    pub fn from_config(config: &ExchangeConfig, settings: &AppSettings) -> Result<Self> {
        let credential = config.credential(Exchange::BlockFin)?;
        let signer = Arc::new(BlockFinSigner::new(credential)?);

        let rest = BlockFinRestClient::with_timeouts(
            config.base_url_or(DEFAULT_BASE_URL),
            signer.clone(),
            settings.rest_timeouts(),
        )?;
        let ws = BlockFinWebSocket::new(
            config.ws_base_url_or(DEFAULT_PUBLIC_URL),
            config.ws_private_url_or(DEFAULT_PRIVATE_URL),
            signer,
        )
        .with_heartbeat_interval(settings.heartbeat_interval());

        info!("BlockFin client ready");
        Ok(Self::new(rest, ws))
    }

    pub fn rest(&self) -> &BlockFinRestClient {
        &self.rest
    }

    pub fn websocket(&self) -> &BlockFinWebSocket {
        &self.ws
    }

    pub fn symbols(&self) -> &SymbolCache {
        &self.symbols
    }

    /// Position pushes from the private socket. An empty `inst_id` covers
    /// every instrument.
    pub async fn position_stream(&self, inst_id: &str) -> Result<PositionStream> {
        self.ws.position_stream(inst_id).await
    }
}

#[async_trait]
impl ExchangeClient for BlockFinClient {
    fn exchange(&self) -> Exchange {
        Exchange::BlockFin
    }

    #[instrument(skip(self))]
    async fn get_symbol_info(&self, inst_id: &str) -> Result<SymbolInfo> {
        let info = self.rest.get_instrument(inst_id).await?;
        Ok(self.symbols.replace(info).await.as_ref().clone())
    }

    async fn get_balances(&self) -> Result<Vec<Balance>> {
        self.rest.get_balances().await
    }

    async fn get_order_book(&self, inst_id: &str) -> Result<OrderBook> {
        self.rest.get_order_book(inst_id).await
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.rest.place_order(order).await
    }

    fn channel_subscription(&self, channel: &str, inst_id: &str) -> Result<ChannelSubscription> {
        self.ws.subscription(channel, inst_id)
    }

    fn heartbeat_interval(&self) -> Duration {
        self.ws.heartbeat_interval()
    }
}

#[async_trait]
impl DerivativesClient for BlockFinClient {
    async fn instrument_info(&self, inst_id: &str) -> Result<SymbolInfo> {
        if let Some(info) = self.symbols.get(inst_id).await {
            debug!("Symbol cache hit for {}", inst_id);
            return Ok(info.as_ref().clone());
        }
        self.get_symbol_info(inst_id).await
    }

    async fn last_price(&self, inst_id: &str) -> Result<Decimal> {
        self.rest.get_last_price(inst_id).await
    }

    async fn set_position_mode(&self, mode: PositionMode) -> Result<Value> {
        self.rest.set_position_mode(mode).await
    }

    async fn set_margin_mode(&self, inst_id: &str, mode: MarginMode) -> Result<Value> {
        self.rest.set_margin_mode(inst_id, mode).await
    }

    async fn set_leverage(
        &self,
        inst_id: &str,
        leverage: u32,
        margin_mode: MarginMode,
        position_side: PositionSide,
    ) -> Result<Value> {
        self.rest
            .set_leverage(inst_id, leverage, margin_mode, position_side)
            .await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.rest.place_order(order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::errors::ClientError;

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            api_key: Some("blockfin_key".to_string()),
            api_secret: Some("blockfin_secret".to_string()),
            api_passphrase: Some("blockfin_pass".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config_requires_passphrase() {
        let mut config = config();
        config.api_passphrase = None;
        let result = BlockFinClient::from_config(&config, &AppSettings::default());
        assert!(matches!(result, Err(ClientError::Signing(_))));
    }

    #[test]
    fn test_private_channel_routes_to_private_url() {
        let client = BlockFinClient::from_config(&config(), &AppSettings::default()).unwrap();
        let private = client.channel_subscription("positions", "BTC-USDT").unwrap();
        assert_eq!(private.url, DEFAULT_PRIVATE_URL);
        assert!(private.is_authenticated());

        let public = client.channel_subscription("tickers", "BTC-USDT").unwrap();
        assert_eq!(public.url, DEFAULT_PUBLIC_URL);
        assert!(!public.is_authenticated());
        assert_eq!(client.exchange(), Exchange::BlockFin);
    }
}
