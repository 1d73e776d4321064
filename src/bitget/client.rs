//! Bitget spot client

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::auth::BitgetSigner;
use super::rest::{BitgetRestClient, DEFAULT_BASE_URL};
use super::websocket::{self, DEFAULT_WS_URL};
use crate::common::errors::Result;
use crate::common::symbols::SymbolCache;
use crate::common::traits::ExchangeClient;
use crate::common::types::{
    Balance, Exchange, OrderAck, OrderBook, OrderRequest, SymbolInfo, WithdrawalRequest,
};
use crate::config::types::{AppSettings, ExchangeConfig};
use crate::relay::upstream::{ChannelSubscription, DEFAULT_HEARTBEAT_INTERVAL};

pub struct BitgetClient {
    rest: BitgetRestClient,
    ws_url: String,
    heartbeat: Duration,
    symbols: SymbolCache,
}

impl BitgetClient {
    pub fn new(rest: BitgetRestClient, ws_url: &str) -> Self {
        Self {
            rest,
            ws_url: ws_url.to_string(),
            heartbeat: DEFAULT_HEARTBEAT_INTERVAL,
            symbols: SymbolCache::new(),
        }
    }

    pub fn with_heartbeat_interval(mut self, every: Duration) -> Self {
        self.heartbeat = every;
        self
    }

    pub fn from_config(config: &ExchangeConfig, settings: &AppSettings) -> Result<Self> {
        let signer = Arc::new(BitgetSigner::new(config.credential(Exchange::Bitget)?)?);
        let rest = BitgetRestClient::with_timeouts(
            config.base_url_or(DEFAULT_BASE_URL),
            signer,
            settings.rest_timeouts(),
        )?;
        info!("Bitget client ready");
        Ok(Self::new(rest, config.ws_base_url_or(DEFAULT_WS_URL))
            .with_heartbeat_interval(settings.heartbeat_interval()))
    }

    pub fn rest(&self) -> &BitgetRestClient {
        &self.rest
    }

    pub fn symbols(&self) -> &SymbolCache {
        &self.symbols
    }

    pub async fn withdraw(&self, request: &WithdrawalRequest) -> Result<Value> {
        self.rest.withdraw(request).await
    }
}

#[async_trait]
impl ExchangeClient for BitgetClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bitget
    }

    async fn get_symbol_info(&self, inst_id: &str) -> Result<SymbolInfo> {
        let info = self.rest.get_symbol(inst_id).await?;
        Ok(self.symbols.replace(info).await.as_ref().clone())
    }

    async fn get_balances(&self) -> Result<Vec<Balance>> {
        self.rest.get_assets().await
    }

    async fn get_order_book(&self, inst_id: &str) -> Result<OrderBook> {
        self.rest.get_order_book(inst_id).await
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        self.rest.place_order(order).await
    }

    fn channel_subscription(&self, channel: &str, inst_id: &str) -> Result<ChannelSubscription> {
        websocket::subscription(&self.ws_url, channel, inst_id)
    }

    fn heartbeat_interval(&self) -> Duration {
        self.heartbeat
    }
}
