//! REST API client for Binance spot
//!
//! Market data endpoints are public. Account, order and withdrawal calls
//! sign the query string with a fresh server timestamp.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::auth::BinanceSigner;
use super::messages::*;
use crate::common::errors::{ClientError, Result};
use crate::common::rest::{Clock, RestTimeouts, SignedRestClient};
use crate::common::types::{
    Balance, Exchange, OrderAck, OrderBook, OrderRequest, OrderType, PriceLevel, SymbolInfo,
    WithdrawalRequest,
};

/// Default REST base URL
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const SERVER_TIME_PATH: &str = "/api/v3/time";
const SERVER_TIME_POINTER: &str = "/serverTime";

/// REST API client for Binance
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    rest: SignedRestClient,
}

fn pair(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

impl BinanceRestClient {
    pub fn new(base_url: &str, signer: Arc<BinanceSigner>) -> Result<Self> {
        Self::with_timeouts(base_url, signer, RestTimeouts::default())
    }

    pub fn with_timeouts(
        base_url: &str,
        signer: Arc<BinanceSigner>,
        timeouts: RestTimeouts,
    ) -> Result<Self> {
        let clock = Clock::server(SERVER_TIME_PATH, SERVER_TIME_POINTER);
        Ok(Self {
            rest: SignedRestClient::with_timeouts(base_url, signer, clock, timeouts)?,
        })
    }

    pub async fn get_server_time(&self) -> Result<i64> {
        self.rest.server_time().await
    }

    // ========================================================================
    // Market data
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_symbol(&self, symbol: &str) -> Result<SymbolInfo> {
        let body = self
            .rest
            .get_public("/api/v3/exchangeInfo", &[pair("symbol", symbol)])
            .await?;
        let info: ExchangeInfo = serde_json::from_value(body)?;
        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .map(SymbolInfo::from)
            .ok_or_else(|| ClientError::InvalidResponse(format!("no symbol {}", symbol)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_book(&self, symbol: &str) -> Result<OrderBook> {
        let body = self
            .rest
            .get_public("/api/v3/depth", &[pair("symbol", symbol), pair("limit", "50")])
            .await?;
        let depth: DepthData = serde_json::from_value(body)?;
        debug!("Depth snapshot {} for {}", depth.last_update_id, symbol);

        Ok(OrderBook {
            exchange: Exchange::Binance,
            inst_id: symbol.to_string(),
            bids: PriceLevel::from_rows(depth.bids),
            asks: PriceLevel::from_rows(depth.asks),
            // depth snapshots carry no timestamp
            timestamp: Utc::now(),
        })
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Wallet assets, filtered to nonzero
    #[instrument(skip(self))]
    pub async fn get_user_assets(&self) -> Result<Vec<Balance>> {
        let body = self
            .rest
            .post_signed("/sapi/v3/asset/getUserAsset", Vec::new(), None::<&Value>)
            .await?;
        let data: Vec<UserAssetData> = serde_json::from_value(body)?;
        let balances: Vec<Balance> = data
            .into_iter()
            .map(Balance::from)
            .filter(Balance::is_nonzero)
            .collect();
        debug!("{} nonzero assets", balances.len());
        Ok(balances)
    }

    #[instrument(skip(self, request), fields(coin = %request.coin, network = %request.chain))]
    pub async fn withdraw(&self, request: &WithdrawalRequest) -> Result<Value> {
        let query = vec![
            pair("coin", request.coin.as_str()),
            pair("network", request.chain.as_str()),
            pair("address", request.address.as_str()),
            pair("amount", request.amount.normalize().to_string()),
        ];
        info!("Submitting withdrawal");
        self.rest
            .post_signed("/sapi/v1/capital/withdraw/apply", query, None::<&Value>)
            .await
    }

    // ========================================================================
    // Trading
    // ========================================================================

    /// Place a spot order; parameters are signed in the order they are listed
    #[instrument(skip(self, order), fields(symbol = %order.inst_id))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let quantity = order.require_contracts()?;
        let (order_type, time_in_force) = match order.order_type {
            OrderType::Market => ("MARKET", None),
            OrderType::Limit => ("LIMIT", Some(order.time_in_force.as_deref().unwrap_or("GTC"))),
            OrderType::PostOnly => ("LIMIT_MAKER", None),
            OrderType::Fok => ("LIMIT", Some("FOK")),
            OrderType::Ioc => ("LIMIT", Some("IOC")),
        };

        let mut query = vec![
            pair("symbol", order.inst_id.as_str()),
            pair("side", order.side.as_str().to_uppercase()),
            pair("type", order_type),
        ];
        if let Some(tif) = time_in_force {
            query.push(pair("timeInForce", tif));
        }
        query.push(pair("quantity", quantity.normalize().to_string()));
        if order.order_type.is_priced() {
            let price = order.price.ok_or_else(|| {
                ClientError::Validation(format!("{} order for {} needs a price", order_type, order.inst_id))
            })?;
            query.push(pair("price", price.normalize().to_string()));
        }

        let raw = self
            .rest
            .post_order("/api/v3/order", query, None::<&Value>)
            .await?;
        Ok(OrderAck::new(Exchange::Binance, raw))
    }
}
