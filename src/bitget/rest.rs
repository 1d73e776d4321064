//! REST API client for Bitget spot

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::auth::BitgetSigner;
use super::messages::*;
use crate::common::errors::{ClientError, Result};
use crate::common::rest::{ensure_code, envelope_data, Clock, RestTimeouts, SignedRestClient};
use crate::common::types::{
    Balance, Exchange, OrderAck, OrderBook, OrderRequest, OrderType, PriceLevel, SymbolInfo,
    WithdrawalRequest,
};

/// Default REST base URL
pub const DEFAULT_BASE_URL: &str = "https://api.bitget.com";

const SERVER_TIME_PATH: &str = "/api/v2/public/time";
const SERVER_TIME_POINTER: &str = "/data/serverTime";

/// REST API client for Bitget. Signed calls fetch the server time first.
#[derive(Debug, Clone)]
pub struct BitgetRestClient {
    rest: SignedRestClient,
}

impl BitgetRestClient {
    pub fn new(base_url: &str, signer: Arc<BitgetSigner>) -> Result<Self> {
        Self::with_timeouts(base_url, signer, RestTimeouts::default())
    }

    pub fn with_timeouts(
        base_url: &str,
        signer: Arc<BitgetSigner>,
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
            .get_public("/api/v2/spot/public/symbols", &[("symbol".into(), symbol.into())])
            .await?;
        let data: Vec<SymbolData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        data.into_iter()
            .find(|d| d.symbol == symbol)
            .map(SymbolInfo::from)
            .ok_or_else(|| ClientError::InvalidResponse(format!("no symbol {}", symbol)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_book(&self, symbol: &str) -> Result<OrderBook> {
        let query = [
            ("symbol".to_string(), symbol.to_string()),
            ("type".to_string(), "step0".to_string()),
            ("limit".to_string(), "50".to_string()),
        ];
        let body = self.rest.get_public("/api/v2/spot/market/orderbook", &query).await?;
        let book: OrderBookData = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;

        let timestamp = book
            .ts
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Ok(OrderBook {
            exchange: Exchange::Bitget,
            inst_id: symbol.to_string(),
            bids: PriceLevel::from_rows(book.bids),
            asks: PriceLevel::from_rows(book.asks),
            timestamp,
        })
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Spot assets, filtered to nonzero
    #[instrument(skip(self))]
    pub async fn get_assets(&self) -> Result<Vec<Balance>> {
        let body = self.rest.get_signed("/api/v2/spot/account/assets", Vec::new()).await?;
        let data: Vec<AssetData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        let balances: Vec<Balance> = data
            .into_iter()
            .map(Balance::from)
            .filter(Balance::is_nonzero)
            .collect();
        debug!("{} nonzero assets", balances.len());
        Ok(balances)
    }

    /// On-chain withdrawal; the raw response is returned
    #[instrument(skip(self, request), fields(coin = %request.coin, chain = %request.chain))]
    pub async fn withdraw(&self, request: &WithdrawalRequest) -> Result<serde_json::Value> {
        let body = WithdrawalBody {
            coin: &request.coin,
            transfer_type: "on_chain",
            address: &request.address,
            chain: &request.chain,
            size: request.amount.normalize().to_string(),
        };
        info!("Submitting withdrawal");
        self.rest
            .post_signed("/api/v2/spot/wallet/withdrawal", Vec::new(), Some(&body))
            .await
    }

    // ========================================================================
    // Trading
    // ========================================================================

    /// Place a spot order sized in base units; the raw ack is returned verbatim
    #[instrument(skip(self, order), fields(symbol = %order.inst_id))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let size = order.require_contracts()?;
        let (order_type, force) = match order.order_type {
            OrderType::Market => ("market", None),
            OrderType::Limit => ("limit", Some(order.time_in_force.as_deref().unwrap_or("gtc"))),
            OrderType::PostOnly => ("limit", Some("post_only")),
            OrderType::Fok => ("limit", Some("fok")),
            OrderType::Ioc => ("limit", Some("ioc")),
        };
        let price = match (force, order.price) {
            (None, _) => None,
            (Some(_), Some(price)) => Some(price.normalize().to_string()),
            (Some(_), None) => {
                return Err(ClientError::Validation(format!(
                    "limit order for {} needs a price",
                    order.inst_id
                )))
            }
        };

        let body = PlaceOrderBody {
            symbol: &order.inst_id,
            side: order.side.as_str(),
            order_type,
            price,
            force,
            size: size.normalize().to_string(),
        };
        let raw = self
            .rest
            .post_order("/api/v2/spot/trade/place-order", Vec::new(), Some(&body))
            .await?;
        Ok(OrderAck::new(Exchange::Bitget, raw))
    }
}
