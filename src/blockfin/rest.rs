//! REST API client for BlockFin perpetual swaps

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::auth::BlockFinSigner;
use super::messages::*;
use crate::common::errors::{ClientError, Result};
use crate::common::rest::{ensure_code, Clock, RestTimeouts, SignedRestClient};
use crate::common::types::{
    Balance, Exchange, MarginMode, OrderAck, OrderBook, OrderRequest, PositionMode, PositionSide,
    PriceLevel, SymbolInfo,
};

/// Default REST base URL
pub const DEFAULT_BASE_URL: &str = "https://openapi.blockfin.com";

/// REST API client for BlockFin. Every call, public data included, is signed
/// with a fresh local timestamp and nonce.
#[derive(Debug, Clone)]
pub struct BlockFinRestClient {
    rest: SignedRestClient,
}

impl BlockFinRestClient {
    pub fn new(base_url: &str, signer: Arc<BlockFinSigner>) -> Result<Self> {
        Self::with_timeouts(base_url, signer, RestTimeouts::default())
    }

    pub fn with_timeouts(
        base_url: &str,
        signer: Arc<BlockFinSigner>,
        timeouts: RestTimeouts,
    ) -> Result<Self> {
        Ok(Self {
            rest: SignedRestClient::with_timeouts(base_url, signer, Clock::Local, timeouts)?,
        })
    }

    // ========================================================================
    // Market data
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn get_instrument(&self, inst_id: &str) -> Result<SymbolInfo> {
        let body = self
            .rest
            .get_signed("/api/v1/market/instruments", vec![("instId".into(), inst_id.into())])
            .await?;
        let data: Vec<InstrumentData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        data.into_iter()
            .find(|d| d.inst_id == inst_id)
            .map(SymbolInfo::from)
            .ok_or_else(|| ClientError::InvalidResponse(format!("no instrument {}", inst_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_order_book(&self, inst_id: &str) -> Result<OrderBook> {
        let body = self
            .rest
            .get_signed("/api/v1/market/books", vec![("instId".into(), inst_id.into())])
            .await?;
        let data: Vec<BookData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        let book = data
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::InvalidResponse(format!("empty book for {}", inst_id)))?;

        let timestamp = book
            .ts
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        Ok(OrderBook {
            exchange: Exchange::BlockFin,
            inst_id: inst_id.to_string(),
            bids: PriceLevel::from_rows(book.bids),
            asks: PriceLevel::from_rows(book.asks),
            timestamp,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_last_price(&self, inst_id: &str) -> Result<Decimal> {
        let body = self
            .rest
            .get_signed("/api/v1/market/tickers", vec![("instId".into(), inst_id.into())])
            .await?;
        let data: Vec<TickerData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        data.into_iter()
            .find(|t| t.inst_id == inst_id)
            .map(|t| t.last)
            .ok_or_else(|| ClientError::InvalidResponse(format!("no ticker for {}", inst_id)))
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Funding account balances, filtered to nonzero
    #[instrument(skip(self))]
    pub async fn get_balances(&self) -> Result<Vec<Balance>> {
        let body = self
            .rest
            .get_signed("/api/v1/asset/balances", vec![("accountType".into(), "funding".into())])
            .await?;
        let data: Vec<BalanceData> = envelope_data(ensure_code(body, SUCCESS_CODE)?)?;
        let balances: Vec<Balance> = data
            .into_iter()
            .map(Balance::from)
            .filter(Balance::is_nonzero)
            .collect();
        debug!("{} nonzero balances", balances.len());
        Ok(balances)
    }

    /// Returns the raw response, whatever its in-band code
    #[instrument(skip(self))]
    pub async fn set_position_mode(&self, mode: PositionMode) -> Result<Value> {
        let body = SetPositionModeBody {
            position_mode: mode.as_str(),
        };
        self.rest
            .post_signed("/api/v1/account/set-position-mode", Vec::new(), Some(&body))
            .await
    }

    /// Margin mode is account-wide on BlockFin; `inst_id` is only logged
    #[instrument(skip(self))]
    pub async fn set_margin_mode(&self, inst_id: &str, mode: MarginMode) -> Result<Value> {
        let body = SetMarginModeBody {
            margin_mode: mode.as_str(),
        };
        self.rest
            .post_signed("/api/v1/account/set-margin-mode", Vec::new(), Some(&body))
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_leverage(
        &self,
        inst_id: &str,
        leverage: u32,
        margin_mode: MarginMode,
        position_side: PositionSide,
    ) -> Result<Value> {
        let body = SetLeverageBody {
            inst_id,
            leverage: leverage.to_string(),
            margin_mode: margin_mode.as_str(),
            position_side: position_side.as_str(),
        };
        self.rest
            .post_signed("/api/v1/account/set-leverage", Vec::new(), Some(&body))
            .await
    }

    // ========================================================================
    // Trading
    // ========================================================================

    /// Place an order sized in contracts; the raw ack is returned verbatim
    #[instrument(skip(self, order), fields(inst_id = %order.inst_id))]
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        let size = order.require_contracts()?;
        let price = match (order.order_type.is_priced(), order.price) {
            (true, Some(price)) => Some(price.normalize().to_string()),
            (true, None) => {
                return Err(ClientError::Validation(format!(
                    "{} order for {} needs a price",
                    order.order_type.as_str(),
                    order.inst_id
                )))
            }
            (false, _) => None,
        };

        let body = PlaceOrderBody {
            inst_id: &order.inst_id,
            margin_mode: order.margin_mode.as_str(),
            position_side: order.position_side.as_str(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            price,
            size: size.normalize().to_string(),
        };
        let raw = self
            .rest
            .post_order("/api/v1/trade/order", Vec::new(), Some(&body))
            .await?;
        Ok(OrderAck::new(Exchange::BlockFin, raw))
    }
}
