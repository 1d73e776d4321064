//! BlockFin-specific message types
//!
//! Request bodies are serialized once and the same bytes are signed and
//! sent, so field declaration order here is the wire order.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{ClientError, Result};
use crate::common::types::{Balance, PositionSide, PositionSnapshot, SymbolInfo};

/// In-band success code
pub const SUCCESS_CODE: &str = "0";

pub use crate::common::rest::envelope_data;

// ============================================================================
// REST responses
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentData {
    pub inst_id: String,
    pub contract_value: Decimal,
    pub lot_size: Decimal,
    pub tick_size: Decimal,
    pub max_leverage: Decimal,
    #[serde(default)]
    pub min_size: Option<Decimal>,
    #[serde(default)]
    pub state: Option<String>,
}

impl From<InstrumentData> for SymbolInfo {
    fn from(data: InstrumentData) -> Self {
        SymbolInfo {
            inst_id: data.inst_id,
            contract_value: data.contract_value,
            lot_size: data.lot_size,
            tick_size: data.tick_size,
            max_leverage: data.max_leverage.to_u32().unwrap_or(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookData {
    #[serde(default)]
    pub asks: Vec<Vec<Decimal>>,
    #[serde(default)]
    pub bids: Vec<Vec<Decimal>>,
    /// Milliseconds, as a string
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    pub inst_id: String,
    pub last: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceData {
    pub currency: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub available: Decimal,
    #[serde(default)]
    pub frozen: Decimal,
}

impl From<BalanceData> for Balance {
    fn from(data: BalanceData) -> Self {
        // some accounts only report `balance`
        let available = if data.available.is_zero() && data.frozen.is_zero() {
            data.balance
        } else {
            data.available
        };
        Balance {
            asset: data.currency,
            available,
            locked: data.frozen,
        }
    }
}

// ============================================================================
// REST request bodies
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPositionModeBody<'a> {
    pub position_mode: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMarginModeBody<'a> {
    pub margin_mode: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageBody<'a> {
    pub inst_id: &'a str,
    pub leverage: String,
    pub margin_mode: &'a str,
    pub position_side: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody<'a> {
    pub inst_id: &'a str,
    pub margin_mode: &'a str,
    pub position_side: &'a str,
    pub side: &'a str,
    pub order_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub size: String,
}

// ============================================================================
// WebSocket
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WsRequest<T> {
    pub op: &'static str,
    pub args: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsLoginArgs<'a> {
    pub api_key: &'a str,
    pub passphrase: &'a str,
    pub timestamp: String,
    pub sign: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsChannelArgs<'a> {
    pub channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<&'a str>,
}

/// A data push: `{"arg": {...}, "data": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct WsPush<T> {
    pub arg: WsPushArg,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsPushArg {
    pub channel: String,
    #[serde(default)]
    pub inst_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub inst_id: String,
    pub position_side: String,
    /// Signed contract count; negative for a net short
    #[serde(default)]
    pub positions: Decimal,
    pub mark_price: Decimal,
    pub average_price: Decimal,
    pub leverage: Decimal,
}

impl TryFrom<PositionData> for PositionSnapshot {
    type Error = ClientError;

    fn try_from(data: PositionData) -> Result<Self> {
        let position_side = match data.position_side.as_str() {
            "long" => PositionSide::Long,
            "short" => PositionSide::Short,
            "net" => PositionSide::Net,
            other => {
                return Err(ClientError::InvalidResponse(format!(
                    "unknown position side: {}",
                    other
                )))
            }
        };
        Ok(PositionSnapshot {
            inst_id: data.inst_id,
            position_side,
            quantity: data.positions,
            mark_price: data.mark_price,
            average_price: data.average_price,
            leverage: data.leverage,
        })
    }
}
