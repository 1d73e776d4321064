//! Binance-specific message types

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::common::types::{Balance, SymbolInfo};

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolData {
    pub symbol: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// The filters we read; everything else is ignored
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { step_size: Decimal },
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter { tick_size: Decimal },
    #[serde(other)]
    Other,
}

impl From<SymbolData> for SymbolInfo {
    fn from(data: SymbolData) -> Self {
        let mut lot_size = Decimal::ZERO;
        let mut tick_size = Decimal::ZERO;
        for filter in data.filters {
            match filter {
                SymbolFilter::LotSize { step_size } => lot_size = step_size.normalize(),
                SymbolFilter::PriceFilter { tick_size: tick } => tick_size = tick.normalize(),
                SymbolFilter::Other => {}
            }
        }
        SymbolInfo {
            inst_id: data.symbol,
            contract_value: Decimal::ONE,
            lot_size,
            tick_size,
            max_leverage: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthData {
    pub last_update_id: u64,
    #[serde(default)]
    pub bids: Vec<Vec<Decimal>>,
    #[serde(default)]
    pub asks: Vec<Vec<Decimal>>,
}

/// One row of `POST /sapi/v3/asset/getUserAsset`
#[derive(Debug, Clone, Deserialize)]
pub struct UserAssetData {
    pub asset: String,
    pub free: Decimal,
    #[serde(default)]
    pub locked: Decimal,
    #[serde(default)]
    pub freeze: Decimal,
    #[serde(default)]
    pub withdrawing: Decimal,
}

impl From<UserAssetData> for Balance {
    fn from(data: UserAssetData) -> Self {
        Balance {
            asset: data.asset,
            available: data.free,
            locked: data.locked + data.freeze + data.withdrawing,
        }
    }
}
