//! Bitget-specific message types (spot v2 API)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::{Balance, SymbolInfo};

/// In-band success code
pub const SUCCESS_CODE: &str = "00000";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolData {
    pub symbol: String,
    #[serde(default)]
    pub base_coin: Option<String>,
    #[serde(default)]
    pub quote_coin: Option<String>,
    pub price_precision: String,
    pub quantity_precision: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl SymbolData {
    fn step(precision: &str) -> Decimal {
        precision
            .parse::<u32>()
            .map(|scale| Decimal::new(1, scale))
            .unwrap_or(Decimal::ONE)
    }
}

impl From<SymbolData> for SymbolInfo {
    fn from(data: SymbolData) -> Self {
        SymbolInfo {
            lot_size: SymbolData::step(&data.quantity_precision),
            tick_size: SymbolData::step(&data.price_precision),
            inst_id: data.symbol,
            contract_value: Decimal::ONE,
            max_leverage: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookData {
    #[serde(default)]
    pub asks: Vec<Vec<Decimal>>,
    #[serde(default)]
    pub bids: Vec<Vec<Decimal>>,
    pub ts: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetData {
    pub coin: String,
    pub available: Decimal,
    #[serde(default)]
    pub frozen: Decimal,
    #[serde(default)]
    pub locked: Decimal,
}

impl From<AssetData> for Balance {
    fn from(data: AssetData) -> Self {
        Balance {
            asset: data.coin,
            available: data.available,
            locked: data.frozen + data.locked,
        }
    }
}

/// `POST /api/v2/spot/trade/place-order`. `price` and `force` only on limit orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody<'a> {
    pub symbol: &'a str,
    pub side: &'a str,
    pub order_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<&'a str>,
    pub size: String,
}

/// `POST /api/v2/spot/wallet/withdrawal`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBody<'a> {
    pub coin: &'a str,
    pub transfer_type: &'a str,
    pub address: &'a str,
    pub chain: &'a str,
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WsRequest<'a> {
    pub op: &'static str,
    pub args: Vec<WsChannelArgs<'a>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsChannelArgs<'a> {
    pub inst_type: &'a str,
    pub channel: &'a str,
    pub inst_id: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_symbol_steps_from_precision() {
        let data: SymbolData = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "baseCoin": "BTC", "quoteCoin": "USDT",
            "minTradeAmount": "0", "pricePrecision": "2", "quantityPrecision": "6",
            "status": "online"
        }))
        .unwrap();
        let info = SymbolInfo::from(data);
        assert_eq!(info.lot_size, dec!(0.000001));
        assert_eq!(info.tick_size, dec!(0.01));
        assert_eq!(info.contract_value, Decimal::ONE);
    }

    #[test]
    fn test_withdrawal_body_field_order() {
        let body = WithdrawalBody {
            coin: "TRX",
            transfer_type: "on_chain",
            address: "TYG9kqrCvhYSZSVD4N4dxpDCwo6fqGh7n1",
            chain: "TRX",
            size: "29".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"coin":"TRX","transferType":"on_chain","address":"TYG9kqrCvhYSZSVD4N4dxpDCwo6fqGh7n1","chain":"TRX","size":"29"}"#
        );
    }

    #[test]
    fn test_limit_order_body_includes_price_and_force() {
        let body = PlaceOrderBody {
            symbol: "BTCUSDT",
            side: "buy",
            order_type: "limit",
            price: Some("61000".to_string()),
            force: Some("gtc"),
            size: "0.01".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"symbol":"BTCUSDT","side":"buy","orderType":"limit","price":"61000","force":"gtc","size":"0.01"}"#
        );
    }
}
