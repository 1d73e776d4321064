//! Common test utilities and fixtures
#![allow(dead_code)]

use exchange_gateway::{
    AppSettings, BinanceClient, BitgetClient, BlockFinClient, ExchangeConfig, PositionSide,
    PositionSnapshot,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Server time served by the mocked time endpoints
pub const SERVER_TIME: i64 = 1_700_000_000_000;

fn exchange_config(
    key: &str,
    secret: &str,
    passphrase: Option<&str>,
    base_url: &str,
) -> ExchangeConfig {
    ExchangeConfig {
        api_key: Some(key.to_string()),
        api_secret: Some(secret.to_string()),
        api_passphrase: passphrase.map(str::to_string),
        base_url: Some(base_url.to_string()),
        ..Default::default()
    }
}

pub fn binance_client(base_url: &str) -> BinanceClient {
    let config = exchange_config("binance_key", "binance_secret", None, base_url);
    BinanceClient::from_config(&config, &AppSettings::default()).expect("Failed to create Binance client")
}

pub fn bitget_client(base_url: &str) -> BitgetClient {
    let config = exchange_config("bitget_key", "bitget_secret", Some("bitget_pass"), base_url);
    BitgetClient::from_config(&config, &AppSettings::default()).expect("Failed to create Bitget client")
}

pub fn blockfin_client(base_url: &str) -> BlockFinClient {
    let config = exchange_config("blockfin_key", "blockfin_secret", Some("blockfin_pass"), base_url);
    BlockFinClient::from_config(&config, &AppSettings::default())
        .expect("Failed to create BlockFin client")
}

pub fn position(inst_id: &str, side: PositionSide, mark: Decimal, average: Decimal) -> PositionSnapshot {
    PositionSnapshot {
        inst_id: inst_id.to_string(),
        position_side: side,
        quantity: Decimal::ONE,
        mark_price: mark,
        average_price: average,
        leverage: Decimal::TWO,
    }
}

/// Bind a local listener and return it with its `ws://` URL
pub async fn local_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind local listener");
    let addr = listener.local_addr().expect("Listener has no address");
    (listener, format!("ws://{}", addr))
}

/// Canned exchange payloads
pub mod payloads {
    use super::*;

    pub fn binance_time() -> Value {
        json!({ "serverTime": SERVER_TIME })
    }

    pub fn binance_user_assets() -> Value {
        json!([
            {"asset": "USDT", "free": "120.5", "locked": "0", "freeze": "0", "withdrawing": "0", "ipoable": "0", "btcValuation": "0.0018"},
            {"asset": "BNB", "free": "0", "locked": "0", "freeze": "0", "withdrawing": "0", "ipoable": "0", "btcValuation": "0"}
        ])
    }

    pub fn bitget_time() -> Value {
        json!({
            "code": "00000",
            "msg": "success",
            "requestTime": SERVER_TIME,
            "data": { "serverTime": SERVER_TIME.to_string() }
        })
    }

    pub fn bitget_assets() -> Value {
        json!({
            "code": "00000",
            "msg": "success",
            "requestTime": SERVER_TIME,
            "data": [
                {"coin": "USDT", "available": "25.5", "frozen": "0", "locked": "0", "limitAvailable": "0", "uTime": "1700000000000"},
                {"coin": "BTC", "available": "0", "frozen": "0", "locked": "0", "limitAvailable": "0", "uTime": "1700000000000"}
            ]
        })
    }

    pub fn blockfin_instrument() -> Value {
        json!({
            "code": "0",
            "msg": "success",
            "data": [{
                "instId": "BTC-USDT", "baseCurrency": "BTC", "quoteCurrency": "USDT",
                "contractValue": "0.001", "maxLeverage": "150", "minSize": "0.1",
                "lotSize": "0.1", "tickSize": "0.1", "instType": "SWAP", "state": "live"
            }]
        })
    }

    pub fn blockfin_ticker(last: &str) -> Value {
        json!({
            "code": "0",
            "msg": "success",
            "data": [{"instId": "BTC-USDT", "last": last, "lastSize": "1", "ts": "1700000000000"}]
        })
    }

    pub fn blockfin_ok() -> Value {
        json!({ "code": "0", "msg": "success", "data": {} })
    }

    pub fn blockfin_order_ack(order_id: &str) -> Value {
        json!({
            "code": "0",
            "msg": "",
            "data": [{"orderId": order_id, "clientOrderId": "", "msg": "", "code": "0"}]
        })
    }

    pub fn blockfin_balances() -> Value {
        json!({
            "code": "0",
            "msg": "success",
            "data": [
                {"currency": "USDT", "balance": "100", "available": "90", "frozen": "10"},
                {"currency": "BTC", "balance": "0", "available": "0", "frozen": "0"}
            ]
        })
    }
}
