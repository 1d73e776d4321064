//! Integration tests for the signed REST clients
//!
//! Every exchange is served by a local `wiremock` server, so these run
//! offline and check what actually goes over the wire: signing headers,
//! server-time lookups, parameter order and how rejections surface.

mod common;

use common::{payloads, SERVER_TIME};
use exchange_gateway::{
    ClientError, ExchangeClient, OrderPipeline, OrderRequest, OrderSize, PipelineStep,
    PositionSide, Side, StrategyEngine, StrategyState, StrategyStore, WithdrawalRequest,
};
use exchange_gateway::strategy::default_strategies;
use exchange_gateway::EntryOutcome;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Binance
// ============================================================================

#[tokio::test]
async fn test_binance_fetches_server_time_for_every_signed_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::binance_time()))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sapi/v3/asset/getUserAsset"))
        .and(header("X-MBX-APIKEY", "binance_key"))
        .and(query_param("timestamp", SERVER_TIME.to_string()))
        .and(query_param("recvWindow", "60000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::binance_user_assets()))
        .expect(2)
        .mount(&server)
        .await;

    let client = common::binance_client(&server.uri());
    let first = client.get_balances().await.expect("first balance call failed");
    let second = client.get_balances().await.expect("second balance call failed");

    assert_eq!(first, second);
    assert_eq!(first.len(), 1, "zero balances should be filtered out");
    assert_eq!(first[0].asset, "USDT");
    assert_eq!(first[0].available, dec!(120.5));

    let requests = server.received_requests().await.expect("request recording is on");
    let asset_call = requests
        .iter()
        .find(|r| r.url.path() == "/sapi/v3/asset/getUserAsset")
        .expect("asset call was recorded");
    assert_eq!(
        asset_call.url.query(),
        Some("timestamp=1700000000000&recvWindow=60000&signature=8dbd1c85961252452c12e8bd4f5f54d70c9ffb61699d07d9914f78389e469ef0")
    );
}

#[tokio::test]
async fn test_binance_order_rejection_surfaces_raw_payload() {
    let server = MockServer::start().await;
    let rejection = json!({"code": -2010, "msg": "Account has insufficient balance for requested action."});

    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::binance_time()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("side", "BUY"))
        .and(query_param("type", "MARKET"))
        .and(query_param("quantity", "0.01"))
        .respond_with(ResponseTemplate::new(400).set_body_json(rejection.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::binance_client(&server.uri());
    let mut order = OrderRequest::market("BTCUSDT", Side::Buy, PositionSide::Net, dec!(0), 1);
    order.size = OrderSize::Contracts(dec!(0.01));

    match client.submit_order(&order).await {
        Err(ClientError::ExchangeRejection { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, rejection);
        }
        other => panic!("expected exchange rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_binance_quote_sized_order_is_refused_before_any_call() {
    let server = MockServer::start().await;
    let client = common::binance_client(&server.uri());
    let order = OrderRequest::market("BTCUSDT", Side::Buy, PositionSide::Net, dec!(100), 1);

    let result = client.submit_order(&order).await;

    assert!(matches!(result, Err(ClientError::Validation(_))));
    let requests = server.received_requests().await.expect("request recording is on");
    assert!(requests.is_empty());
}

// ============================================================================
// Bitget
// ============================================================================

#[tokio::test]
async fn test_bitget_signs_with_server_time() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v2/public/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::bitget_time()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/spot/account/assets"))
        .and(header("ACCESS-KEY", "bitget_key"))
        .and(header("ACCESS-SIGN", "nV8Lj0RmmX85qYFm/Tb3oE/P387Zhuv1vZqzJ+iwveQ="))
        .and(header("ACCESS-TIMESTAMP", "1700000000000"))
        .and(header("ACCESS-PASSPHRASE", "bitget_pass"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::bitget_assets()))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::bitget_client(&server.uri());
    let balances = client.get_balances().await.expect("asset call failed");

    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].asset, "USDT");
    assert_eq!(balances[0].total(), dec!(25.5));
}

#[tokio::test]
async fn test_bitget_withdrawal_body_order_is_preserved() {
    let server = MockServer::start().await;
    let expected_body = json!({
        "coin": "TRX",
        "transferType": "on_chain",
        "address": "TYG9kqrCvhYSZSVD4N4dxpDCwo6fqGh7n1",
        "chain": "TRX",
        "size": "29"
    });

    Mock::given(method("GET"))
        .and(path("/api/v2/public/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::bitget_time()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/spot/wallet/withdrawal"))
        .and(header_exists("ACCESS-SIGN"))
        .and(body_json(expected_body))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": "00000", "msg": "success", "data": {"orderId": "1", "clientOid": null}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = common::bitget_client(&server.uri());
    let response = client
        .withdraw(&WithdrawalRequest {
            coin: "TRX".to_string(),
            chain: "TRX".to_string(),
            address: "TYG9kqrCvhYSZSVD4N4dxpDCwo6fqGh7n1".to_string(),
            amount: dec!(29),
        })
        .await
        .expect("withdrawal call failed");
    assert_eq!(response["code"], "00000");

    let requests = server.received_requests().await.expect("request recording is on");
    let withdrawal = requests
        .iter()
        .find(|r| r.url.path() == "/api/v2/spot/wallet/withdrawal")
        .expect("withdrawal was recorded");
    assert_eq!(
        String::from_utf8_lossy(&withdrawal.body),
        r#"{"coin":"TRX","transferType":"on_chain","address":"TYG9kqrCvhYSZSVD4N4dxpDCwo6fqGh7n1","chain":"TRX","size":"29"}"#
    );
}

// ============================================================================
// BlockFin
// ============================================================================

#[tokio::test]
async fn test_blockfin_signed_get_carries_nonce_headers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/asset/balances"))
        .and(query_param("accountType", "funding"))
        .and(header("ACCESS-KEY", "blockfin_key"))
        .and(header("ACCESS-PASSPHRASE", "blockfin_pass"))
        .and(header_exists("ACCESS-SIGN"))
        .and(header_exists("ACCESS-TIMESTAMP"))
        .and(header_exists("ACCESS-NONCE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_balances()))
        .expect(1)
        .mount(&server)
        .await;

    let client = common::blockfin_client(&server.uri());
    let balances = client.get_balances().await.expect("balance call failed");

    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].asset, "USDT");
    assert_eq!(balances[0].available, dec!(90));
    assert_eq!(balances[0].locked, dec!(10));
}

#[tokio::test]
async fn test_blockfin_in_band_query_error_is_rejection() {
    let server = MockServer::start().await;
    let payload = json!({"code": "152001", "msg": "Parameter accountType error"});

    Mock::given(method("GET"))
        .and(path("/api/v1/asset/balances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .mount(&server)
        .await;

    let client = common::blockfin_client(&server.uri());
    match client.get_balances().await {
        Err(ClientError::ExchangeRejection { status, body }) => {
            assert_eq!(status, 200);
            assert_eq!(body, payload);
        }
        other => panic!("expected exchange rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blockfin_order_ack_is_returned_verbatim() {
    let server = MockServer::start().await;
    let payload = json!({"code": "102015", "msg": "Insufficient margin", "data": []});

    Mock::given(method("POST"))
        .and(path("/api/v1/trade/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
        .mount(&server)
        .await;

    let client = common::blockfin_client(&server.uri());
    let mut order = OrderRequest::market("BTC-USDT", Side::Buy, PositionSide::Long, dec!(0), 2);
    order.size = OrderSize::Contracts(dec!(1));

    let ack = client.submit_order(&order).await.expect("transport succeeded");
    assert_eq!(ack.raw, payload);
    assert!(!ack.is_success());
    assert_eq!(ack.code().as_deref(), Some("102015"));
}

async fn mount_blockfin_pipeline(server: &MockServer, margin_status: u16, orders: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v1/market/instruments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_instrument()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/market/tickers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_ticker("50000")))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/account/set-position-mode"))
        .and(body_json(json!({"positionMode": "long_short_mode"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_ok()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/account/set-margin-mode"))
        .respond_with(
            ResponseTemplate::new(margin_status).set_body_json(json!({"code": "500", "msg": "busy"})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/account/set-leverage"))
        .and(body_json(json!({
            "instId": "BTC-USDT",
            "leverage": "2",
            "marginMode": "isolated",
            "positionSide": "long"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_ok()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trade/order"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payloads::blockfin_order_ack("28150801")))
        .expect(orders)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_blockfin_pipeline_continues_past_failed_margin_mode() {
    let server = MockServer::start().await;
    mount_blockfin_pipeline(&server, 500, 1).await;

    let client = Arc::new(common::blockfin_client(&server.uri()));
    let pipeline = OrderPipeline::new(client);
    let order = OrderRequest::market("BTC-USDT", Side::Buy, PositionSide::Long, dec!(110), 2);

    let outcome = pipeline.execute(&order).await.expect("pipeline failed");

    assert_eq!(outcome.size, dec!(4.4));
    assert_eq!(outcome.steps.len(), 3);
    let failed: Vec<PipelineStep> = outcome.failed_steps().map(|s| s.step).collect();
    assert_eq!(failed, vec![PipelineStep::MarginMode]);
    assert!(outcome.order.is_success());
    assert_eq!(outcome.order.order_id().as_deref(), Some("28150801"));

    let requests = server.received_requests().await.expect("request recording is on");
    let order_call = requests
        .iter()
        .find(|r| r.url.path() == "/api/v1/trade/order")
        .expect("order was recorded");
    assert_eq!(
        String::from_utf8_lossy(&order_call.body),
        r#"{"instId":"BTC-USDT","marginMode":"isolated","positionSide":"long","side":"buy","orderType":"market","size":"4.4"}"#
    );
}

#[tokio::test]
async fn test_blockfin_strategy_ladder_end_to_end() {
    let server = MockServer::start().await;
    mount_blockfin_pipeline(&server, 200, 2).await;

    let client = Arc::new(common::blockfin_client(&server.uri()));
    let store = Arc::new(StrategyStore::new(default_strategies()).expect("default table is valid"));
    let engine = StrategyEngine::new(store, OrderPipeline::new(client));

    let first = engine.enter_position("BTC_LONG").await.expect("entry failed");
    assert!(first.is_filled());
    assert_eq!(engine.state("BTC_LONG").await.unwrap(), StrategyState::Entered);

    // -2% ROI at 2x crosses the 0.6 gap of rung 1
    let push = common::position("BTC-USDT", PositionSide::Long, dec!(49500), dec!(50000));
    let second = engine
        .on_position_update("BTC_LONG", &push)
        .await
        .expect("update failed");
    match second {
        EntryOutcome::Filled { outcome, index } => {
            assert_eq!(index, 2);
            assert_eq!(outcome.size, dec!(1.2));
        }
        other => panic!("expected a fill, got {:?}", other),
    }

    let setting = engine.snapshot("BTC_LONG").await.unwrap();
    assert!(setting.is_exhausted());
    assert_eq!(setting.state(), StrategyState::Laddering);

    let third = engine.on_position_update("BTC_LONG", &push).await.unwrap();
    assert!(!third.is_filled());
}
