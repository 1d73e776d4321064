//! ExchangeGateway Library
//!
//! Signed REST and WebSocket clients for Binance, Bitget and BlockFin, a
//! derivatives order pipeline, an additional-entry strategy engine and an
//! upstream-to-downstream stream relay.

pub mod binance;
pub mod bitget;
pub mod blockfin;
pub mod common;
pub mod config;
pub mod execution;
pub mod relay;
pub mod strategy;

// Re-export commonly used types
pub use common::auth::{Credential, Signature, SignedRequest, Signer};
pub use common::errors::{ClientError, Result};
pub use common::traits::{DerivativesClient, ExchangeClient, MessageStream};
pub use common::types::{
    Balance, Exchange, MarginMode, OrderAck, OrderBook, OrderRequest, OrderSize, OrderType,
    PositionMode, PositionSide, PositionSnapshot, PriceLevel, Side, SymbolInfo, WithdrawalRequest,
};
pub use config::types::{AppConfig, AppSettings, ExchangeConfig};

// Exchange clients
pub use binance::BinanceClient;
pub use bitget::BitgetClient;
pub use blockfin::BlockFinClient;

// Execution, strategy and relay
pub use execution::{OrderPipeline, PipelineOutcome, PipelineStep, StepReport, StepStatus};
pub use relay::{
    ChannelDownstream, ChannelSubscription, Downstream, RelayHandle, RelayReport, StreamRelay,
    TerminationReason, WebSocketDownstream,
};
pub use strategy::{
    EntryOutcome, EntryRung, PositionSetting, SkipReason, StrategyEngine, StrategyState,
    StrategyStore,
};
