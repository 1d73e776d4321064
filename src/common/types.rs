//! Unified types used across all exchange clients

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Bitget,
    BlockFin,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::Binance => write!(f, "binance"),
            Exchange::Bitget => write!(f, "bitget"),
            Exchange::BlockFin => write!(f, "blockfin"),
        }
    }
}

impl std::str::FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Exchange::Binance),
            "bitget" => Ok(Exchange::Bitget),
            "blockfin" | "blofin" => Ok(Exchange::BlockFin),
            other => Err(format!("unknown exchange: {}", other)),
        }
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position side under hedge-mode tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    /// One-way mode
    Net,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
            PositionSide::Net => "net",
        }
    }

    /// Sign applied to price moves when computing ROI. `None` for net
    /// positions, whose sign comes from the quantity.
    pub fn direction(&self) -> Option<Decimal> {
        match self {
            PositionSide::Long => Some(Decimal::ONE),
            PositionSide::Short => Some(Decimal::NEGATIVE_ONE),
            PositionSide::Net => None,
        }
    }
}

/// Collateral allocation for a derivative position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::Isolated => "isolated",
            MarginMode::Cross => "cross",
        }
    }
}

/// Account-level position mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// One-way (`net_mode`)
    OneWay,
    /// Hedge (`long_short_mode`)
    #[default]
    Hedge,
}

impl PositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionMode::OneWay => "net_mode",
            PositionMode::Hedge => "long_short_mode",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    PostOnly,
    Fok,
    Ioc,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::PostOnly => "post_only",
            OrderType::Fok => "fok",
            OrderType::Ioc => "ioc",
        }
    }

    /// Whether the order carries a price
    pub fn is_priced(&self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

/// Instrument metadata. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub inst_id: String,
    /// Base units per contract (1 for spot)
    pub contract_value: Decimal,
    /// Smallest order size increment, in contracts
    pub lot_size: Decimal,
    /// Smallest price increment
    pub tick_size: Decimal,
    pub max_leverage: u32,
}

/// A nonzero asset balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub available: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    pub fn is_nonzero(&self) -> bool {
        !self.total().is_zero()
    }
}

/// A single price level in an order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Build levels from `[[price, size, ...], ...]` rows, skipping malformed rows
    pub fn from_rows(rows: Vec<Vec<Decimal>>) -> Vec<Self> {
        rows.into_iter()
            .filter_map(|row| match row.as_slice() {
                [price, size, ..] => Some(Self::new(*price, *size)),
                _ => None,
            })
            .collect()
    }
}

/// Order book snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange: Exchange,
    pub inst_id: String,
    /// Bids sorted by price descending
    pub bids: Vec<PriceLevel>,
    /// Asks sorted by price ascending
    pub asks: Vec<PriceLevel>,
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }
}

/// How much to trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "unit", content = "value")]
pub enum OrderSize {
    /// Margin in quote currency; converted to contracts using leverage and the last price
    Quote(Decimal),
    /// Exchange-native quantity (contracts on derivatives, base units on spot)
    Contracts(Decimal),
}

/// An order to submit. Not retained after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub inst_id: String,
    pub margin_mode: MarginMode,
    pub position_side: PositionSide,
    #[serde(default)]
    pub position_mode: PositionMode,
    pub side: Side,
    pub order_type: OrderType,
    #[serde(default)]
    pub price: Option<Decimal>,
    pub size: OrderSize,
    pub leverage: u32,
    /// Time in force for priced spot orders (`GTC`, `IOC`, ...)
    #[serde(default)]
    pub time_in_force: Option<String>,
}

impl OrderRequest {
    /// A market order sized in quote currency
    pub fn market(
        inst_id: impl Into<String>,
        side: Side,
        position_side: PositionSide,
        amount: Decimal,
        leverage: u32,
    ) -> Self {
        Self {
            inst_id: inst_id.into(),
            margin_mode: MarginMode::Isolated,
            position_side,
            position_mode: PositionMode::Hedge,
            side,
            order_type: OrderType::Market,
            price: None,
            size: OrderSize::Quote(amount),
            leverage,
            time_in_force: None,
        }
    }

    /// Size in exchange-native units, if already resolved
    pub fn contracts(&self) -> Option<Decimal> {
        match self.size {
            OrderSize::Contracts(size) => Some(size),
            OrderSize::Quote(_) => None,
        }
    }

    pub(crate) fn require_contracts(&self) -> crate::common::errors::Result<Decimal> {
        self.contracts().ok_or_else(|| {
            crate::common::errors::ClientError::Validation(format!(
                "order for {} is sized in quote currency; resolve it to contracts first",
                self.inst_id
            ))
        })
    }
}

/// Raw exchange acknowledgment for a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub exchange: Exchange,
    pub raw: serde_json::Value,
}

impl OrderAck {
    pub fn new(exchange: Exchange, raw: serde_json::Value) -> Self {
        Self { exchange, raw }
    }

    /// In-band status code, if the payload carries one
    pub fn code(&self) -> Option<String> {
        match self.raw.get("code")? {
            serde_json::Value::String(code) => Some(code.clone()),
            serde_json::Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }

    /// Whether the exchange reports the order as accepted
    pub fn is_success(&self) -> bool {
        match self.exchange {
            Exchange::BlockFin => self.code().as_deref() == Some("0"),
            Exchange::Bitget => self.code().as_deref() == Some("00000"),
            Exchange::Binance => self.raw.get("orderId").is_some(),
        }
    }

    pub fn order_id(&self) -> Option<String> {
        let id = match self.exchange {
            Exchange::Binance => self.raw.get("orderId"),
            Exchange::Bitget => self.raw.pointer("/data/orderId"),
            Exchange::BlockFin => self.raw.pointer("/data/0/orderId"),
        }?;
        match id {
            serde_json::Value::String(id) => Some(id.clone()),
            serde_json::Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Withdrawal request (spot wallets)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub coin: String,
    /// Network / chain name
    pub chain: String,
    pub address: String,
    pub amount: Decimal,
}

/// Position state pushed by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub inst_id: String,
    pub position_side: PositionSide,
    /// Contracts held; negative for a short in one-way mode
    #[serde(default)]
    pub quantity: Decimal,
    pub mark_price: Decimal,
    pub average_price: Decimal,
    pub leverage: Decimal,
}

impl PositionSnapshot {
    /// +1 for a long exposure, -1 for a short one. A net position is short
    /// when its quantity is negative.
    pub fn direction(&self) -> Decimal {
        self.position_side.direction().unwrap_or(if self.quantity < Decimal::ZERO {
            Decimal::NEGATIVE_ONE
        } else {
            Decimal::ONE
        })
    }

    /// Side that adds to this position
    pub fn entry_side(&self) -> Side {
        if self.direction() < Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}
