use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{ClientError, Result};
use crate::common::types::{
    MarginMode, OrderAck, OrderRequest, OrderSize, OrderType, PositionMode, PositionSide,
    PositionSnapshot, Side,
};
use crate::execution::PipelineOutcome;

/// One additional-entry step
///
/// `gap` is the adverse ROI (in percent) that triggers the rung, `amount` the
/// margin committed in quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRung {
    pub gap: Decimal,
    pub amount: Decimal,
}

impl EntryRung {
    pub fn new(gap: Decimal, amount: Decimal) -> Self {
        Self { gap, amount }
    }
}

/// Where a tracked position is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyState {
    /// Nothing entered yet
    Idle,
    /// First rung filled
    Entered,
    /// Additional rungs filled or pending
    Laddering,
    /// Operator stop; only a reset leaves this state
    Stopped,
}

/// Configuration and live state of one tracked position (e.g. `BTC_LONG`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSetting {
    pub id: String,
    pub inst_id: String,
    pub margin_mode: MarginMode,
    pub position_side: PositionSide,
    #[serde(default)]
    pub position_mode: PositionMode,
    pub leverage: u32,
    pub order_type: OrderType,
    pub ladder: Vec<EntryRung>,
    /// Next rung to fill. Never exceeds `ladder.len()`.
    #[serde(default)]
    pub current_entry_index: usize,
    #[serde(default)]
    pub trading: bool,
    #[serde(default)]
    pub stopped: bool,
    pub profit_point: Decimal,
    pub loss_point: Decimal,
}

impl PositionSetting {
    pub fn state(&self) -> StrategyState {
        if self.stopped {
            StrategyState::Stopped
        } else if !self.trading {
            StrategyState::Idle
        } else if self.current_entry_index <= 1 {
            StrategyState::Entered
        } else {
            StrategyState::Laddering
        }
    }

    pub fn current_rung(&self) -> Option<&EntryRung> {
        self.ladder.get(self.current_entry_index)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_entry_index >= self.ladder.len()
    }

    /// Move to the next rung. Saturates at `ladder.len()`.
    pub fn advance(&mut self) {
        if self.current_entry_index < self.ladder.len() {
            self.current_entry_index += 1;
        }
    }

    /// Back to idle at rung 0, clearing the stop flag
    pub fn reset(&mut self) {
        self.current_entry_index = 0;
        self.trading = false;
        self.stopped = false;
    }

    /// Side that opens (adds to) this position
    pub fn entry_side(&self) -> Side {
        match self.position_side {
            PositionSide::Short => Side::Sell,
            PositionSide::Long | PositionSide::Net => Side::Buy,
        }
    }

    /// Market order for `rung`, sized in quote currency
    pub fn order_for(&self, rung: &EntryRung) -> OrderRequest {
        OrderRequest {
            inst_id: self.inst_id.clone(),
            margin_mode: self.margin_mode,
            position_side: self.position_side,
            position_mode: self.position_mode,
            side: self.entry_side(),
            order_type: self.order_type,
            price: None,
            size: OrderSize::Quote(rung.amount),
            leverage: self.leverage,
            time_in_force: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() || self.inst_id.trim().is_empty() {
            return Err(ClientError::Configuration(
                "strategy id and instrument are required".to_string(),
            ));
        }
        if self.ladder.is_empty() {
            return Err(ClientError::Configuration(format!(
                "strategy {} has an empty entry ladder",
                self.id
            )));
        }
        if self.leverage == 0 {
            return Err(ClientError::Configuration(format!(
                "strategy {} has zero leverage",
                self.id
            )));
        }
        if self.current_entry_index > self.ladder.len() {
            return Err(ClientError::Configuration(format!(
                "strategy {} starts past the end of its ladder",
                self.id
            )));
        }
        if self.order_type.is_priced() {
            return Err(ClientError::Configuration(format!(
                "strategy {} must use market orders",
                self.id
            )));
        }
        Ok(())
    }
}

/// Leveraged ROI in percent, signed so that losses are negative for either side.
///
/// `None` when the average price is zero (no position yet).
/// A net `position_side` takes its sign from the pushed quantity.
pub fn roi(snapshot: &PositionSnapshot, position_side: PositionSide) -> Option<Decimal> {
    let change = (snapshot.mark_price - snapshot.average_price).checked_div(snapshot.average_price)?;
    let direction = position_side
        .direction()
        .unwrap_or_else(|| snapshot.direction());
    Some(change * snapshot.leverage * Decimal::ONE_HUNDRED * direction)
}

/// Whether `roi` is an adverse move at least as large as `gap`
pub fn should_add_entry(roi: Decimal, gap: Decimal) -> bool {
    roi < Decimal::ZERO && roi.abs() >= gap
}

/// Why an entry attempt did nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Another entry for the same strategy is in flight
    Busy,
    Stopped,
    AlreadyTrading,
    NotTrading,
    /// No first entry yet; the monitor only adds rungs
    AwaitingFirstEntry,
    LadderExhausted,
    /// Push for another instrument or side
    NotTracked,
    NoAveragePrice,
    BelowThreshold { roi: Decimal, gap: Decimal },
}

/// Result of one entry attempt
#[derive(Debug)]
pub enum EntryOutcome {
    /// Order accepted; `index` is the rung index after advancing
    Filled { outcome: PipelineOutcome, index: usize },
    /// The exchange answered but did not accept; nothing advanced
    Rejected { outcome: PipelineOutcome },
    /// Order accepted, but the setting was reset while it was in flight;
    /// the reset state is kept
    Superseded { outcome: PipelineOutcome },
    Skipped(SkipReason),
}

impl EntryOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, EntryOutcome::Filled { .. })
    }

    pub fn ack(&self) -> Option<&OrderAck> {
        match self {
            EntryOutcome::Filled { outcome, .. }
            | EntryOutcome::Rejected { outcome }
            | EntryOutcome::Superseded { outcome } => Some(&outcome.order),
            EntryOutcome::Skipped(_) => None,
        }
    }
}

/// Built-in strategy table used when none is configured
pub fn default_strategies() -> Vec<PositionSetting> {
    [
        ("BTC_LONG", "BTC-USDT", PositionSide::Long),
        ("BTC_SHORT", "BTC-USDT", PositionSide::Short),
        ("ETH_LONG", "ETH-USDT", PositionSide::Long),
        ("ETH_SHORT", "ETH-USDT", PositionSide::Short),
    ]
    .into_iter()
    .map(|(id, inst_id, position_side)| PositionSetting {
        id: id.to_string(),
        inst_id: inst_id.to_string(),
        margin_mode: MarginMode::Isolated,
        position_side,
        position_mode: PositionMode::Hedge,
        leverage: 2,
        order_type: OrderType::Market,
        ladder: vec![
            EntryRung::new(dec!(0), dec!(110)),
            EntryRung::new(dec!(0.6), dec!(30)),
        ],
        current_entry_index: 0,
        trading: false,
        stopped: false,
        profit_point: dec!(4.5),
        loss_point: dec!(2.1),
    })
    .collect()
}
