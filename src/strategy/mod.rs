//! Additional-entry strategy
//!
//! Each tracked position (`BTC_LONG`, `ETH_SHORT`, ...) carries a ladder of
//! entry rungs. The first rung is opened explicitly; the rest are filled as
//! the position moves against us.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  enter_position(id)            position pushes (stream)     │
//! │        │                              │                     │
//! │        │                              ▼                     │
//! │        │                   roi = (mark - avg) / avg         │
//! │        │                         * leverage * 100 * dir     │
//! │        │                              │ roi < 0 and         │
//! │        │                              │ |roi| >= gap        │
//! │        ▼                              ▼                     │
//! │  StrategySlot::try_acquire()  (in-flight CAS, drop if busy) │
//! │        │                                                    │
//! │        ▼                                                    │
//! │  OrderPipeline::execute()     (no lock held)                │
//! │        │                                                    │
//! │        ▼ (ack accepted)                                     │
//! │  trading = true, current_entry_index += 1                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # States
//!
//! `Idle` → `Entered` → `Laddering`, and `Stopped` from anywhere on operator
//! request. Only [`StrategyEngine::reset`] leaves `Stopped`.

mod engine;
mod store;
mod types;

pub use engine::{MonitorSummary, StrategyEngine};
pub use store::{EntryGuard, StrategySlot, StrategyStore};
pub use types::{
    default_strategies, roi, should_add_entry, EntryOutcome, EntryRung, PositionSetting,
    SkipReason, StrategyState,
};
