//! Additional-entry engine
//!
//! Drives each [`PositionSetting`] through its ladder: an explicit call opens
//! the first rung, and adverse ROI on position pushes fills the following
//! ones. Entry attempts for one setting never overlap; a trigger that arrives
//! while one is in flight is dropped.

use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::store::{StrategySlot, StrategyStore};
use super::types::{
    roi, should_add_entry, EntryOutcome, EntryRung, PositionSetting, SkipReason, StrategyState,
};
use crate::common::errors::Result;
use crate::common::types::{PositionSide, PositionSnapshot, Side};
use crate::execution::OrderPipeline;

/// Counters from one monitor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub pushes: u64,
    pub entries: u64,
    pub errors: u64,
}

pub struct StrategyEngine {
    store: Arc<StrategyStore>,
    pipeline: OrderPipeline,
}

impl StrategyEngine {
    pub fn new(store: Arc<StrategyStore>, pipeline: OrderPipeline) -> Self {
        Self { store, pipeline }
    }

    pub fn store(&self) -> &Arc<StrategyStore> {
        &self.store
    }

    /// Open the first rung of an idle setting
    #[instrument(skip(self))]
    pub async fn enter_position(&self, id: &str) -> Result<EntryOutcome> {
        let slot = self.store.get(id)?;
        let Some(_guard) = slot.try_acquire() else {
            return Ok(EntryOutcome::Skipped(SkipReason::Busy));
        };

        let (setting, generation) = slot.versioned_snapshot().await;
        if setting.stopped {
            return Ok(EntryOutcome::Skipped(SkipReason::Stopped));
        }
        if setting.trading {
            return Ok(EntryOutcome::Skipped(SkipReason::AlreadyTrading));
        }
        let Some(rung) = setting.current_rung().copied() else {
            return Ok(EntryOutcome::Skipped(SkipReason::LadderExhausted));
        };

        let side = setting.entry_side();
        self.fill_rung(&slot, &setting, generation, rung, side).await
    }

    /// Open the first rung of each listed setting, in order. Failures are
    /// logged and do not stop the remaining entries.
    pub async fn enter_all(&self, ids: &[String]) -> Vec<(String, Result<EntryOutcome>)> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.enter_position(id).await;
            match &result {
                Ok(outcome) => info!("{} entry: {:?}", id, outcome),
                Err(e) => error!("{} entry failed: {}", id, e),
            }
            results.push((id.clone(), result));
        }
        results
    }

    /// Evaluate one position push for `id` and add an entry if ROI crossed
    /// the current rung's gap
    #[instrument(skip(self, snapshot), fields(inst_id = %snapshot.inst_id))]
    pub async fn on_position_update(
        &self,
        id: &str,
        snapshot: &PositionSnapshot,
    ) -> Result<EntryOutcome> {
        let slot = self.store.get(id)?;
        let Some(_guard) = slot.try_acquire() else {
            debug!("Entry in flight, dropping push");
            return Ok(EntryOutcome::Skipped(SkipReason::Busy));
        };

        let (setting, generation) = slot.versioned_snapshot().await;
        if !tracks(&setting, snapshot) {
            return Ok(EntryOutcome::Skipped(SkipReason::NotTracked));
        }
        if setting.stopped {
            return Ok(EntryOutcome::Skipped(SkipReason::Stopped));
        }
        if !setting.trading {
            return Ok(EntryOutcome::Skipped(SkipReason::NotTrading));
        }
        if setting.current_entry_index == 0 {
            return Ok(EntryOutcome::Skipped(SkipReason::AwaitingFirstEntry));
        }
        let Some(rung) = setting.current_rung().copied() else {
            return Ok(EntryOutcome::Skipped(SkipReason::LadderExhausted));
        };
        let Some(roi) = roi(snapshot, setting.position_side) else {
            return Ok(EntryOutcome::Skipped(SkipReason::NoAveragePrice));
        };
        if !should_add_entry(roi, rung.gap) {
            return Ok(EntryOutcome::Skipped(SkipReason::BelowThreshold {
                roi,
                gap: rung.gap,
            }));
        }

        info!(
            "ROI {}% crossed gap {} at rung {}",
            roi.round_dp(4),
            rung.gap,
            setting.current_entry_index
        );
        let side = match setting.position_side {
            PositionSide::Net => snapshot.entry_side(),
            _ => setting.entry_side(),
        };
        self.fill_rung(&slot, &setting, generation, rung, side).await
    }

    /// Feed every push to the settings that track it until the stream ends.
    ///
    /// Errors (bad pushes, failed entries) are logged and the loop moves on to
    /// the next push.
    pub async fn monitor<S>(&self, mut pushes: S) -> MonitorSummary
    where
        S: Stream<Item = Result<PositionSnapshot>> + Unpin,
    {
        let mut summary = MonitorSummary::default();

        while let Some(push) = pushes.next().await {
            summary.pushes += 1;
            let snapshot = match push {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Unusable position push: {}", e);
                    summary.errors += 1;
                    continue;
                }
            };

            for id in self.store.ids() {
                match self.on_position_update(&id, &snapshot).await {
                    Ok(EntryOutcome::Filled { index, .. }) => {
                        info!("{} added entry, now at rung {}", id, index);
                        summary.entries += 1;
                    }
                    Ok(EntryOutcome::Rejected { outcome }) => {
                        warn!("{} entry rejected: {}", id, outcome.order.raw);
                        summary.errors += 1;
                    }
                    Ok(EntryOutcome::Superseded { .. }) => {
                        warn!("{} was reset while adding an entry", id);
                    }
                    Ok(EntryOutcome::Skipped(SkipReason::NotTracked)) => {}
                    Ok(EntryOutcome::Skipped(reason)) => debug!("{} skipped: {:?}", id, reason),
                    Err(e) => {
                        error!("{} entry failed, continuing: {}", id, e);
                        summary.errors += 1;
                    }
                }
            }
        }

        info!("Position stream ended: {:?}", summary);
        summary
    }

    /// Operator stop. No automatic entries happen until [`Self::reset`].
    #[instrument(skip(self))]
    pub async fn stop(&self, id: &str) -> Result<PositionSetting> {
        let slot = self.store.get(id)?;
        let setting = slot
            .update(|s| {
                s.stopped = true;
                s.clone()
            })
            .await;
        info!("Strategy stopped");
        Ok(setting)
    }

    /// Back to idle at rung 0. An entry in flight keeps its exchange order but
    /// no longer updates this setting.
    #[instrument(skip(self))]
    pub async fn reset(&self, id: &str) -> Result<PositionSetting> {
        let slot = self.store.get(id)?;
        let setting = slot
            .reset_with(|s| {
                s.reset();
                s.clone()
            })
            .await;
        info!("Strategy reset");
        Ok(setting)
    }

    pub async fn snapshot(&self, id: &str) -> Result<PositionSetting> {
        self.store.snapshot(id).await
    }

    pub async fn state(&self, id: &str) -> Result<StrategyState> {
        Ok(self.store.snapshot(id).await?.state())
    }

    /// Run the pipeline for `rung`. Caller holds the slot's entry guard and
    /// read `setting` at `generation`.
    async fn fill_rung(
        &self,
        slot: &StrategySlot,
        setting: &PositionSetting,
        generation: u64,
        rung: EntryRung,
        side: Side,
    ) -> Result<EntryOutcome> {
        let mut order = setting.order_for(&rung);
        order.side = side;
        let outcome = self.pipeline.execute(&order).await?;

        if !outcome.order.is_success() {
            warn!("Exchange did not accept entry: {}", outcome.order.raw);
            return Ok(EntryOutcome::Rejected { outcome });
        }

        let advanced = slot
            .update_if_current(generation, |s| {
                s.trading = true;
                s.advance();
                s.current_entry_index
            })
            .await;
        let Some(index) = advanced else {
            warn!("{} was reset during the entry, leaving it idle", setting.id);
            return Ok(EntryOutcome::Superseded { outcome });
        };
        info!(
            "Entry filled for {} ({} contracts), next rung {}",
            setting.id, outcome.size, index
        );
        Ok(EntryOutcome::Filled { outcome, index })
    }
}

/// Whether a push concerns this setting's instrument and side
fn tracks(setting: &PositionSetting, snapshot: &PositionSnapshot) -> bool {
    setting.inst_id == snapshot.inst_id
        && (setting.position_side == PositionSide::Net
            || setting.position_side == snapshot.position_side)
}
