//! Explicit state store for tracked positions
//!
//! Each strategy id maps to one [`StrategySlot`]. The slot's setting is only
//! touched under its async mutex, and an entry attempt must first win the
//! slot's in-flight flag with a compare-and-set. The mutex is never held
//! across exchange calls, so a reset can land while an entry is in flight;
//! the slot's generation lets the entry notice and drop its result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::types::PositionSetting;
use crate::common::errors::{ClientError, Result};

/// One tracked position and its entry guard
#[derive(Debug)]
pub struct StrategySlot {
    setting: Mutex<PositionSetting>,
    in_flight: AtomicBool,
    /// Bumped on every reset
    generation: AtomicU64,
}

impl StrategySlot {
    pub fn new(setting: PositionSetting) -> Self {
        Self {
            setting: Mutex::new(setting),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Claim the slot for one entry attempt. `None` while another attempt runs.
    pub fn try_acquire(self: &Arc<Self>) -> Option<EntryGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| EntryGuard { slot: self.clone() })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> PositionSetting {
        self.setting.lock().await.clone()
    }

    /// Setting plus the generation it belongs to
    pub async fn versioned_snapshot(&self) -> (PositionSetting, u64) {
        let setting = self.setting.lock().await;
        (setting.clone(), self.generation.load(Ordering::Acquire))
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Apply `f` under the slot lock
    pub async fn update<R>(&self, f: impl FnOnce(&mut PositionSetting) -> R) -> R {
        let mut setting = self.setting.lock().await;
        f(&mut setting)
    }

    /// Apply `f` only if no reset happened since `generation` was read
    pub async fn update_if_current<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut PositionSetting) -> R,
    ) -> Option<R> {
        let mut setting = self.setting.lock().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return None;
        }
        Some(f(&mut setting))
    }

    /// Apply `f` as a new generation, invalidating in-flight entries
    pub async fn reset_with<R>(&self, f: impl FnOnce(&mut PositionSetting) -> R) -> R {
        let mut setting = self.setting.lock().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        f(&mut setting)
    }
}

/// Releases the in-flight flag when dropped
#[derive(Debug)]
pub struct EntryGuard {
    slot: Arc<StrategySlot>,
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        self.slot.in_flight.store(false, Ordering::Release);
    }
}

/// Strategy id to slot. Built once at startup; entries are never removed.
#[derive(Debug, Default)]
pub struct StrategyStore {
    slots: HashMap<String, Arc<StrategySlot>>,
}

impl StrategyStore {
    /// Validates every setting and rejects duplicate ids
    pub fn new(settings: Vec<PositionSetting>) -> Result<Self> {
        let mut slots = HashMap::with_capacity(settings.len());
        for setting in settings {
            setting.validate()?;
            let id = setting.id.clone();
            if slots
                .insert(id.clone(), Arc::new(StrategySlot::new(setting)))
                .is_some()
            {
                return Err(ClientError::Configuration(format!(
                    "duplicate strategy id {}",
                    id
                )));
            }
        }
        Ok(Self { slots })
    }

    pub fn get(&self, id: &str) -> Result<Arc<StrategySlot>> {
        self.slots
            .get(id)
            .cloned()
            .ok_or_else(|| ClientError::UnknownStrategy(id.to_string()))
    }

    /// Ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub async fn snapshot(&self, id: &str) -> Result<PositionSetting> {
        Ok(self.get(id)?.snapshot().await)
    }

    pub async fn snapshot_all(&self) -> Vec<PositionSetting> {
        let mut settings = Vec::with_capacity(self.slots.len());
        for id in self.ids() {
            if let Some(slot) = self.slots.get(&id) {
                settings.push(slot.snapshot().await);
            }
        }
        settings
    }
}
