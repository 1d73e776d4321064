//! Per-instrument metadata cache

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::SymbolInfo;

/// Cache of [`SymbolInfo`] keyed by instrument id.
///
/// Entries are never edited in place; a refresh swaps in a new `Arc`, so
/// readers holding the old one keep a consistent view.
#[derive(Debug, Default)]
pub struct SymbolCache {
    entries: RwLock<HashMap<String, Arc<SymbolInfo>>>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, inst_id: &str) -> Option<Arc<SymbolInfo>> {
        self.entries.read().await.get(inst_id).cloned()
    }

    /// Store `info`, replacing whatever was cached for its instrument
    pub async fn replace(&self, info: SymbolInfo) -> Arc<SymbolInfo> {
        let info = Arc::new(info);
        self.entries
            .write()
            .await
            .insert(info.inst_id.clone(), info.clone());
        info
    }

    pub async fn invalidate(&self, inst_id: &str) {
        self.entries.write().await.remove(inst_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn info(lot: rust_decimal::Decimal) -> SymbolInfo {
        SymbolInfo {
            inst_id: "BTC-USDT".to_string(),
            contract_value: dec!(0.001),
            lot_size: lot,
            tick_size: dec!(0.1),
            max_leverage: 150,
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let cache = SymbolCache::new();
        let first = cache.replace(info(dec!(0.1))).await;
        let second = cache.replace(info(dec!(1))).await;

        // old handle is untouched
        assert_eq!(first.lot_size, dec!(0.1));
        assert_eq!(cache.get("BTC-USDT").await.unwrap().lot_size, dec!(1));
        assert!(Arc::ptr_eq(&second, &cache.get("BTC-USDT").await.unwrap()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SymbolCache::new();
        cache.replace(info(dec!(0.1))).await;
        cache.invalidate("BTC-USDT").await;
        assert!(cache.is_empty().await);
        assert!(cache.get("BTC-USDT").await.is_none());
    }
}
