use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::PriceBar;
use crate::Result;

/// Idempotent bar persistence keyed by bar timestamp.
#[async_trait]
pub trait BarStore: Send + Sync {
    async fn find_by_timestamp(&self, timestamp: DateTime<Utc>) -> Result<Option<PriceBar>>;

    /// Insert unless a bar with the same timestamp already exists. Returns
    /// true when the bar was actually inserted, so repeated syncs of an
    /// overlapping history never duplicate bars.
    async fn insert(&self, bar: PriceBar) -> Result<bool>;

    /// Bars with `from <= timestamp <= to`, ordered by timestamp.
    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<PriceBar>>;
}

/// In-memory store over a timestamp-ordered map.
#[derive(Debug, Default)]
pub struct MemoryBarStore {
    bars: RwLock<BTreeMap<DateTime<Utc>, PriceBar>>,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.bars.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bars.read().await.is_empty()
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn find_by_timestamp(&self, timestamp: DateTime<Utc>) -> Result<Option<PriceBar>> {
        Ok(self.bars.read().await.get(&timestamp).cloned())
    }

    async fn insert(&self, bar: PriceBar) -> Result<bool> {
        let mut bars = self.bars.write().await;
        if bars.contains_key(&bar.timestamp) {
            return Ok(false);
        }
        bars.insert(bar.timestamp, bar);
        Ok(true)
    }

    async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        ascending: bool,
    ) -> Result<Vec<PriceBar>> {
        let bars = self.bars.read().await;
        let mut result: Vec<PriceBar> = bars.range(from..=to).map(|(_, b)| b.clone()).collect();
        if !ascending {
            result.reverse();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar_at(minute: u32, close: f64) -> PriceBar {
        PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 3, 12, minute, 0).unwrap(),
            open: close,
            high: close + 0.05,
            low: close - 0.05,
            close,
            volume: 1000.0,
        }
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = MemoryBarStore::new();
        let bar = bar_at(0, 150.0);

        assert!(store.insert(bar.clone()).await.unwrap());
        assert!(!store.insert(bar.clone()).await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_reinsert_keeps_first_bar() {
        let store = MemoryBarStore::new();
        let original = bar_at(0, 150.0);
        let mut revised = original.clone();
        revised.close = 151.0;

        store.insert(original.clone()).await.unwrap();
        store.insert(revised).await.unwrap();

        let found = store
            .find_by_timestamp(original.timestamp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.close, 150.0);
    }

    #[tokio::test]
    async fn test_query_range_inclusive_and_ordered() {
        let store = MemoryBarStore::new();
        for minute in [0, 5, 10, 15, 20] {
            store.insert(bar_at(minute, 150.0 + minute as f64)).await.unwrap();
        }

        let from = Utc.with_ymd_and_hms(2024, 6, 3, 12, 5, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 3, 12, 15, 0).unwrap();

        let ascending = store.query_range(from, to, true).await.unwrap();
        assert_eq!(ascending.len(), 3);
        assert!(ascending.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let descending = store.query_range(from, to, false).await.unwrap();
        assert_eq!(descending.first().unwrap().timestamp, ascending.last().unwrap().timestamp);
    }

    #[tokio::test]
    async fn test_find_missing_timestamp() {
        let store = MemoryBarStore::new();
        store.insert(bar_at(0, 150.0)).await.unwrap();
        let missing = Utc.with_ymd_and_hms(2024, 6, 3, 12, 1, 0).unwrap()
            + Duration::seconds(30);
        assert!(store.find_by_timestamp(missing).await.unwrap().is_none());
    }
}
