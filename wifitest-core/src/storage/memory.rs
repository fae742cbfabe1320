use super::NetworkRecord;
use crate::Result;
use crate::structs::{DiscoveredNetwork, TestResult};
use crate::traits::ResultStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// In-process store with the same merge rules as the SQLite one.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, NetworkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, bssid: &str) -> Option<NetworkRecord> {
        self.records.lock().await.get(bssid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_networks(&self, networks: &[DiscoveredNetwork]) -> Result<usize> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;
        for network in networks {
            records
                .entry(network.bssid.clone())
                .or_insert_with(|| NetworkRecord::empty(&network.bssid, now))
                .apply_scan(network, now);
        }
        Ok(networks.len())
    }

    async fn upsert_test_result(&self, result: &TestResult) -> Result<usize> {
        let Some(bssid) = result.bssid.as_deref() else {
            tracing::warn!("test result has no bssid, not stored");
            return Ok(0);
        };
        let now = OffsetDateTime::now_utc();
        self.records
            .lock()
            .await
            .entry(bssid.to_string())
            .or_insert_with(|| NetworkRecord::empty(bssid, now))
            .apply_result(result, now);
        Ok(1)
    }

    async fn all_records(&self) -> Result<Vec<NetworkRecord>> {
        Ok(self.records.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::fixtures::{network, result};

    #[tokio::test]
    async fn scan_and_result_merge_under_one_bssid() {
        let store = MemoryStore::new();
        store
            .upsert_networks(&[network("aa:00:00:00:00:02", "Lab", -50.0)])
            .await
            .unwrap();
        store
            .upsert_test_result(&result(Some("aa:00:00:00:00:02"), None, 80.0))
            .await
            .unwrap();

        let record = store.get("aa:00:00:00:00:02").await.unwrap();
        assert_eq!(record.ssid.as_deref(), Some("Lab"));
        assert_eq!(record.signal_dbm, Some(-50.0));
        assert_eq!(record.download_mbps, Some(80.0));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn rescan_overwrites_and_records_sort_by_bssid() {
        let store = MemoryStore::new();
        store
            .upsert_networks(&[
                network("bb:00:00:00:00:01", "B", -70.0),
                network("aa:00:00:00:00:01", "A", -60.0),
            ])
            .await
            .unwrap();
        store
            .upsert_networks(&[network("bb:00:00:00:00:01", "B", -40.0)])
            .await
            .unwrap();

        let records = store.all_records().await.unwrap();
        let bssids: Vec<_> = records.iter().map(|r| r.bssid.as_str()).collect();
        assert_eq!(bssids, ["aa:00:00:00:00:01", "bb:00:00:00:00:01"]);
        assert_eq!(records[1].signal_dbm, Some(-40.0));
    }

    #[tokio::test]
    async fn result_without_bssid_is_skipped() {
        let store = MemoryStore::new();
        let stored = store
            .upsert_test_result(&result(None, Some("Lab"), 10.0))
            .await
            .unwrap();
        assert_eq!(stored, 0);
        assert_eq!(store.len().await, 0);
    }
}
