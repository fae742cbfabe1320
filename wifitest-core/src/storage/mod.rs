// 结果存储：每个 bssid 一条记录，扫描字段与测速字段合并在同一行

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::structs::{Band, DiscoveredNetwork, Security, SpeedTool, TestResult};
use serde::Serialize;
use time::OffsetDateTime;

/// Merged view of one radio: the latest scan fields plus the latest test.
/// Either half is absent until the corresponding upsert has happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkRecord {
    pub bssid: String,
    pub ssid: Option<String>,
    pub band: Option<Band>,
    pub signal_dbm: Option<f64>,
    pub security: Option<Security>,
    pub channel: Option<u32>,
    pub frequency_mhz: Option<f64>,
    pub tool: Option<SpeedTool>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub ping_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss_pct: Option<f64>,
    pub server: Option<String>,
    pub isp: Option<String>,
    pub result_url: Option<String>,
    /// Refreshed on every upsert.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl NetworkRecord {
    pub fn empty(bssid: &str, created_at: OffsetDateTime) -> Self {
        Self {
            bssid: bssid.to_string(),
            ssid: None,
            band: None,
            signal_dbm: None,
            security: None,
            channel: None,
            frequency_mhz: None,
            tool: None,
            download_mbps: None,
            upload_mbps: None,
            ping_ms: None,
            jitter_ms: None,
            packet_loss_pct: None,
            server: None,
            isp: None,
            result_url: None,
            created_at,
        }
    }

    /// Scan fields are last-write-wins.
    pub fn apply_scan(&mut self, network: &DiscoveredNetwork, now: OffsetDateTime) {
        self.ssid = Some(network.ssid.clone());
        self.band = Some(network.band);
        self.signal_dbm = Some(network.signal_dbm);
        self.security = network.security;
        self.channel = network.channel;
        self.frequency_mhz = Some(network.frequency_mhz);
        self.created_at = now;
    }

    /// Test fields are last-write-wins; the ssid is kept unless the result
    /// carries one.
    pub fn apply_result(&mut self, result: &TestResult, now: OffsetDateTime) {
        if let Some(ssid) = &result.ssid {
            self.ssid = Some(ssid.clone());
        }
        self.tool = Some(result.tool);
        self.download_mbps = Some(result.download_mbps);
        self.upload_mbps = Some(result.upload_mbps);
        self.ping_ms = result.ping_ms;
        self.jitter_ms = Some(result.jitter_ms);
        self.packet_loss_pct = Some(result.packet_loss_pct);
        self.server = result.server.clone();
        self.isp = result.isp.clone();
        self.result_url = result.result_url.clone();
        self.created_at = now;
    }
}
