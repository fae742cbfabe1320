use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// 无线频段，由频率推导而来
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "2.4GHz")]
    TwoPointFourGhz,
    #[serde(rename = "5GHz")]
    FiveGhz,
    #[serde(rename = "6GHz")]
    SixGhz,
    Unknown,
}

impl Band {
    /// Classifies a frequency in MHz. Ranges are checked in order and the
    /// boundaries are inclusive, so 6000 MHz resolves to 5GHz.
    pub fn from_frequency(freq_mhz: f64) -> Self {
        const TABLE: [(f64, f64, Band); 3] = [
            (2400.0, 2500.0, Band::TwoPointFourGhz),
            (5000.0, 6000.0, Band::FiveGhz),
            (6000.0, 7125.0, Band::SixGhz),
        ];
        TABLE
            .iter()
            .find(|(low, high, _)| (*low..=*high).contains(&freq_mhz))
            .map(|(_, _, band)| *band)
            .unwrap_or(Band::Unknown)
    }

    /// Inverse of [`Band::as_str`]; unrecognised labels map to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "2.4GHz" => Band::TwoPointFourGhz,
            "5GHz" => Band::FiveGhz,
            "6GHz" => Band::SixGhz,
            _ => Band::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::TwoPointFourGhz => "2.4GHz",
            Band::FiveGhz => "5GHz",
            Band::SixGhz => "6GHz",
            Band::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无线网络安全性分类。`None` 表示开放网络。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Security {
    #[serde(rename = "WPA2/WPA3")]
    Wpa2Wpa3,
    #[serde(rename = "WPA")]
    Wpa,
}

impl Security {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "WPA2/WPA3" => Some(Security::Wpa2Wpa3),
            "WPA" => Some(Security::Wpa),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Security::Wpa2Wpa3 => "WPA2/WPA3",
            Security::Wpa => "WPA",
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a single access point radio found during a scan.
/// `bssid` is the unique key; `ssid` is never empty for a parsed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredNetwork {
    pub bssid: String,
    pub ssid: String,
    pub frequency_mhz: f64,
    pub band: Band,
    pub signal_dbm: f64,
    pub channel: Option<u32>,
    pub security: Option<Security>,
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

/// 支持的测速工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTool {
    Ookla,
    Iperf3,
}

impl SpeedTool {
    /// Normalises the names users type for a tool. Only the configuration
    /// boundary calls this; everything past it sees the enum.
    pub fn from_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ookla" | "speedtest" => Some(SpeedTool::Ookla),
            "iperf" | "iperf3" => Some(SpeedTool::Iperf3),
            _ => None,
        }
    }

    /// Name of the executable that implements the tool.
    pub fn binary(&self) -> &'static str {
        match self {
            SpeedTool::Ookla => "speedtest",
            SpeedTool::Iperf3 => "iperf3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SpeedTool::Ookla => "Ookla Speedtest",
            SpeedTool::Iperf3 => "iperf3",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedTool::Ookla => "ookla",
            SpeedTool::Iperf3 => "iperf3",
        }
    }
}

impl fmt::Display for SpeedTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedTool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpeedTool::from_alias(s).ok_or_else(|| {
            Error::Configuration(format!(
                "invalid speed test tool '{}'. Allowed: ookla, iperf3",
                s
            ))
        })
    }
}

/// Normalised outcome of one speed test. Every field exists for both tools;
/// whatever a tool does not measure stays at zero or `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub tool: SpeedTool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub ssid: Option<String>,
    pub bssid: Option<String>,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    /// iperf3 does not measure round-trip latency.
    pub ping_ms: Option<f64>,
    pub jitter_ms: f64,
    pub server: Option<String>,
    pub isp: Option<String>,
    pub packet_loss_pct: f64,
    pub result_url: Option<String>,
}

impl TestResult {
    pub fn new(tool: SpeedTool, timestamp: OffsetDateTime) -> Self {
        Self {
            tool,
            timestamp,
            ssid: None,
            bssid: None,
            download_mbps: 0.0,
            upload_mbps: 0.0,
            ping_ms: None,
            jitter_ms: 0.0,
            server: None,
            isp: None,
            packet_loss_pct: 0.0,
            result_url: None,
        }
    }
}

/// 连接请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub interface: String,
    pub ssid: String,
    /// 指定目标射频；为空时由 NetworkManager 自行选择
    pub bssid: Option<String>,
    pub password: String,
}

/// Association reported by the interface. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub ssid: Option<String>,
    pub bssid: Option<String>,
}

impl LinkInfo {
    pub fn is_empty(&self) -> bool {
        self.ssid.is_none() && self.bssid.is_none()
    }

    /// Human readable name for log lines: ssid when known, else bssid.
    pub fn label(&self) -> &str {
        self.ssid
            .as_deref()
            .or(self.bssid.as_deref())
            .unwrap_or("<none>")
    }
}

/// Result of dispatching one speed test.
#[derive(Debug)]
pub enum TestRun {
    Completed(TestResult),
    /// The tool ran but produced nothing usable.
    NoResult,
    /// The tool could not be run or reported a failure.
    Failed(Error),
}

/// 单个网络在一次测试活动中的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    ConnectionFailed,
    NoInternet,
    TestFailed,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::ConnectionFailed => "connection_failed",
            OutcomeStatus::NoInternet => "no_internet",
            OutcomeStatus::TestFailed => "test_failed",
            OutcomeStatus::Error => "error",
        }
    }

    /// Label shown in the summary table.
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "✓",
            OutcomeStatus::ConnectionFailed => "Connection Failed",
            OutcomeStatus::NoInternet => "No Internet",
            OutcomeStatus::TestFailed => "Test Failed",
            OutcomeStatus::Error => "Error",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tested network. Built through the constructors so a result exists
/// exactly when the status is `Success`; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignOutcome {
    network: DiscoveredNetwork,
    status: OutcomeStatus,
    result: Option<TestResult>,
    error: Option<String>,
}

impl CampaignOutcome {
    pub fn success(network: DiscoveredNetwork, result: TestResult) -> Self {
        Self {
            network,
            status: OutcomeStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    /// # Panics
    /// Debug builds assert that `status` is not `Success`.
    pub fn failure(network: DiscoveredNetwork, status: OutcomeStatus, error: Option<String>) -> Self {
        debug_assert!(status != OutcomeStatus::Success);
        Self {
            network,
            status,
            result: None,
            error,
        }
    }

    pub fn network(&self) -> &DiscoveredNetwork {
        &self.network
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// 恢复原始连接的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Restored(String),
    Failed(String),
    NothingToRestore,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub outcomes: Vec<CampaignOutcome>,
    pub restore: RestoreStatus,
}

impl CampaignReport {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == OutcomeStatus::Success)
            .count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_pick_the_lower_range() {
        assert_eq!(Band::from_frequency(2400.0), Band::TwoPointFourGhz);
        assert_eq!(Band::from_frequency(2500.0), Band::TwoPointFourGhz);
        assert_eq!(Band::from_frequency(2412.0), Band::TwoPointFourGhz);
        assert_eq!(Band::from_frequency(5000.0), Band::FiveGhz);
        assert_eq!(Band::from_frequency(5180.0), Band::FiveGhz);
        assert_eq!(Band::from_frequency(6000.0), Band::FiveGhz);
        assert_eq!(Band::from_frequency(6000.5), Band::SixGhz);
        assert_eq!(Band::from_frequency(7125.0), Band::SixGhz);
    }

    #[test]
    fn band_outside_every_range_is_unknown() {
        for f in [0.0, 2399.9, 2500.1, 4999.0, 7125.1, f64::NAN] {
            assert_eq!(Band::from_frequency(f), Band::Unknown, "{f}");
        }
    }

    #[test]
    fn tool_aliases_normalise() {
        assert_eq!(SpeedTool::from_alias("OOKLA"), Some(SpeedTool::Ookla));
        assert_eq!(SpeedTool::from_alias(" speedtest "), Some(SpeedTool::Ookla));
        assert_eq!(SpeedTool::from_alias("IPERF"), Some(SpeedTool::Iperf3));
        assert_eq!(SpeedTool::from_alias("iperf3"), Some(SpeedTool::Iperf3));
        assert_eq!(SpeedTool::from_alias("fast.com"), None);
        assert!("nope".parse::<SpeedTool>().is_err());
    }

    #[test]
    fn report_counts_successes() {
        let network = DiscoveredNetwork {
            bssid: "aa:bb:cc:dd:ee:ff".into(),
            ssid: "Lab".into(),
            frequency_mhz: 2412.0,
            band: Band::TwoPointFourGhz,
            signal_dbm: -40.0,
            channel: Some(1),
            security: None,
            observed_at: OffsetDateTime::UNIX_EPOCH,
        };
        let result = TestResult::new(SpeedTool::Ookla, OffsetDateTime::UNIX_EPOCH);
        let report = CampaignReport {
            outcomes: vec![
                CampaignOutcome::success(network.clone(), result),
                CampaignOutcome::failure(network, OutcomeStatus::NoInternet, None),
            ],
            restore: RestoreStatus::NothingToRestore,
        };
        assert_eq!(report.successes(), 1);
        assert_eq!(report.total(), 2);
        assert!(report.outcomes[1].result().is_none());
    }
}
