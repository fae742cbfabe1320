use super::ParseError;
use crate::structs::{SpeedTool, TestResult};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const BITS_PER_MEGABIT: f64 = 1_000_000.0;
const BITS_PER_BYTE: f64 = 8.0;

// ============= Ookla =============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OoklaReport {
    timestamp: Option<String>,
    #[serde(default)]
    download: Option<OoklaTransfer>,
    #[serde(default)]
    upload: Option<OoklaTransfer>,
    #[serde(default)]
    ping: Option<OoklaPing>,
    packet_loss: Option<f64>,
    isp: Option<String>,
    #[serde(default)]
    server: Option<OoklaServer>,
    #[serde(default)]
    result: Option<OoklaResultLink>,
}

#[derive(Debug, Default, Deserialize)]
struct OoklaTransfer {
    bandwidth: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OoklaPing {
    latency: Option<f64>,
    jitter: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OoklaServer {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OoklaResultLink {
    url: Option<String>,
}

fn top_level_object(payload: &str) -> Result<Value, ParseError> {
    let value: Value = serde_json::from_str(payload)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(ParseError::NotAnObject)
    }
}

/// Parses `speedtest --format=json`. Ookla reports `bandwidth` in bytes per
/// second, so it is scaled by 8 before converting to Mbps; ping latency and jitter are already milliseconds.
/// Missing nested keys default to zero or `None`.
pub fn parse_ookla_json(payload: &str) -> Result<TestResult, ParseError> {
    let report: OoklaReport = serde_json::from_value(top_level_object(payload)?)?;

    let timestamp = report
        .timestamp
        .as_deref()
        .and_then(|ts| OffsetDateTime::parse(ts, &Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    let ping = report.ping.unwrap_or_default();

    let mut result = TestResult::new(SpeedTool::Ookla, timestamp);
    result.download_mbps = mbps(report.download.and_then(|d| d.bandwidth).map(bytes_to_bits));
    result.upload_mbps = mbps(report.upload.and_then(|u| u.bandwidth).map(bytes_to_bits));
    result.ping_ms = Some(ping.latency.unwrap_or(0.0));
    result.jitter_ms = ping.jitter.unwrap_or(0.0);
    result.packet_loss_pct = report.packet_loss.unwrap_or(0.0);
    result.isp = report.isp;
    result.server = report.server.and_then(|s| s.name);
    result.result_url = report.result.and_then(|r| r.url);
    Ok(result)
}

fn bytes_to_bits(bytes_per_second: f64) -> f64 {
    bytes_per_second * BITS_PER_BYTE
}

fn mbps(bits_per_second: Option<f64>) -> f64 {
    bits_per_second.unwrap_or(0.0).max(0.0) / BITS_PER_MEGABIT
}

// ============= iperf3 =============

#[derive(Debug, Default, Deserialize)]
struct IperfReport {
    #[serde(default)]
    start: IperfStart,
    end: Option<IperfEnd>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IperfStart {
    connecting_to: Option<IperfTarget>,
    timestamp: Option<IperfTimestamp>,
}

#[derive(Debug, Deserialize)]
struct IperfTarget {
    host: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IperfTimestamp {
    timesecs: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct IperfEnd {
    sum_sent: Option<IperfSum>,
    sum_received: Option<IperfSum>,
    sum: Option<IperfSum>,
}

#[derive(Debug, Default, Deserialize)]
struct IperfSum {
    bits_per_second: Option<f64>,
    jitter_ms: Option<f64>,
    lost_percent: Option<f64>,
}

impl IperfEnd {
    /// Summaries consulted for UDP-only metrics, in priority order:
    /// receiver, then overall, then sender.
    fn udp_sources(&self) -> [Option<&IperfSum>; 3] {
        [
            self.sum_received.as_ref(),
            self.sum.as_ref(),
            self.sum_sent.as_ref(),
        ]
    }

    fn first_present(&self, field: impl Fn(&IperfSum) -> Option<f64>) -> f64 {
        self.udp_sources()
            .into_iter()
            .flatten()
            .find_map(field)
            .unwrap_or(0.0)
    }
}

/// Parses `iperf3 -J`. Download is what the receiver measured and upload is
/// what the sender pushed; the two come from different summary objects.
/// iperf3 has no ICMP latency, so `ping_ms` stays `None`.
pub fn parse_iperf3_json(payload: &str) -> Result<TestResult, ParseError> {
    let report: IperfReport = serde_json::from_value(top_level_object(payload)?)?;
    if let Some(message) = report.error {
        return Err(ParseError::ToolReported(message));
    }
    let end = report.end.ok_or(ParseError::MissingField("end"))?;

    let timestamp = report
        .start
        .timestamp
        .and_then(|t| t.timesecs)
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    let mut result = TestResult::new(SpeedTool::Iperf3, timestamp);
    result.download_mbps = mbps(end.sum_received.as_ref().and_then(|s| s.bits_per_second));
    result.upload_mbps = mbps(end.sum_sent.as_ref().and_then(|s| s.bits_per_second));
    result.jitter_ms = end.first_present(|s| s.jitter_ms);
    result.packet_loss_pct = end.first_present(|s| s.lost_percent);
    result.server = report.start.connecting_to.and_then(|t| t.host);
    Ok(result)
}
