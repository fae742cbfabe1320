use crate::structs::{Band, DiscoveredNetwork, Security};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use time::OffsetDateTime;

static STATION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^BSS ([0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5})").expect("static regex")
});

static SIGNAL_DBM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*dBm").expect("static regex"));

const CHANNEL_MARKER: &str = "DS Parameter set: channel";

/// Signal assumed when a station block carries no `signal:` line.
const MISSING_SIGNAL_DBM: f64 = -100.0;

/// 当前正在累积的 BSS 记录
#[derive(Debug)]
struct Pending {
    bssid: String,
    ssid: Option<String>,
    frequency: Option<f64>,
    signal: Option<f64>,
    channel: Option<u32>,
    security: Option<Security>,
}

impl Pending {
    fn new(bssid: &str) -> Self {
        Self {
            bssid: bssid.to_ascii_lowercase(),
            ssid: None,
            frequency: None,
            signal: None,
            channel: None,
            security: None,
        }
    }

    fn absorb(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("SSID:") {
            let ssid = rest.trim();
            if !ssid.is_empty() {
                self.ssid = Some(ssid.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("freq:") {
            if let Ok(freq) = rest.trim().parse::<f64>() {
                self.frequency = Some(freq);
            }
        } else if line.starts_with("signal:") {
            if let Some(value) = SIGNAL_DBM
                .captures(line)
                .and_then(|c| c[1].parse::<f64>().ok())
            {
                self.signal = Some(value);
            }
        } else if let Some(rest) = line.strip_prefix(CHANNEL_MARKER) {
            if let Ok(channel) = rest.trim().parse::<u32>() {
                self.channel = Some(channel);
            }
        } else if line.starts_with("RSN:") {
            self.security = Some(Security::Wpa2Wpa3);
        } else if line.starts_with("WPA:") && self.security.is_none() {
            // WPA 不能覆盖已经识别出的 RSN
            self.security = Some(Security::Wpa);
        }
    }

    /// Records lacking an SSID or a frequency are beacon/probe noise.
    fn finish(self, observed_at: OffsetDateTime) -> Option<DiscoveredNetwork> {
        let ssid = self.ssid?;
        let frequency = self.frequency?;
        Some(DiscoveredNetwork {
            bssid: self.bssid,
            ssid,
            frequency_mhz: frequency,
            band: Band::from_frequency(frequency),
            signal_dbm: self.signal.unwrap_or(MISSING_SIGNAL_DBM),
            channel: self.channel,
            security: self.security,
            observed_at,
        })
    }
}

/// 收集扫描结果，同一 bssid 重复出现时后者覆盖前者但保留首次出现的位置
#[derive(Default)]
struct Collected {
    networks: Vec<DiscoveredNetwork>,
    index: HashMap<String, usize>,
}

impl Collected {
    fn flush(&mut self, pending: Option<Pending>, observed_at: OffsetDateTime) {
        let Some(network) = pending.and_then(|p| p.finish(observed_at)) else {
            return;
        };
        match self.index.get(&network.bssid) {
            Some(&pos) => self.networks[pos] = network,
            None => {
                self.index.insert(network.bssid.clone(), self.networks.len());
                self.networks.push(network);
            }
        }
    }
}

/// Parses the output of `iw dev <interface> scan`.
///
/// Each station block starts with an unindented `BSS <mac>` line. The
/// returned list keeps scan order. `observed_at` is stamped on every record,
/// which keeps the function pure: the same text and instant always produce
/// the same list.
pub fn parse_iw_scan(output: &str, observed_at: OffsetDateTime) -> Vec<DiscoveredNetwork> {
    let mut collected = Collected::default();
    let mut current: Option<Pending> = None;

    for raw_line in output.lines() {
        if raw_line.starts_with("BSS ") {
            collected.flush(current.take(), observed_at);
            // 无法识别 MAC 的行丢弃，直到下一个合法的 BSS 行
            current = STATION_LINE
                .captures(raw_line)
                .map(|c| Pending::new(&c[1]));
            continue;
        }
        if let Some(pending) = current.as_mut() {
            pending.absorb(raw_line.trim());
        }
    }
    collected.flush(current, observed_at);

    collected.networks
}
