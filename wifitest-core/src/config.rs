use crate::structs::SpeedTool;
use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Interface names that mean "detect it for me".
const AUTO_INTERFACE: [&str; 2] = ["auto", "default"];

const DEFAULT_DB_PATH: &str = "wifi_data.db";
const DEFAULT_IPERF3_PORT: u16 = 5201;
const DEFAULT_IPERF3_BANDWIDTH: &str = "100M";
const DEFAULT_IPERF3_DURATION_SECS: u64 = 10;

// ============= 文件格式 (TOML) =============

/// On-disk shape of the configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    interface: Option<String>,
    tool: Option<String>,
    scan_flush: Option<bool>,
    auto_save: Option<bool>,
    prefix: Option<String>,
    password: Option<String>,
    output_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    #[serde(default)]
    iperf3: Iperf3File,
}

#[derive(Debug, Default, Deserialize)]
struct Iperf3File {
    server: Option<String>,
    port_range: Option<PortSpec>,
    bandwidth: Option<String>,
    duration: Option<u64>,
}

/// `port_range = "5201-5203"` or `port_range = 5201`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortSpec {
    Single(i64),
    Text(String),
}

impl ConfigFile {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Reads the file at `path`. A missing file yields all defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml_str(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// True when the interface must be looked up from the system.
    pub fn wants_interface_detection(&self) -> bool {
        match self.interface.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(name) => AUTO_INTERFACE.contains(&name.to_ascii_lowercase().as_str()),
        }
    }

    /// Validates the file into the runtime snapshot. `detected` is used only
    /// when [`wants_interface_detection`](Self::wants_interface_detection).
    pub fn into_config(self, detected: Option<String>) -> Result<CampaignConfig> {
        let interface = if self.wants_interface_detection() {
            detected.unwrap_or_else(|| "wlan0".to_string())
        } else {
            self.interface.unwrap_or_default().trim().to_string()
        };

        let tool = match self.tool.as_deref() {
            Some(raw) => raw.parse::<SpeedTool>()?,
            None => SpeedTool::Ookla,
        };

        let ports = match self.iperf3.port_range {
            None => PortRange::single(DEFAULT_IPERF3_PORT),
            Some(PortSpec::Single(port)) => PortRange::from_bounds(port, port)?,
            Some(PortSpec::Text(text)) => text.parse()?,
        };

        let duration = self.iperf3.duration.unwrap_or(DEFAULT_IPERF3_DURATION_SECS);
        if duration == 0 {
            return Err(Error::Configuration(
                "iperf3 duration must be at least 1 second".into(),
            ));
        }

        Ok(CampaignConfig {
            interface,
            tool,
            scan_flush: self.scan_flush.unwrap_or(true),
            auto_save: self.auto_save.unwrap_or(true),
            prefix: non_empty(self.prefix),
            password: self.password.unwrap_or_default(),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            db_path: self
                .db_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            iperf3: Iperf3Settings {
                server: non_empty(self.iperf3.server),
                ports,
                bandwidth: non_empty(self.iperf3.bandwidth)
                    .unwrap_or_else(|| DEFAULT_IPERF3_BANDWIDTH.to_string()),
                duration: Duration::from_secs(duration),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============= 运行时配置 =============

/// Read-only configuration snapshot for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignConfig {
    pub interface: String,
    pub tool: SpeedTool,
    pub scan_flush: bool,
    pub auto_save: bool,
    pub prefix: Option<String>,
    /// Credential used for every campaign network. Empty joins open networks.
    pub password: String,
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
    pub iperf3: Iperf3Settings,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".to_string(),
            tool: SpeedTool::Ookla,
            scan_flush: true,
            auto_save: true,
            prefix: None,
            password: String::new(),
            output_dir: PathBuf::from("."),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            iperf3: Iperf3Settings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iperf3Settings {
    pub server: Option<String>,
    pub ports: PortRange,
    pub bandwidth: String,
    pub duration: Duration,
}

impl Default for Iperf3Settings {
    fn default() -> Self {
        Self {
            server: None,
            ports: PortRange::single(DEFAULT_IPERF3_PORT),
            bandwidth: DEFAULT_IPERF3_BANDWIDTH.to_string(),
            duration: Duration::from_secs(DEFAULT_IPERF3_DURATION_SECS),
        }
    }
}

/// Inclusive port range tried in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self { start: port, end: port }
    }

    /// Rejects port 0, values above 65535 and reversed ranges.
    pub fn from_bounds(start: i64, end: i64) -> Result<Self> {
        let valid = |p: i64| (1..=i64::from(u16::MAX)).contains(&p);
        if !valid(start) || !valid(end) || start > end {
            return Err(Error::Configuration(format!(
                "invalid iperf3 port range {}-{}: ports must be 1-65535 with start <= end",
                start, end
            )));
        }
        Ok(Self {
            start: start as u16,
            end: end as u16,
        })
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl FromStr for PortRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || {
            Error::Configuration(format!(
                "invalid iperf3 port range '{}': expected 'start-end' or a single port",
                s
            ))
        };
        let parse = |part: &str| part.trim().parse::<i64>().map_err(|_| malformed());

        match s.split_once('-') {
            Some((start, end)) => Self::from_bounds(parse(start)?, parse(end)?),
            None => {
                let port = parse(s)?;
                Self::from_bounds(port, port)
            }
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
