use crate::storage::NetworkRecord;
use crate::{Error, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

/// CSV 列顺序，与 [`ExportRow`] 的字段顺序一致
pub const COLUMNS: [&str; 16] = [
    "bssid",
    "ssid",
    "band",
    "signal",
    "security",
    "channel",
    "frequency",
    "download_mbps",
    "upload_mbps",
    "ping_ms",
    "jitter_ms",
    "packet_loss",
    "server",
    "isp",
    "result_url",
    "created_at",
];

/// 导出的一行
#[derive(Serialize)]
struct ExportRow<'a> {
    bssid: &'a str,
    ssid: Option<&'a str>,
    band: Option<&'static str>,
    signal: Option<f64>,
    security: Option<&'static str>,
    channel: Option<u32>,
    frequency: Option<f64>,
    download_mbps: Option<f64>,
    upload_mbps: Option<f64>,
    ping_ms: Option<f64>,
    jitter_ms: Option<f64>,
    packet_loss: Option<f64>,
    server: Option<&'a str>,
    isp: Option<&'a str>,
    result_url: Option<&'a str>,
    created_at: String,
}

impl<'a> ExportRow<'a> {
    fn from_record(record: &'a NetworkRecord) -> Result<Self> {
        Ok(Self {
            bssid: &record.bssid,
            ssid: record.ssid.as_deref(),
            band: record.band.map(|b| b.as_str()),
            signal: record.signal_dbm,
            security: record.security.map(|s| s.as_str()),
            channel: record.channel,
            frequency: record.frequency_mhz,
            download_mbps: record.download_mbps,
            upload_mbps: record.upload_mbps,
            ping_ms: record.ping_ms,
            jitter_ms: record.jitter_ms,
            packet_loss: record.packet_loss_pct,
            server: record.server.as_deref(),
            isp: record.isp.as_deref(),
            result_url: record.result_url.as_deref(),
            created_at: record.created_at.format(&Rfc3339)?,
        })
    }
}

/// Writes `records` as CSV, sorted by bssid. The header is always written;
/// absent values are empty cells.
pub fn write_csv<W: Write>(records: &[NetworkRecord], writer: W) -> Result<usize> {
    let mut sorted: Vec<&NetworkRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.bssid.cmp(&b.bssid));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(COLUMNS)?;
    for record in &sorted {
        writer.serialize(ExportRow::from_record(record)?)?;
    }
    writer.flush()?;
    Ok(sorted.len())
}

/// Exports to a file. An existing file is only replaced when `force` is set.
/// Under sudo the file is handed back to the invoking user.
pub fn export_to_path(records: &[NetworkRecord], path: &Path, force: bool) -> Result<usize> {
    if path.exists() && !force {
        return Err(Error::Configuration(format!(
            "{} already exists, use --force to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let count = write_csv(records, File::create(path)?)?;
    restore_invoking_owner(path);
    tracing::info!(path = %path.display(), count, "exported records");
    Ok(count)
}

#[cfg(unix)]
fn restore_invoking_owner(path: &Path) {
    let id = |key: &str| std::env::var(key).ok().and_then(|v| v.parse::<u32>().ok());
    let (Some(uid), Some(gid)) = (id("SUDO_UID"), id("SUDO_GID")) else {
        return;
    };
    if let Err(e) = std::os::unix::fs::chown(path, Some(uid), Some(gid)) {
        tracing::warn!(path = %path.display(), error = %e, "could not change export owner");
    }
}

#[cfg(not(unix))]
fn restore_invoking_owner(_path: &Path) {}
