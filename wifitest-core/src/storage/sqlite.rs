use super::NetworkRecord;
use crate::Result;
use crate::structs::{Band, DiscoveredNetwork, Security, SpeedTool, TestResult};
use crate::traits::ResultStore;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use time::OffsetDateTime;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS network_results (
    bssid TEXT PRIMARY KEY NOT NULL,
    ssid TEXT,
    band TEXT,
    signal REAL,
    security TEXT,
    channel INTEGER,
    frequency REAL,
    tool TEXT,
    download_mbps REAL,
    upload_mbps REAL,
    ping_ms REAL,
    jitter_ms REAL,
    packet_loss REAL,
    server TEXT,
    isp TEXT,
    result_url TEXT,
    created_at TEXT NOT NULL
)
"#;

/// SQLite backed store, one `network_results` row per bssid.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        // 单连接：内存数据库在每个连接上都是独立的
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<NetworkRecord, sqlx::Error> {
    let band: Option<String> = row.try_get("band")?;
    let security: Option<String> = row.try_get("security")?;
    let tool: Option<String> = row.try_get("tool")?;
    let channel: Option<i64> = row.try_get("channel")?;

    Ok(NetworkRecord {
        bssid: row.try_get("bssid")?,
        ssid: row.try_get("ssid")?,
        band: band.as_deref().map(Band::from_label),
        signal_dbm: row.try_get("signal")?,
        security: security.as_deref().and_then(Security::from_label),
        channel: channel.and_then(|c| u32::try_from(c).ok()),
        frequency_mhz: row.try_get("frequency")?,
        tool: tool.as_deref().and_then(SpeedTool::from_alias),
        download_mbps: row.try_get("download_mbps")?,
        upload_mbps: row.try_get("upload_mbps")?,
        ping_ms: row.try_get("ping_ms")?,
        jitter_ms: row.try_get("jitter_ms")?,
        packet_loss_pct: row.try_get("packet_loss")?,
        server: row.try_get("server")?,
        isp: row.try_get("isp")?,
        result_url: row.try_get("result_url")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ResultStore for SqliteStore {
    async fn upsert_networks(&self, networks: &[DiscoveredNetwork]) -> Result<usize> {
        let now = OffsetDateTime::now_utc();
        let mut transaction = self.pool.begin().await?;
        for network in networks {
            sqlx::query(
                r#"
                INSERT INTO network_results
                    (bssid, ssid, band, signal, security, channel, frequency, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT(bssid) DO UPDATE SET
                    ssid = excluded.ssid,
                    band = excluded.band,
                    signal = excluded.signal,
                    security = excluded.security,
                    channel = excluded.channel,
                    frequency = excluded.frequency,
                    created_at = excluded.created_at
                "#,
            )
            .bind(network.bssid.as_str())
            .bind(network.ssid.as_str())
            .bind(network.band.as_str())
            .bind(network.signal_dbm)
            .bind(network.security.map(|s| s.as_str()))
            .bind(network.channel.map(i64::from))
            .bind(network.frequency_mhz)
            .bind(now)
            .execute(&mut *transaction)
            .await?;
        }
        transaction.commit().await?;

        tracing::debug!(count = networks.len(), "networks saved");
        Ok(networks.len())
    }

    async fn upsert_test_result(&self, result: &TestResult) -> Result<usize> {
        let Some(bssid) = result.bssid.as_deref() else {
            tracing::warn!("test result has no bssid, not stored");
            return Ok(0);
        };

        let affected = sqlx::query(
            r#"
            INSERT INTO network_results
                (bssid, ssid, tool, download_mbps, upload_mbps, ping_ms, jitter_ms,
                 packet_loss, server, isp, result_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT(bssid) DO UPDATE SET
                ssid = COALESCE(excluded.ssid, network_results.ssid),
                tool = excluded.tool,
                download_mbps = excluded.download_mbps,
                upload_mbps = excluded.upload_mbps,
                ping_ms = excluded.ping_ms,
                jitter_ms = excluded.jitter_ms,
                packet_loss = excluded.packet_loss,
                server = excluded.server,
                isp = excluded.isp,
                result_url = excluded.result_url,
                created_at = excluded.created_at
            "#,
        )
        .bind(bssid)
        .bind(result.ssid.as_deref())
        .bind(result.tool.as_str())
        .bind(result.download_mbps)
        .bind(result.upload_mbps)
        .bind(result.ping_ms)
        .bind(result.jitter_ms)
        .bind(result.packet_loss_pct)
        .bind(result.server.as_deref())
        .bind(result.isp.as_deref())
        .bind(result.result_url.as_deref())
        .bind(OffsetDateTime::now_utc())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected as usize)
    }

    async fn all_records(&self) -> Result<Vec<NetworkRecord>> {
        let rows = sqlx::query("SELECT * FROM network_results ORDER BY bssid ASC")
            .fetch_all(&self.pool)
            .await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
