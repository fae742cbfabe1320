//! Campaign orchestration: scan, then drive one adapter through each
//! candidate network in turn (connect, probe, test, disconnect), and finally
//! put the interface back on the network it started on.
//!
//! Everything runs strictly in sequence. The wireless adapter is a single
//! shared resource, so no two steps are ever in flight at once.

use crate::config::CampaignConfig;
use crate::parsing::parse_iw_scan;
use crate::structs::{
    CampaignOutcome, CampaignReport, ConnectionRequest, DiscoveredNetwork, LinkInfo,
    OutcomeStatus, RestoreStatus, SpeedTool, TestResult, TestRun,
};
use crate::traits::{
    Iperf3Request, NetworkManager, ReachabilityProbe, ResultStore, ScanSource, SpeedTester,
};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::sleep;

/// External collaborators the campaign drives.
#[derive(Clone)]
pub struct Collaborators {
    pub network: Arc<dyn NetworkManager>,
    pub scanner: Arc<dyn ScanSource>,
    pub tester: Arc<dyn SpeedTester>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub store: Option<Arc<dyn ResultStore>>,
}

/// Pauses and bounded waits used between steps.
#[derive(Debug, Clone)]
pub struct CampaignTiming {
    /// After the forced disconnect that precedes every connect.
    pub settle: Duration,
    /// Between a confirmed link and the reachability probe.
    pub stabilize: Duration,
    /// After the closing disconnect of each network.
    pub between_networks: Duration,
    /// After a successful restore.
    pub after_restore: Duration,
    /// How long a freshly connected interface may take to come up.
    pub connect_wait: Duration,
    pub scan_retries: u32,
    pub scan_backoff: Duration,
}

impl Default for CampaignTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            stabilize: Duration::from_secs(2),
            between_networks: Duration::from_secs(1),
            after_restore: Duration::from_secs(2),
            connect_wait: Duration::from_secs(25),
            scan_retries: 2,
            scan_backoff: Duration::from_secs(1),
        }
    }
}

/// Per-invocation choices that are not part of the stored configuration.
#[derive(Debug, Clone, Default)]
pub struct CampaignOptions {
    /// Overrides the configured prefix.
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub udp: bool,
}

/// 单个网络测试周期的状态
#[derive(Debug)]
enum CycleState {
    Pending,
    Connecting,
    Connected,
    CheckingInternet,
    Testing,
    Done(Verdict),
}

/// Terminal result of one cycle, before it is turned into an outcome.
#[derive(Debug)]
enum Verdict {
    ConnectFailed(String),
    NoInternet,
    Tested(TestResult),
    TestFailed,
    Error(String),
}

pub struct Campaign {
    config: CampaignConfig,
    parts: Collaborators,
    timing: CampaignTiming,
}

impl Campaign {
    pub fn new(config: CampaignConfig, parts: Collaborators) -> Self {
        Self {
            config,
            parts,
            timing: CampaignTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: CampaignTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    fn interface(&self) -> &str {
        &self.config.interface
    }

    // ============= 扫描 =============

    /// Runs the raw scan with retries and parses it. A missing scan tool is
    /// reported at once; other failures are retried after a short backoff.
    pub async fn scan_networks(&self) -> Result<Vec<DiscoveredNetwork>> {
        let attempts = self.timing.scan_retries + 1;
        let mut attempt = 1;
        loop {
            match self
                .parts
                .scanner
                .raw_scan(self.interface(), self.config.scan_flush)
                .await
            {
                Ok(text) => {
                    let networks = parse_iw_scan(&text, OffsetDateTime::now_utc());
                    tracing::info!(count = networks.len(), "scan complete");
                    return Ok(networks);
                }
                Err(e @ Error::ToolNotFound(_)) => return Err(e),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "scan failed, retrying");
                    attempt += 1;
                    sleep(self.timing.scan_backoff).await;
                }
            }
        }
    }

    /// Prefix filter, then strongest signal first, then the cap. The sort is
    /// stable, so equal signals keep scan order. A limit of 0 means no cap.
    pub fn select_candidates(
        mut networks: Vec<DiscoveredNetwork>,
        prefix: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<DiscoveredNetwork> {
        if let Some(prefix) = prefix {
            networks.retain(|n| n.ssid.starts_with(prefix));
        }
        networks.sort_by(|a, b| b.signal_dbm.total_cmp(&a.signal_dbm));
        if let Some(limit) = limit.filter(|&l| l > 0) {
            networks.truncate(limit);
        }
        networks
    }

    /// Scan, filter and optionally persist the networks. Backs the plain
    /// `scan` command.
    pub async fn survey(
        &self,
        prefix: Option<&str>,
        limit: Option<usize>,
        save: bool,
    ) -> Result<Vec<DiscoveredNetwork>> {
        let networks = Self::select_candidates(self.scan_networks().await?, prefix, limit);
        if save {
            self.save_networks(&networks).await;
        }
        Ok(networks)
    }

    // ============= 测试活动 =============

    /// Settings every campaign needs before it may touch the interface.
    async fn preflight(&self) -> Result<()> {
        let tool = self.config.tool;
        self.parts.tester.verify_available(tool).await?;
        if tool == SpeedTool::Iperf3 && self.config.iperf3.server.is_none() {
            return Err(Error::Configuration(
                "iperf3 server not configured. Set `server` in the [iperf3] table".into(),
            ));
        }
        Ok(())
    }

    /// Full campaign over every candidate network.
    pub async fn run(&self, options: &CampaignOptions) -> Result<CampaignReport> {
        self.preflight().await?;
        let prefix = options
            .prefix
            .clone()
            .or_else(|| self.config.prefix.clone())
            .ok_or_else(|| {
                Error::Configuration(
                    "campaign mode requires a prefix filter. Pass --prefix or set `prefix`".into(),
                )
            })?;
        if self.config.password.is_empty() {
            return Err(Error::Configuration(
                "campaign mode requires a password. Set `password` in the config file".into(),
            ));
        }

        let original = self.parts.network.current_link(self.interface()).await;
        tracing::info!(original = %original.label(), %prefix, "starting campaign");

        let candidates = self.survey(Some(&prefix), options.limit, false).await?;
        if candidates.is_empty() {
            tracing::warn!(%prefix, "no networks matched");
            return Ok(CampaignReport {
                outcomes: Vec::new(),
                restore: RestoreStatus::NothingToRestore,
            });
        }
        if self.config.auto_save {
            self.save_networks(&candidates).await;
        }

        let total = candidates.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, network) in candidates.into_iter().enumerate() {
            tracing::info!(
                ssid = %network.ssid,
                bssid = %network.bssid,
                "[{}/{}] testing network",
                index + 1,
                total
            );
            let outcome = self.test_network(network, options.udp).await;
            tracing::info!(ssid = %outcome.network().ssid, status = %outcome.status(), "network done");
            outcomes.push(outcome);
            if index + 1 < total {
                sleep(self.timing.between_networks).await;
            }
        }

        let restore = self.restore(&original).await;
        let report = CampaignReport { outcomes, restore };
        tracing::info!(
            "{}/{} networks tested successfully",
            report.successes(),
            report.total()
        );
        Ok(report)
    }

    /// One connect/probe/test cycle. Always ends with a disconnect.
    async fn test_network(&self, network: DiscoveredNetwork, udp: bool) -> CampaignOutcome {
        let interface = self.interface();
        let mut state = CycleState::Pending;
        let verdict = loop {
            state = match state {
                CycleState::Pending => {
                    // 先断开，避免残留的关联导致连接失败
                    self.parts.network.disconnect(interface).await;
                    sleep(self.timing.settle).await;
                    CycleState::Connecting
                }
                CycleState::Connecting => {
                    let request = ConnectionRequest {
                        interface: interface.to_string(),
                        ssid: network.ssid.clone(),
                        bssid: Some(network.bssid.clone()),
                        password: self.config.password.clone(),
                    };
                    match self.parts.network.connect(&request).await {
                        Err(Error::ConnectFailure(message)) => {
                            CycleState::Done(Verdict::ConnectFailed(message))
                        }
                        Err(e) => CycleState::Done(Verdict::ConnectFailed(e.to_string())),
                        Ok(()) => {
                            if self
                                .parts
                                .network
                                .wait_until_connected(interface, self.timing.connect_wait)
                                .await
                            {
                                CycleState::Connected
                            } else {
                                CycleState::Done(Verdict::ConnectFailed(
                                    "Connection timeout".into(),
                                ))
                            }
                        }
                    }
                }
                CycleState::Connected => {
                    sleep(self.timing.stabilize).await;
                    CycleState::CheckingInternet
                }
                CycleState::CheckingInternet => {
                    if self.parts.probe.has_internet().await {
                        CycleState::Testing
                    } else {
                        CycleState::Done(Verdict::NoInternet)
                    }
                }
                CycleState::Testing => match self.dispatch(udp).await {
                    TestRun::Completed(mut result) => {
                        let link = self.parts.network.current_link(interface).await;
                        stamp(&mut result, link, &network);
                        CycleState::Done(Verdict::Tested(result))
                    }
                    TestRun::NoResult => CycleState::Done(Verdict::TestFailed),
                    TestRun::Failed(e) => CycleState::Done(Verdict::Error(e.to_string())),
                },
                CycleState::Done(verdict) => break verdict,
            };
        };

        self.parts.network.disconnect(interface).await;

        match verdict {
            Verdict::Tested(result) => {
                if self.config.auto_save {
                    self.save_result(&result).await;
                }
                CampaignOutcome::success(network, result)
            }
            Verdict::ConnectFailed(message) => {
                tracing::warn!(ssid = %network.ssid, error = %message, "connection failed");
                CampaignOutcome::failure(network, OutcomeStatus::ConnectionFailed, Some(message))
            }
            Verdict::NoInternet => {
                CampaignOutcome::failure(network, OutcomeStatus::NoInternet, None)
            }
            Verdict::TestFailed => CampaignOutcome::failure(
                network,
                OutcomeStatus::TestFailed,
                Some("speed test produced no result".into()),
            ),
            Verdict::Error(message) => {
                tracing::warn!(ssid = %network.ssid, error = %message, "speed test error");
                CampaignOutcome::failure(network, OutcomeStatus::Error, Some(message))
            }
        }
    }

    /// Tests whatever network the interface is on right now.
    pub async fn run_single(&self, udp: bool) -> Result<TestResult> {
        self.preflight().await?;
        match self.dispatch(udp).await {
            TestRun::Completed(mut result) => {
                let link = self.parts.network.current_link(self.interface()).await;
                result.ssid = link.ssid;
                result.bssid = link.bssid;
                if self.config.auto_save {
                    self.save_result(&result).await;
                }
                Ok(result)
            }
            TestRun::NoResult => Err(Error::CommandFailed(
                "speed test produced no result".into(),
            )),
            TestRun::Failed(e) => Err(e),
        }
    }

    /// Runs the configured tool. iperf3 walks the port range in order and
    /// stops at the first result; if none succeed the last failure wins.
    pub async fn dispatch(&self, udp: bool) -> TestRun {
        match self.config.tool {
            SpeedTool::Ookla => self.parts.tester.ookla(self.interface()).await,
            SpeedTool::Iperf3 => {
                let settings = &self.config.iperf3;
                let Some(server) = settings.server.clone() else {
                    return TestRun::Failed(Error::Configuration(
                        "iperf3 server not configured".into(),
                    ));
                };
                let mut last_error = None;
                for port in settings.ports.ports() {
                    let request = Iperf3Request {
                        server: server.clone(),
                        port,
                        duration: settings.duration,
                        udp,
                        bandwidth: udp.then(|| settings.bandwidth.clone()),
                    };
                    match self.parts.tester.iperf3(&request).await {
                        TestRun::Completed(result) => return TestRun::Completed(result),
                        TestRun::NoResult => {
                            tracing::debug!(port, "iperf3 produced no result");
                        }
                        TestRun::Failed(e) => {
                            tracing::debug!(port, error = %e, "iperf3 port failed");
                            last_error = Some(e);
                        }
                    }
                }
                match last_error {
                    Some(e) => TestRun::Failed(e),
                    None => TestRun::NoResult,
                }
            }
        }
    }

    // ============= 恢复 =============

    /// Reconnects the pre-campaign link once. Failure is reported, not raised.
    async fn restore(&self, original: &LinkInfo) -> RestoreStatus {
        if original.is_empty() {
            tracing::info!("no original connection to restore");
            return RestoreStatus::NothingToRestore;
        }
        let label = original.label().to_string();
        tracing::info!(network = %label, "restoring original connection");
        if self
            .parts
            .network
            .reconnect_saved(original.bssid.as_deref(), original.ssid.as_deref())
            .await
        {
            sleep(self.timing.after_restore).await;
            RestoreStatus::Restored(label)
        } else {
            tracing::warn!(network = %label, "could not restore original connection");
            RestoreStatus::Failed(label)
        }
    }

    // ============= 存储 =============

    async fn save_networks(&self, networks: &[DiscoveredNetwork]) {
        let Some(store) = &self.parts.store else {
            return;
        };
        match store.upsert_networks(networks).await {
            Ok(count) => tracing::debug!(count, "saved networks"),
            Err(e) => tracing::warn!(error = %e, "failed to save networks"),
        }
    }

    async fn save_result(&self, result: &TestResult) {
        let Some(store) = &self.parts.store else {
            return;
        };
        if let Err(e) = store.upsert_test_result(result).await {
            tracing::warn!(error = %e, "failed to save test result");
        }
    }
}

/// Live link values win over scan-time values: association may resolve to a
/// different radio than the one requested.
fn stamp(result: &mut TestResult, link: LinkInfo, network: &DiscoveredNetwork) {
    result.ssid = link.ssid.or_else(|| Some(network.ssid.clone()));
    result.bssid = link.bssid.or_else(|| Some(network.bssid.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Band;

    fn net(bssid: &str, ssid: &str, signal: f64) -> DiscoveredNetwork {
        DiscoveredNetwork {
            bssid: bssid.into(),
            ssid: ssid.into(),
            frequency_mhz: 2412.0,
            band: Band::TwoPointFourGhz,
            signal_dbm: signal,
            channel: None,
            security: None,
            observed_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn candidates_are_filtered_sorted_and_capped() {
        let networks = vec![
            net("00:00:00:00:00:01", "Golden_A", -70.0),
            net("00:00:00:00:00:02", "Other", -20.0),
            net("00:00:00:00:00:03", "Golden_B", -40.0),
            net("00:00:00:00:00:04", "Golden_C", -70.0),
            net("00:00:00:00:00:05", "Golden_D", -90.0),
        ];
        let picked = Campaign::select_candidates(networks.clone(), Some("Golden_"), Some(3));
        let bssids: Vec<_> = picked.iter().map(|n| &n.bssid[15..]).collect();
        // 信号相同时保持扫描顺序
        assert_eq!(bssids, ["03", "01", "04"]);

        let all = Campaign::select_candidates(networks, None, None);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].ssid, "Other");
    }

    #[test]
    fn zero_limit_keeps_every_candidate() {
        let networks = vec![
            net("00:00:00:00:00:01", "Golden_A", -60.0),
            net("00:00:00:00:00:02", "Golden_A", -50.0),
        ];
        let picked = Campaign::select_candidates(networks, Some("Golden_"), Some(0));
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].bssid, "00:00:00:00:00:02");
    }

    #[test]
    fn stamping_prefers_live_link() {
        let network = net("00:00:00:00:00:01", "Golden_A", -50.0);
        let mut result = TestResult::new(SpeedTool::Ookla, OffsetDateTime::UNIX_EPOCH);
        stamp(
            &mut result,
            LinkInfo {
                ssid: None,
                bssid: Some("00:00:00:00:00:09".into()),
            },
            &network,
        );
        assert_eq!(result.ssid.as_deref(), Some("Golden_A"));
        assert_eq!(result.bssid.as_deref(), Some("00:00:00:00:00:09"));
    }
}
