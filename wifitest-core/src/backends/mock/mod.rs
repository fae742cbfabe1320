//! Scriptable in-memory collaborators. Nothing here touches real hardware;
//! every call is recorded so tests can assert on the exact sequence.

use crate::structs::{ConnectionRequest, LinkInfo, SpeedTool, TestResult, TestRun};
use crate::traits::{Iperf3Request, NetworkManager, ReachabilityProbe, ScanSource, SpeedTester};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============= NetworkManager =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect { ssid: String, bssid: Option<String> },
    Disconnect,
    WaitUntilConnected,
    CurrentLink,
    ReconnectSaved { bssid: Option<String>, ssid: Option<String> },
}

/// Simulated network manager. Connects succeed unless the ssid was marked
/// as failing; the live link follows connect/disconnect/reconnect calls.
#[derive(Debug, Default)]
pub struct MockNetworkManager {
    failing: HashSet<String>,
    never_activates: HashSet<String>,
    associates_to: HashMap<String, String>,
    original: LinkInfo,
    restore_fails: bool,
    live: Mutex<LinkInfo>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockNetworkManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The link the interface is on before the campaign starts.
    pub fn with_original_link(mut self, ssid: &str, bssid: &str) -> Self {
        self.original = LinkInfo {
            ssid: Some(ssid.to_string()),
            bssid: Some(bssid.to_string()),
        };
        *locked(&self.live) = self.original.clone();
        self
    }

    pub fn fail_connect(mut self, ssid: &str) -> Self {
        self.failing.insert(ssid.to_string());
        self
    }

    /// Connect reports success but the link never comes up.
    pub fn never_activate(mut self, ssid: &str) -> Self {
        self.never_activates.insert(ssid.to_string());
        self
    }

    /// Association resolves to `bssid` whatever radio was requested.
    pub fn associate_to(mut self, ssid: &str, bssid: &str) -> Self {
        self.associates_to.insert(ssid.to_string(), bssid.to_string());
        self
    }

    pub fn restore_fails(mut self) -> Self {
        self.restore_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        locked(&self.calls).clone()
    }

    pub fn count(&self, pred: impl Fn(&MockCall) -> bool) -> usize {
        locked(&self.calls).iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: MockCall) {
        locked(&self.calls).push(call);
    }
}

#[async_trait]
impl NetworkManager for MockNetworkManager {
    async fn connect(&self, request: &ConnectionRequest) -> Result<()> {
        self.record(MockCall::Connect {
            ssid: request.ssid.clone(),
            bssid: request.bssid.clone(),
        });
        if self.failing.contains(&request.ssid) {
            return Err(Error::ConnectFailure(format!(
                "Secrets were required, but not provided for '{}'",
                request.ssid
            )));
        }
        let bssid = self
            .associates_to
            .get(&request.ssid)
            .cloned()
            .or_else(|| request.bssid.clone());
        *locked(&self.live) = LinkInfo {
            ssid: Some(request.ssid.clone()),
            bssid,
        };
        Ok(())
    }

    async fn disconnect(&self, _interface: &str) -> bool {
        self.record(MockCall::Disconnect);
        *locked(&self.live) = LinkInfo::default();
        true
    }

    async fn wait_until_connected(&self, _interface: &str, timeout: Duration) -> bool {
        self.record(MockCall::WaitUntilConnected);
        let ssid = locked(&self.live).ssid.clone();
        match ssid {
            Some(ssid) if !self.never_activates.contains(&ssid) => true,
            _ => {
                tokio::time::sleep(timeout).await;
                false
            }
        }
    }

    async fn current_link(&self, _interface: &str) -> LinkInfo {
        self.record(MockCall::CurrentLink);
        locked(&self.live).clone()
    }

    async fn reconnect_saved(&self, bssid: Option<&str>, ssid: Option<&str>) -> bool {
        self.record(MockCall::ReconnectSaved {
            bssid: bssid.map(str::to_string),
            ssid: ssid.map(str::to_string),
        });
        if self.restore_fails {
            return false;
        }
        *locked(&self.live) = self.original.clone();
        true
    }
}

// ============= ScanSource =============

/// Returns scripted scan responses in order, then empty output.
#[derive(Debug, Default)]
pub struct MockScanner {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: AtomicUsize,
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(text: &str) -> Self {
        Self::new().then_ok(text)
    }

    pub fn then_ok(self, text: &str) -> Self {
        locked(&self.responses).push_back(Ok(text.to_string()));
        self
    }

    pub fn then_err(self, err: Error) -> Self {
        locked(&self.responses).push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanSource for MockScanner {
    async fn raw_scan(&self, _interface: &str, _flush: bool) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

// ============= SpeedTester =============

/// What a scripted tool invocation produces.
#[derive(Debug, Clone, PartialEq)]
pub enum MockRun {
    Complete { download: f64, upload: f64 },
    Empty,
    Fail(String),
}

impl MockRun {
    fn into_run(self, tool: SpeedTool) -> TestRun {
        match self {
            MockRun::Complete { download, upload } => {
                let mut result = TestResult::new(tool, OffsetDateTime::now_utc());
                result.download_mbps = download;
                result.upload_mbps = upload;
                if tool == SpeedTool::Ookla {
                    result.ping_ms = Some(12.0);
                }
                TestRun::Completed(result)
            }
            MockRun::Empty => TestRun::NoResult,
            MockRun::Fail(message) => TestRun::Failed(Error::CommandFailed(message)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TesterCall {
    Ookla,
    Iperf3 { port: u16, udp: bool },
}

/// Ookla runs pop from a queue (default: a complete 100/10 run); iperf3
/// answers per port (default: connection refused).
#[derive(Debug, Default)]
pub struct MockSpeedTester {
    ookla: Mutex<VecDeque<MockRun>>,
    iperf3_ports: HashMap<u16, MockRun>,
    missing: HashSet<SpeedTool>,
    calls: Mutex<Vec<TesterCall>>,
}

impl MockSpeedTester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ookla(self, run: MockRun) -> Self {
        locked(&self.ookla).push_back(run);
        self
    }

    pub fn iperf3_port(mut self, port: u16, run: MockRun) -> Self {
        self.iperf3_ports.insert(port, run);
        self
    }

    pub fn without(mut self, tool: SpeedTool) -> Self {
        self.missing.insert(tool);
        self
    }

    pub fn calls(&self) -> Vec<TesterCall> {
        locked(&self.calls).clone()
    }
}

#[async_trait]
impl SpeedTester for MockSpeedTester {
    async fn ookla(&self, _interface: &str) -> TestRun {
        locked(&self.calls).push(TesterCall::Ookla);
        let run = locked(&self.ookla).pop_front().unwrap_or(MockRun::Complete {
            download: 100.0,
            upload: 10.0,
        });
        run.into_run(SpeedTool::Ookla)
    }

    async fn iperf3(&self, request: &Iperf3Request) -> TestRun {
        locked(&self.calls).push(TesterCall::Iperf3 {
            port: request.port,
            udp: request.udp,
        });
        let run = self
            .iperf3_ports
            .get(&request.port)
            .cloned()
            .unwrap_or_else(|| MockRun::Fail("unable to connect to server: Connection refused".into()));
        match run.into_run(SpeedTool::Iperf3) {
            TestRun::Completed(mut result) => {
                result.server = Some(request.server.clone());
                TestRun::Completed(result)
            }
            other => other,
        }
    }

    async fn verify_available(&self, tool: SpeedTool) -> Result<()> {
        if self.missing.contains(&tool) {
            return Err(Error::ToolNotFound(tool.binary().to_string()));
        }
        Ok(())
    }
}

// ============= ReachabilityProbe =============

/// Answers from a script, then `true`.
#[derive(Debug, Default)]
pub struct MockProbe {
    answers: Mutex<VecDeque<bool>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, reachable: bool) -> Self {
        locked(&self.answers).push_back(reachable);
        self
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn has_internet(&self) -> bool {
        locked(&self.answers).pop_front().unwrap_or(true)
    }
}
