use crate::Result;
use crate::storage::NetworkRecord;
use crate::structs::{
    ConnectionRequest, DiscoveredNetwork, LinkInfo, SpeedTool, TestResult, TestRun,
};
use async_trait::async_trait;
use std::time::Duration;

// 在这里定义测试活动依赖的所有外部协作者接口。
// 每个调用都必须有超时，任何挂起的外部命令都被视为失败。

/// 操作系统网络管理器的最小能力集合
#[async_trait]
pub trait NetworkManager: Send + Sync {
    /// Associates with a network. `Err(Error::ConnectFailure)` carries the
    /// manager's message; a timeout is also a failure.
    async fn connect(&self, request: &ConnectionRequest) -> Result<()>;

    /// Best effort. Errors are swallowed and reported as `false`.
    async fn disconnect(&self, interface: &str) -> bool;

    /// Polls link state until the interface is up or `timeout` elapses.
    async fn wait_until_connected(&self, interface: &str, timeout: Duration) -> bool;

    /// The association the interface currently reports.
    async fn current_link(&self, interface: &str) -> LinkInfo;

    /// Re-activates a saved profile: by profile id first, then a generic
    /// connect using stored credentials.
    async fn reconnect_saved(&self, bssid: Option<&str>, ssid: Option<&str>) -> bool;
}

/// 原始扫描调用：返回扫描工具的原始文本
#[async_trait]
pub trait ScanSource: Send + Sync {
    async fn raw_scan(&self, interface: &str, flush: bool) -> Result<String>;
}

/// Parameters for a single iperf3 run against one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iperf3Request {
    pub server: String,
    pub port: u16,
    pub duration: Duration,
    pub udp: bool,
    /// Target bandwidth for UDP mode, e.g. `100M`.
    pub bandwidth: Option<String>,
}

/// 测速工具的执行器。每次调用只尝试一次，端口回退由调用方负责。
#[async_trait]
pub trait SpeedTester: Send + Sync {
    async fn ookla(&self, interface: &str) -> TestRun;

    async fn iperf3(&self, request: &Iperf3Request) -> TestRun;

    /// Fails with `Error::ToolNotFound` when the tool is not installed.
    async fn verify_available(&self, tool: SpeedTool) -> Result<()>;
}

/// 外网可达性探测
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn has_internet(&self) -> bool;
}

/// Storage sink. Both upserts are keyed by bssid and merge into one record.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn upsert_networks(&self, networks: &[DiscoveredNetwork]) -> Result<usize>;

    async fn upsert_test_result(&self, result: &TestResult) -> Result<usize>;

    /// All merged records, ordered by bssid.
    async fn all_records(&self) -> Result<Vec<NetworkRecord>>;
}
