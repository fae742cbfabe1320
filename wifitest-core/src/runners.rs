// 测速工具执行器：调用 speedtest / iperf3 命令并把 JSON 输出交给解析器

use crate::backends::utils::{failure_text, run_command, verify_binary};
use crate::parsing::{ParseError, parse_iperf3_json, parse_ookla_json};
use crate::structs::{SpeedTool, TestResult, TestRun};
use crate::traits::{Iperf3Request, SpeedTester};
use crate::{Error, Result};
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;

const OOKLA_TIMEOUT: Duration = Duration::from_secs(300);
/// Extra time granted to iperf3 on top of the test duration for setup.
const IPERF3_GRACE: Duration = Duration::from_secs(30);
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the real command line tools.
#[derive(Debug, Clone, Default)]
pub struct CliSpeedTester;

impl CliSpeedTester {
    pub fn new() -> Self {
        Self
    }

    pub fn ookla_args(interface: &str) -> Vec<String> {
        let mut args = vec!["--format=json".to_string(), "--accept-license".to_string()];
        if !interface.is_empty() {
            args.extend(["--interface".to_string(), interface.to_string()]);
        }
        args
    }

    pub fn iperf3_args(request: &Iperf3Request) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            request.server.clone(),
            "-p".to_string(),
            request.port.to_string(),
            "-t".to_string(),
            request.duration.as_secs().to_string(),
            "-J".to_string(),
        ];
        if request.udp {
            args.push("-u".to_string());
            if let Some(bandwidth) = request.bandwidth.as_deref().filter(|b| !b.is_empty()) {
                args.extend(["-b".to_string(), bandwidth.to_string()]);
            }
        }
        args
    }

    async fn invoke(tool: SpeedTool, args: &[String], limit: Duration) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match run_command(tool.binary(), &args, limit).await {
            Err(Error::Timeout { after, .. }) => Err(Error::Timeout {
                what: tool.display_name().to_string(),
                after,
            }),
            other => other,
        }
    }
}

/// Converts parser output into a run. A tool-reported error is a failure;
/// anything else the parser rejects means the tool produced nothing usable.
fn interpret(tool: SpeedTool, parsed: std::result::Result<TestResult, ParseError>) -> TestRun {
    match parsed {
        Ok(result) => TestRun::Completed(result),
        Err(ParseError::ToolReported(message)) => {
            TestRun::Failed(Error::CommandFailed(format!("{} test failed: {}", tool, message)))
        }
        Err(e) => {
            tracing::warn!(%tool, error = %e, "could not parse speed test output");
            TestRun::NoResult
        }
    }
}

/// iperf3 prints its failure reason as `{"error": "..."}` on stdout even when
/// exiting non-zero, so prefer that over stderr.
fn iperf3_failure_message(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_iperf3_json(&stdout) {
        Err(ParseError::ToolReported(message)) => message,
        _ => failure_text(output),
    }
}

#[async_trait]
impl SpeedTester for CliSpeedTester {
    async fn ookla(&self, interface: &str) -> TestRun {
        let args = Self::ookla_args(interface);
        let output = match Self::invoke(SpeedTool::Ookla, &args, OOKLA_TIMEOUT).await {
            Ok(output) => output,
            Err(e) => return TestRun::Failed(e),
        };
        if !output.status.success() {
            return TestRun::Failed(Error::CommandFailed(format!(
                "Ookla speedtest failed: {}",
                failure_text(&output)
            )));
        }
        interpret(
            SpeedTool::Ookla,
            parse_ookla_json(&String::from_utf8_lossy(&output.stdout)),
        )
    }

    async fn iperf3(&self, request: &Iperf3Request) -> TestRun {
        let args = Self::iperf3_args(request);
        let limit = request.duration + IPERF3_GRACE;
        let output = match Self::invoke(SpeedTool::Iperf3, &args, limit).await {
            Ok(output) => output,
            Err(e) => return TestRun::Failed(e),
        };
        if !output.status.success() {
            return TestRun::Failed(Error::CommandFailed(format!(
                "iperf3 test failed: {}",
                iperf3_failure_message(&output)
            )));
        }
        match interpret(
            SpeedTool::Iperf3,
            parse_iperf3_json(&String::from_utf8_lossy(&output.stdout)),
        ) {
            TestRun::Completed(mut result) => {
                // 解析器拿不到可靠的服务器地址，使用请求中的地址
                result.server = Some(request.server.clone());
                TestRun::Completed(result)
            }
            other => other,
        }
    }

    async fn verify_available(&self, tool: SpeedTool) -> Result<()> {
        verify_binary(tool.binary(), tool.display_name(), VERSION_CHECK_TIMEOUT).await
    }
}
