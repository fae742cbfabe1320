// 通过调用 nmcli / iw 命令行工具实现的后端，适用于使用 NetworkManager 管理网络连接的 Linux 系统

use crate::backends::utils::{failure_text, run_command};
use crate::parsing::{is_link_activated, parse_active_ssid, parse_interface_name, parse_iw_link};
use crate::structs::{ConnectionRequest, LinkInfo};
use crate::traits::{NetworkManager, ScanSource};
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

const FALLBACK_INTERFACE: &str = "wlan0";

/// 内核在连续扫描时可能返回 -105
const KERNEL_BUFFER_EXHAUSTED: &str = "No buffer space available";

/// Per-command deadlines. No external call may block longer than these.
#[derive(Debug, Clone)]
pub struct DriverTimeouts {
    pub connect: Duration,
    pub disconnect: Duration,
    pub link_query: Duration,
    pub poll_interval: Duration,
    pub reconnect: Duration,
    pub scan: Duration,
}

impl Default for DriverTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            disconnect: Duration::from_secs(10),
            link_query: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
            reconnect: Duration::from_secs(20),
            scan: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NmcliBackend {
    timeouts: DriverTimeouts,
}

impl NmcliBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeouts(timeouts: DriverTimeouts) -> Self {
        Self { timeouts }
    }

    /// Builds the `nmcli dev wifi connect` argument list. An empty password
    /// joins an open network; a known bssid pins the exact radio.
    pub fn connect_args(request: &ConnectionRequest) -> Vec<&str> {
        let mut args = vec!["dev", "wifi", "connect", request.ssid.as_str()];
        if !request.password.is_empty() {
            args.extend(["password", request.password.as_str()]);
        }
        args.extend(["ifname", request.interface.as_str()]);
        if let Some(bssid) = request.bssid.as_deref() {
            args.extend(["bssid", bssid]);
        }
        args
    }

    async fn link_state(&self, interface: &str) -> bool {
        match run_command(
            "nmcli",
            &["-t", "-f", "GENERAL.STATE", "dev", "show", interface],
            self.timeouts.link_query,
        )
        .await
        {
            Ok(out) if out.status.success() => {
                is_link_activated(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(interface, error = %e, "link state query failed");
                false
            }
        }
    }

    async fn active_ssid_from_nmcli(&self) -> Option<String> {
        let out = run_command(
            "nmcli",
            &["-t", "-f", "active,ssid", "dev", "wifi"],
            self.timeouts.link_query,
        )
        .await
        .ok()?;
        parse_active_ssid(&String::from_utf8_lossy(&out.stdout))
    }

    async fn succeeds(&self, args: &[&str], limit: Duration) -> bool {
        match run_command("nmcli", args, limit).await {
            Ok(out) => out.status.success(),
            Err(e) => {
                tracing::debug!(error = %e, "nmcli call failed");
                false
            }
        }
    }
}

/// 使用 `iw dev` 探测第一个无线接口，失败时回退到 wlan0
pub async fn detect_interface() -> String {
    match run_command("iw", &["dev"], Duration::from_secs(5)).await {
        Ok(out) if out.status.success() => {
            parse_interface_name(&String::from_utf8_lossy(&out.stdout))
                .unwrap_or_else(|| FALLBACK_INTERFACE.to_string())
        }
        Ok(_) => FALLBACK_INTERFACE.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "interface detection failed, using {}", FALLBACK_INTERFACE);
            FALLBACK_INTERFACE.to_string()
        }
    }
}

#[async_trait]
impl NetworkManager for NmcliBackend {
    async fn connect(&self, request: &ConnectionRequest) -> Result<()> {
        let args = Self::connect_args(request);
        match run_command("nmcli", &args, self.timeouts.connect).await {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(Error::ConnectFailure(failure_text(&out))),
            Err(Error::Timeout { .. }) => Err(Error::ConnectFailure("Connection timeout".into())),
            Err(e) => Err(e),
        }
    }

    async fn disconnect(&self, interface: &str) -> bool {
        self.succeeds(&["dev", "disconnect", interface], self.timeouts.disconnect)
            .await
    }

    async fn wait_until_connected(&self, interface: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.link_state(interface).await {
                return true;
            }
            if Instant::now() + self.timeouts.poll_interval > deadline {
                tracing::debug!(interface, "interface did not activate within {:?}", timeout);
                return false;
            }
            tokio::time::sleep(self.timeouts.poll_interval).await;
        }
    }

    async fn current_link(&self, interface: &str) -> LinkInfo {
        let mut link = match run_command("iw", &["dev", interface, "link"], self.timeouts.link_query)
            .await
        {
            Ok(out) => parse_iw_link(&String::from_utf8_lossy(&out.stdout)),
            Err(e) => {
                tracing::debug!(interface, error = %e, "iw link query failed");
                LinkInfo::default()
            }
        };
        // 某些系统上 iw 的输出不同，回退到 nmcli
        if link.ssid.is_none() {
            link.ssid = self.active_ssid_from_nmcli().await;
        }
        link
    }

    async fn reconnect_saved(&self, bssid: Option<&str>, ssid: Option<&str>) -> bool {
        if let Some(ssid) = ssid {
            if self
                .succeeds(&["con", "up", "id", ssid], self.timeouts.reconnect)
                .await
            {
                return true;
            }
        }
        match bssid.or(ssid) {
            Some(target) => {
                self.succeeds(&["dev", "wifi", "connect", target], self.timeouts.reconnect)
                    .await
            }
            None => false,
        }
    }
}

#[async_trait]
impl ScanSource for NmcliBackend {
    async fn raw_scan(&self, interface: &str, flush: bool) -> Result<String> {
        if flush {
            // 刷新扫描缓存，只有 iw 缺失才算致命错误
            match run_command("iw", &["dev", interface, "scan", "flush"], self.timeouts.scan).await {
                Err(e @ Error::ToolNotFound(_)) => return Err(e),
                Err(e) => tracing::debug!(interface, error = %e, "scan flush failed, continuing"),
                Ok(_) => {}
            }
        }

        let out = match run_command("iw", &["dev", interface, "scan"], self.timeouts.scan).await {
            Ok(out) => out,
            Err(Error::Timeout { after, .. }) => {
                return Err(Error::Timeout {
                    what: format!("WiFi scan on interface {}", interface),
                    after,
                });
            }
            Err(e) => return Err(e),
        };
        if !out.status.success() {
            let err = failure_text(&out);
            if err.contains(KERNEL_BUFFER_EXHAUSTED) {
                return Err(Error::ScanFailed(format!("{} (-105)", KERNEL_BUFFER_EXHAUSTED)));
            }
            return Err(Error::ScanFailed(err));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str, bssid: Option<&str>) -> ConnectionRequest {
        ConnectionRequest {
            interface: "wlan0".into(),
            ssid: "Golden_Lab".into(),
            bssid: bssid.map(str::to_string),
            password: password.into(),
        }
    }

    #[test]
    fn connect_args_pin_interface_and_bssid() {
        let req = request("secret", Some("34:ca:81:49:15:ff"));
        assert_eq!(
            NmcliBackend::connect_args(&req),
            [
                "dev", "wifi", "connect", "Golden_Lab", "password", "secret", "ifname", "wlan0",
                "bssid", "34:ca:81:49:15:ff"
            ]
        );
    }

    #[test]
    fn connect_args_skip_empty_password() {
        let req = request("", None);
        assert_eq!(
            NmcliBackend::connect_args(&req),
            ["dev", "wifi", "connect", "Golden_Lab", "ifname", "wlan0"]
        );
    }
}
