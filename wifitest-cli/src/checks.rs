use anyhow::bail;
use nix::unistd::{Uid, geteuid};
use std::time::Duration;
use wifitest_core::Error;
use wifitest_core::backends::utils::verify_binary;

/// 扫描和连接都需要 root 权限
pub fn ensure_root() -> anyhow::Result<()> {
    require_root(geteuid())
}

fn require_root(euid: Uid) -> anyhow::Result<()> {
    if !euid.is_root() {
        bail!("this tool must be run with sudo (root) privileges.\nTry: sudo wifi-test <command>");
    }
    Ok(())
}

pub async fn ensure_iw() -> anyhow::Result<()> {
    match verify_binary("iw", "iw", Duration::from_secs(5)).await {
        Ok(()) => Ok(()),
        Err(Error::ToolNotFound(_)) => bail!(
            "'iw' command not found. Please install it:\n  Ubuntu/Debian: sudo apt install iw\n  Fedora/RHEL:   sudo dnf install iw"
        ),
        Err(e) => Err(e.into()),
    }
}
