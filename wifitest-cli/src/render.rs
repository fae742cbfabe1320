// 纯文本输出

use wifitest_core::structs::{
    CampaignReport, DiscoveredNetwork, OutcomeStatus, RestoreStatus, TestResult,
};

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn mbps(value: f64) -> String {
    format!("{:.2}", value)
}

fn ping(value: Option<f64>) -> String {
    value.map(|p| format!("{:.1} ms", p)).unwrap_or_else(|| "-".to_string())
}

pub fn network_lines(networks: &[DiscoveredNetwork]) {
    for n in networks {
        println!("{} {}", n.bssid, n.ssid);
    }
}

pub fn network_table(networks: &[DiscoveredNetwork]) {
    println!(
        "{:<19} {:<32} {:<8} {:>8} {:>4} {:<10}",
        "BSSID", "SSID", "Band", "Signal", "Ch", "Security"
    );
    for n in networks {
        println!(
            "{:<19} {:<32} {:<8} {:>8} {:>4} {:<10}",
            n.bssid,
            n.ssid,
            n.band.as_str(),
            format!("{:.0} dBm", n.signal_dbm),
            or_dash(n.channel),
            n.security.map(|s| s.as_str()).unwrap_or("Open"),
        );
    }
}

pub fn single_result(result: &TestResult, quiet: bool) {
    if quiet {
        println!(
            "{} {} {}",
            mbps(result.download_mbps),
            mbps(result.upload_mbps),
            ping(result.ping_ms)
        );
        return;
    }
    println!("✅ Speed test complete ({})", result.tool.display_name());
    details(result, "  ");
}

fn details(result: &TestResult, indent: &str) {
    println!("{indent}Network:  {} ({})", or_dash(result.ssid.as_deref()), or_dash(result.bssid.as_deref()));
    println!("{indent}Download: {} Mbps", mbps(result.download_mbps));
    println!("{indent}Upload:   {} Mbps", mbps(result.upload_mbps));
    println!("{indent}Ping:     {}", ping(result.ping_ms));
    println!("{indent}Jitter:   {:.2} ms", result.jitter_ms);
    println!("{indent}Loss:     {:.2} %", result.packet_loss_pct);
    println!("{indent}Server:   {}", result.server.as_deref().unwrap_or("Unknown"));
    if let Some(isp) = &result.isp {
        println!("{indent}ISP:      {}", isp);
    }
    if let Some(url) = &result.result_url {
        println!("{indent}Result:   {}", url);
    }
}

pub fn campaign_summary(report: &CampaignReport, show_details: bool) {
    println!();
    println!(
        "{:<32} {:<19} {:<18} {:>10} {:>10} {:>10}",
        "SSID", "BSSID", "Status", "Down", "Up", "Ping"
    );
    for outcome in &report.outcomes {
        let network = outcome.network();
        let (down, up, latency) = match outcome.result() {
            Some(r) => (mbps(r.download_mbps), mbps(r.upload_mbps), ping(r.ping_ms)),
            None => ("-".into(), "-".into(), "-".into()),
        };
        println!(
            "{:<32} {:<19} {:<18} {:>10} {:>10} {:>10}",
            network.ssid,
            network.bssid,
            outcome.status().label(),
            down,
            up,
            latency
        );
        if outcome.status() != OutcomeStatus::Success {
            if let Some(error) = outcome.error() {
                println!("    {}", error);
            }
        }
        if show_details {
            if let Some(result) = outcome.result() {
                details(result, "    ");
            }
        }
    }
    println!();
    println!(
        "{}/{} networks tested successfully",
        report.successes(),
        report.total()
    );
    match &report.restore {
        RestoreStatus::Restored(name) => println!("🔁 Restored original connection: {}", name),
        RestoreStatus::Failed(name) => {
            println!("⚠️ Could not restore original connection: {}", name)
        }
        RestoreStatus::NothingToRestore => {}
    }
}
