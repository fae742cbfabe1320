use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod checks;
mod render;
mod runner;

/// Scan Wi-Fi networks, speed-test them one by one and export the results.
#[derive(Parser, Debug)]
#[command(name = "wifi-test", version)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "wifi-test.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan for networks
    Scan(ScanArgs),
    /// Run a speed test on the current network, or on every matching network
    Speedtest(SpeedtestArgs),
    /// Export stored results to CSV
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Filter by SSID prefix. `-p` alone uses the configured prefix
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    pub prefix: Option<String>,
    /// Save results (defaults to the `auto_save` setting)
    #[arg(long, overrides_with = "no_save")]
    pub save: bool,
    #[arg(long, overrides_with = "save")]
    pub no_save: bool,
    /// Show at most N networks (0 shows all)
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Print one `bssid ssid` line per network
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct SpeedtestArgs {
    /// Connect to every network matching the prefix and test each one
    #[arg(short = 'a', long)]
    pub auto_connect: bool,
    /// SSID prefix (defaults to the configured prefix)
    #[arg(short, long)]
    pub prefix: Option<String>,
    /// Test at most N networks (0 tests all)
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Use UDP for iperf3
    #[arg(short, long)]
    pub udp: bool,
    /// Print every field of each result
    #[arg(long)]
    pub details: bool,
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output file, relative paths land in `output_dir`
    #[arg(short, long, default_value = "wifi_export.csv")]
    pub output: PathBuf,
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // 初始化日志，默认 info 级别
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match runner::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
