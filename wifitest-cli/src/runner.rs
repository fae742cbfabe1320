use crate::{Cli, Commands, ExportArgs, ScanArgs, SpeedtestArgs, checks, render};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use wifitest_core::backends::nmcli::{NmcliBackend, detect_interface};
use wifitest_core::campaign::{Campaign, CampaignOptions, Collaborators};
use wifitest_core::config::{CampaignConfig, ConfigFile};
use wifitest_core::export::export_to_path;
use wifitest_core::probe::TcpProbe;
use wifitest_core::runners::CliSpeedTester;
use wifitest_core::storage::SqliteStore;
use wifitest_core::traits::ResultStore;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    checks::ensure_root()?;
    checks::ensure_iw().await?;

    let config = load_config(&cli.config).await?;
    tracing::debug!(interface = %config.interface, tool = %config.tool, "configuration loaded");

    match cli.command {
        Commands::Scan(args) => scan(config, args).await,
        Commands::Speedtest(args) => speedtest(config, args).await,
        Commands::Export(args) => export(config, args).await,
    }
}

async fn load_config(path: &Path) -> anyhow::Result<CampaignConfig> {
    let file = ConfigFile::load(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let detected = if file.wants_interface_detection() {
        Some(detect_interface().await)
    } else {
        None
    };
    Ok(file.into_config(detected)?)
}

async fn open_store(config: &CampaignConfig) -> anyhow::Result<Arc<dyn ResultStore>> {
    let store = SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    Ok(Arc::new(store))
}

/// 组装真实后端
async fn build_campaign(config: CampaignConfig, with_store: bool) -> anyhow::Result<Campaign> {
    let backend = Arc::new(NmcliBackend::new());
    let store = if with_store {
        Some(open_store(&config).await?)
    } else {
        None
    };
    let parts = Collaborators {
        network: backend.clone(),
        scanner: backend,
        tester: Arc::new(CliSpeedTester::new()),
        probe: Arc::new(TcpProbe::default()),
        store,
    };
    Ok(Campaign::new(config, parts))
}

async fn scan(config: CampaignConfig, args: ScanArgs) -> anyhow::Result<()> {
    // `-p` alone means the configured prefix
    let prefix = match args.prefix.as_deref() {
        Some("") => config.prefix.clone(),
        other => other.map(str::to_string),
    };
    let save = if args.save {
        true
    } else if args.no_save {
        false
    } else {
        config.auto_save
    };

    let campaign = build_campaign(config, save).await?;
    if !args.quiet {
        println!("📡 Scanning on {}...", campaign.config().interface);
    }
    let networks = campaign
        .survey(prefix.as_deref(), args.limit, save)
        .await?;

    if args.quiet {
        render::network_lines(&networks);
    } else {
        render::network_table(&networks);
        match &prefix {
            Some(p) => println!("Found {} networks matching '{}'", networks.len(), p),
            None => println!("Found {} networks", networks.len()),
        }
        if save {
            println!("💾 Saved to {}", campaign.config().db_path.display());
        }
    }
    Ok(())
}

async fn speedtest(config: CampaignConfig, args: SpeedtestArgs) -> anyhow::Result<()> {
    let with_store = config.auto_save;
    let campaign = build_campaign(config, with_store).await?;

    if !args.auto_connect {
        if !args.quiet {
            println!("🚀 Running {} on the current network...", campaign.config().tool.display_name());
        }
        let result = campaign.run_single(args.udp).await?;
        render::single_result(&result, args.quiet);
        return Ok(());
    }

    let options = CampaignOptions {
        prefix: args.prefix,
        limit: args.limit,
        udp: args.udp,
    };
    let report = campaign.run(&options).await?;
    if report.total() == 0 {
        println!("No networks matched the prefix");
        return Ok(());
    }
    render::campaign_summary(&report, args.details);
    Ok(())
}

async fn export(config: CampaignConfig, args: ExportArgs) -> anyhow::Result<()> {
    let path = if args.output.is_absolute() {
        args.output
    } else {
        config.output_dir.join(&args.output)
    };
    let store = open_store(&config).await?;
    let records = store.all_records().await?;
    let count = export_to_path(&records, &path, args.force)?;
    println!("✅ Exported {} records to {}", count, path.display());
    Ok(())
}
