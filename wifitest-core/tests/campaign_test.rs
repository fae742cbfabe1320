mod common;

use common::{HOME_BSSID, HOME_SSID, Harness, block, config, golden_scan};
use wifitest_core::Error;
use wifitest_core::backends::mock::{
    MockCall, MockNetworkManager, MockProbe, MockRun, MockScanner, MockSpeedTester, TesterCall,
};
use wifitest_core::campaign::CampaignOptions;
use wifitest_core::structs::{OutcomeStatus, RestoreStatus, SpeedTool};
use wifitest_core::traits::ResultStore;

fn statuses(report: &wifitest_core::structs::CampaignReport) -> Vec<OutcomeStatus> {
    report.outcomes.iter().map(|o| o.status()).collect()
}

fn is_disconnect(call: &MockCall) -> bool {
    matches!(call, MockCall::Disconnect)
}

fn is_reconnect(call: &MockCall) -> bool {
    matches!(call, MockCall::ReconnectSaved { .. })
}

#[tokio::test(start_paused = true)]
async fn failed_connect_does_not_stop_the_campaign() {
    let h = Harness::new(
        MockNetworkManager::new()
            .with_original_link(HOME_SSID, HOME_BSSID)
            .fail_connect("Golden_B"),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.total(), 3);
    assert_eq!(report.successes(), 2);
    assert_eq!(
        statuses(&report),
        [
            OutcomeStatus::Success,
            OutcomeStatus::ConnectionFailed,
            OutcomeStatus::Success
        ]
    );
    assert!(report.outcomes[1].error().unwrap().contains("Secrets were required"));
    assert!(report.outcomes[1].result().is_none());

    // 每个网络之后（包括失败的那个）都必须断开
    let calls = h.network.calls();
    let connects: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, MockCall::Connect { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(connects.len(), 3);
    for (n, &start) in connects.iter().enumerate() {
        let end = connects.get(n + 1).copied().unwrap_or(calls.len());
        assert!(
            calls[start..end].iter().any(is_disconnect),
            "no disconnect after connect #{n}"
        );
    }
    assert_eq!(h.network.count(is_disconnect), 6);
}

#[tokio::test(start_paused = true)]
async fn original_link_is_restored_exactly_once() {
    let h = Harness::new(
        MockNetworkManager::new()
            .with_original_link(HOME_SSID, HOME_BSSID)
            .fail_connect("Golden_A")
            .fail_connect("Golden_C"),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.restore, RestoreStatus::Restored(HOME_SSID.into()));
    assert_eq!(h.network.count(is_reconnect), 1);
    assert_eq!(
        h.network.calls().last(),
        Some(&MockCall::ReconnectSaved {
            bssid: Some(HOME_BSSID.into()),
            ssid: Some(HOME_SSID.into()),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn restore_failure_leaves_outcomes_untouched() {
    let h = Harness::new(
        MockNetworkManager::new()
            .with_original_link(HOME_SSID, HOME_BSSID)
            .fail_connect("Golden_B")
            .restore_fails(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.restore, RestoreStatus::Failed(HOME_SSID.into()));
    assert_eq!(h.network.count(is_reconnect), 1);
    assert_eq!(
        statuses(&report),
        [
            OutcomeStatus::Success,
            OutcomeStatus::ConnectionFailed,
            OutcomeStatus::Success
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn nothing_to_restore_without_an_original_link() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.restore, RestoreStatus::NothingToRestore);
    assert_eq!(h.network.count(is_reconnect), 0);
}

#[tokio::test(start_paused = true)]
async fn iperf3_falls_back_to_the_first_working_port() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&block("00:00:00:00:00:0a", "Golden_A", 5180, -40.0)),
        MockSpeedTester::new()
            .iperf3_port(5201, MockRun::Fail("Connection refused".into()))
            .iperf3_port(5202, MockRun::Fail("server is busy".into()))
            .iperf3_port(
                5203,
                MockRun::Complete {
                    download: 50.0,
                    upload: 60.0,
                },
            ),
    );
    let report = h
        .campaign(config(SpeedTool::Iperf3))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(statuses(&report), [OutcomeStatus::Success]);
    let result = report.outcomes[0].result().unwrap();
    assert_eq!(result.download_mbps, 50.0);
    assert_eq!(result.upload_mbps, 60.0);
    assert_eq!(result.server.as_deref(), Some("10.0.0.5"));
    assert_eq!(
        h.tester.calls(),
        [
            TesterCall::Iperf3 { port: 5201, udp: false },
            TesterCall::Iperf3 { port: 5202, udp: false },
            TesterCall::Iperf3 { port: 5203, udp: false },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_ports_surface_the_last_error() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&block("00:00:00:00:00:0a", "Golden_A", 5180, -40.0)),
        MockSpeedTester::new()
            .iperf3_port(5201, MockRun::Fail("first".into()))
            .iperf3_port(5202, MockRun::Empty)
            .iperf3_port(5203, MockRun::Fail("last".into())),
    );
    let report = h
        .campaign(config(SpeedTool::Iperf3))
        .run(&CampaignOptions {
            udp: true,
            ..CampaignOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(statuses(&report), [OutcomeStatus::Error]);
    assert!(report.outcomes[0].error().unwrap().contains("last"));
    assert!(h
        .tester
        .calls()
        .iter()
        .all(|c| matches!(c, TesterCall::Iperf3 { udp: true, .. })));
}

#[tokio::test(start_paused = true)]
async fn empty_tool_output_is_test_failed_not_error() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new()
            .then_ookla(MockRun::Empty)
            .then_ookla(MockRun::Fail("Ookla speedtest failed: no servers".into())),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(
        statuses(&report),
        [
            OutcomeStatus::TestFailed,
            OutcomeStatus::Error,
            OutcomeStatus::Success
        ]
    );
    assert!(report.outcomes[1].error().unwrap().contains("no servers"));
}

#[tokio::test(start_paused = true)]
async fn unreachable_internet_skips_the_speed_test() {
    let h = Harness::with_probe(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
        MockProbe::new().then(false),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status(), OutcomeStatus::NoInternet);
    assert_eq!(h.tester.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn link_that_never_comes_up_is_a_connection_failure() {
    let h = Harness::new(
        MockNetworkManager::new().never_activate("Golden_A"),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status(), OutcomeStatus::ConnectionFailed);
    assert_eq!(report.outcomes[0].error(), Some("Connection timeout"));
    assert_eq!(report.successes(), 2);
}

#[tokio::test(start_paused = true)]
async fn candidates_run_strongest_first_and_respect_the_limit() {
    let scan = [
        block("00:00:00:00:00:0c", "Golden_C", 5500, -60.0),
        block("00:00:00:00:00:0a", "Golden_A", 5180, -40.0),
        block("00:00:00:00:00:0b", "Golden_B", 2437, -50.0),
    ]
    .concat();
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&scan),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions {
            limit: Some(2),
            ..CampaignOptions::default()
        })
        .await
        .unwrap();

    let tested: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| o.network().ssid.as_str())
        .collect();
    assert_eq!(tested, ["Golden_A", "Golden_B"]);
    let connected: Vec<_> = h
        .network
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Connect { ssid, bssid } => Some((ssid, bssid)),
            _ => None,
        })
        .collect();
    assert_eq!(
        connected,
        [
            ("Golden_A".to_string(), Some("00:00:00:00:00:0a".to_string())),
            ("Golden_B".to_string(), Some("00:00:00:00:00:0b".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn results_are_saved_under_the_live_bssid() {
    let h = Harness::new(
        MockNetworkManager::new().associate_to("Golden_A", "00:00:00:00:00:aa"),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions {
            limit: Some(1),
            ..CampaignOptions::default()
        })
        .await
        .unwrap();

    let result = report.outcomes[0].result().unwrap();
    assert_eq!(result.bssid.as_deref(), Some("00:00:00:00:00:aa"));
    assert_eq!(result.ssid.as_deref(), Some("Golden_A"));

    // 扫描到的候选与测速结果都已写入
    let scanned = h.store.get("00:00:00:00:00:0a").await.unwrap();
    assert_eq!(scanned.signal_dbm, Some(-40.0));
    assert_eq!(scanned.download_mbps, None);
    let tested = h.store.get("00:00:00:00:00:aa").await.unwrap();
    assert_eq!(tested.download_mbps, Some(100.0));
    assert_eq!(h.store.all_records().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn auto_save_off_stores_nothing() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let mut cfg = config(SpeedTool::Ookla);
    cfg.auto_save = false;
    h.campaign(cfg)
        .run(&CampaignOptions::default())
        .await
        .unwrap();
    assert_eq!(h.store.len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn setup_errors_are_fatal_before_scanning() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new().without(SpeedTool::Ookla),
    );
    let err = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));

    let mut no_server = config(SpeedTool::Iperf3);
    no_server.iperf3.server = None;
    let err = h.campaign(no_server).run(&CampaignOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let mut no_prefix = config(SpeedTool::Iperf3);
    no_prefix.prefix = None;
    let err = h.campaign(no_prefix).run(&CampaignOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("prefix")));

    let mut no_password = config(SpeedTool::Iperf3);
    no_password.password.clear();
    let err = h.campaign(no_password).run(&CampaignOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(msg) if msg.contains("password")));

    assert_eq!(h.scanner.calls(), 0);
    assert!(h.network.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn option_prefix_overrides_config() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions {
            prefix: Some("Neigh".into()),
            ..CampaignOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(report.total(), 1);
    assert_eq!(report.outcomes[0].network().ssid, "Neighbour");
}

#[tokio::test(start_paused = true)]
async fn no_matching_networks_is_an_empty_report() {
    let h = Harness::new(
        MockNetworkManager::new().with_original_link(HOME_SSID, HOME_BSSID),
        MockScanner::returning(&block("00:00:00:00:00:99", "Neighbour", 2412, -30.0)),
        MockSpeedTester::new(),
    );
    let report = h
        .campaign(config(SpeedTool::Ookla))
        .run(&CampaignOptions::default())
        .await
        .unwrap();
    assert_eq!(report.total(), 0);
    assert_eq!(h.network.count(is_disconnect), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_scan_failures_are_retried() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::new()
            .then_err(Error::ScanFailed("No buffer space available (-105)".into()))
            .then_err(Error::ScanFailed("Device or resource busy".into()))
            .then_ok(&golden_scan()),
        MockSpeedTester::new(),
    );
    let networks = h.campaign(config(SpeedTool::Ookla)).scan_networks().await.unwrap();
    assert_eq!(networks.len(), 4);
    assert_eq!(h.scanner.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn scan_gives_up_after_two_retries() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::new()
            .then_err(Error::ScanFailed("busy".into()))
            .then_err(Error::ScanFailed("busy".into()))
            .then_err(Error::ScanFailed("still busy".into()))
            .then_ok(&golden_scan()),
        MockSpeedTester::new(),
    );
    let err = h.campaign(config(SpeedTool::Ookla)).scan_networks().await.unwrap_err();
    assert!(matches!(err, Error::ScanFailed(msg) if msg == "still busy"));
    assert_eq!(h.scanner.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn missing_scan_tool_is_not_retried() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::new().then_err(Error::ToolNotFound("iw".into())),
        MockSpeedTester::new(),
    );
    let err = h.campaign(config(SpeedTool::Ookla)).scan_networks().await.unwrap_err();
    assert!(matches!(err, Error::ToolNotFound(_)));
    assert_eq!(h.scanner.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn survey_filters_and_saves() {
    let h = Harness::new(
        MockNetworkManager::new(),
        MockScanner::returning(&golden_scan()),
        MockSpeedTester::new(),
    );
    let networks = h
        .campaign(config(SpeedTool::Ookla))
        .survey(Some("Golden_"), None, true)
        .await
        .unwrap();
    assert_eq!(networks.len(), 3);
    assert_eq!(h.store.len().await, 3);
    assert!(h.network.calls().is_empty());
}
