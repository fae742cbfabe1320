#![allow(dead_code)]

use std::sync::Arc;
use wifitest_core::backends::mock::{MockNetworkManager, MockProbe, MockScanner, MockSpeedTester};
use wifitest_core::campaign::{Campaign, Collaborators};
use wifitest_core::config::{CampaignConfig, Iperf3Settings};
use wifitest_core::storage::MemoryStore;
use wifitest_core::structs::SpeedTool;

pub const HOME_SSID: &str = "Home";
pub const HOME_BSSID: &str = "f0:f0:f0:f0:f0:f0";

/// One `iw dev <if> scan` station block.
pub fn block(bssid: &str, ssid: &str, freq: u32, signal: f64) -> String {
    format!(
        "BSS {bssid}(on wlan0)\n\tfreq: {freq}\n\tsignal: {signal:.2} dBm\n\tSSID: {ssid}\n\tRSN:\t * Version: 1\n"
    )
}

/// The three-network scan most tests use, strongest first.
pub fn golden_scan() -> String {
    [
        block("00:00:00:00:00:0a", "Golden_A", 5180, -40.0),
        block("00:00:00:00:00:0b", "Golden_B", 2437, -50.0),
        block("00:00:00:00:00:0c", "Golden_C", 5500, -60.0),
        block("00:00:00:00:00:99", "Neighbour", 2412, -30.0),
    ]
    .concat()
}

pub fn config(tool: SpeedTool) -> CampaignConfig {
    CampaignConfig {
        interface: "wlan0".into(),
        tool,
        prefix: Some("Golden_".into()),
        password: "secret".into(),
        iperf3: Iperf3Settings {
            server: Some("10.0.0.5".into()),
            ports: "5201-5203".parse().unwrap(),
            ..Iperf3Settings::default()
        },
        ..CampaignConfig::default()
    }
}

pub struct Harness {
    pub network: Arc<MockNetworkManager>,
    pub scanner: Arc<MockScanner>,
    pub tester: Arc<MockSpeedTester>,
    pub probe: Arc<MockProbe>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(network: MockNetworkManager, scanner: MockScanner, tester: MockSpeedTester) -> Self {
        Self::with_probe(network, scanner, tester, MockProbe::new())
    }

    pub fn with_probe(
        network: MockNetworkManager,
        scanner: MockScanner,
        tester: MockSpeedTester,
        probe: MockProbe,
    ) -> Self {
        Self {
            network: Arc::new(network),
            scanner: Arc::new(scanner),
            tester: Arc::new(tester),
            probe: Arc::new(probe),
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn campaign(&self, config: CampaignConfig) -> Campaign {
        Campaign::new(
            config,
            Collaborators {
                network: self.network.clone(),
                scanner: self.scanner.clone(),
                tester: self.tester.clone(),
                probe: self.probe.clone(),
                store: Some(self.store.clone()),
            },
        )
    }
}
