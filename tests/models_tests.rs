// Model serialization and visibility tests (JSON camelCase, adapter filter)

use netfluss::models::*;
use std::collections::HashSet;

fn adapter(id: &str, kind: AdapterType, is_up: bool, rx: f64) -> AdapterStatus {
    AdapterStatus {
        id: id.into(),
        display_name: id.into(),
        kind,
        is_up,
        link_speed_bps: None,
        wifi_mode: None,
        wifi_tx_rate_mbps: None,
        wifi_ssid: None,
        rx_bytes: 0,
        tx_bytes: 0,
        rx_rate_bps: rx,
        tx_rate_bps: 0.0,
    }
}

fn snapshot(adapters: Vec<AdapterStatus>) -> NetworkSnapshot {
    NetworkSnapshot {
        timestamp: 42,
        tick: 3,
        totals: RateTotals::sum(&adapters),
        adapters,
        top_apps: TopApps::default(),
        ips: IpAddresses::default(),
        reconnecting: vec![],
    }
}

#[test]
fn test_adapter_status_serialization_camel_case() {
    let mut a = adapter("en0", AdapterType::Wireless, true, 1500.0);
    a.wifi_ssid = Some("Home".into());
    let json = serde_json::to_string(&a).unwrap();
    assert!(json.contains("\"type\":\"wireless\""));
    assert!(json.contains("\"rxRateBps\":1500.0"));
    assert!(json.contains("\"displayName\""));
    assert!(json.contains("\"wifiSsid\":\"Home\""));
    let back: AdapterStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(back, a);
}

#[test]
fn test_unknown_adapter_type_deserializes_as_other() {
    let kind: AdapterType = serde_json::from_str("\"bluetooth\"").unwrap();
    assert_eq!(kind, AdapterType::Other);
}

#[test]
fn test_top_apps_tagged_serialization() {
    let disabled = serde_json::to_value(TopApps::Disabled).unwrap();
    assert_eq!(disabled, serde_json::json!({ "state": "disabled" }));

    let ready = TopApps::Ready(vec![AppTraffic {
        name: "Safari".into(),
        rx_rate_bps: 10.0,
        tx_rate_bps: 2.0,
    }]);
    let json = serde_json::to_value(&ready).unwrap();
    assert_eq!(json["state"], "ready");
    assert_eq!(json["data"][0]["name"], "Safari");
    assert_eq!(json["data"][0]["rxRateBps"], 10.0);

    let unavailable = serde_json::to_value(TopApps::Unavailable("denied".into())).unwrap();
    assert_eq!(unavailable, serde_json::json!({ "state": "unavailable", "data": "denied" }));
}

#[test]
fn test_ip_addresses_default_to_placeholder() {
    let ips = IpAddresses::default();
    assert_eq!(ips.internal, UNAVAILABLE);
    assert_eq!(ips.gateway, UNAVAILABLE);
    assert_eq!(ips.external, UNAVAILABLE);
}

#[test]
fn test_network_snapshot_json_roundtrip() {
    let snap = snapshot(vec![adapter("en0", AdapterType::Wired, true, 5.0)]);
    let json = serde_json::to_string(&snap).unwrap();
    assert!(json.contains("\"topApps\""));
    let back: NetworkSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snap);
}

#[test]
fn test_adapter_filter_rules() {
    let filter = AdapterFilter {
        show_inactive: false,
        show_other: false,
        hidden: HashSet::from(["en7".to_string()]),
    };
    assert!(filter.allows(&adapter("en0", AdapterType::Wireless, true, 0.0)));
    assert!(!filter.allows(&adapter("utun3", AdapterType::Other, true, 100.0)));
    assert!(!filter.allows(&adapter("en5", AdapterType::Wired, false, 0.0)));
    assert!(filter.allows(&adapter("en5", AdapterType::Wired, false, 10.0)));
    assert!(!filter.allows(&adapter("en7", AdapterType::Wired, true, 10.0)));

    let everything = AdapterFilter {
        show_inactive: true,
        show_other: true,
        hidden: HashSet::new(),
    };
    assert!(everything.allows(&adapter("utun3", AdapterType::Other, false, 0.0)));
}

#[test]
fn test_display_totals_all_or_visible() {
    let snap = snapshot(vec![
        adapter("en0", AdapterType::Wireless, true, 100.0),
        adapter("utun3", AdapterType::Other, true, 50.0),
    ]);
    let filter = AdapterFilter::default();
    assert_eq!(snap.display_totals(&filter, false).rx_rate_bps, 150.0);
    assert_eq!(snap.display_totals(&filter, true).rx_rate_bps, 100.0);
    assert_eq!(snap.visible_adapters(&filter).count(), 1);
}

#[test]
fn test_process_byte_snapshot_sums_by_name() {
    let mut s = ProcessByteSnapshot::new();
    s.add("Safari", 10, 1);
    s.add("Safari", 5, 2);
    s.add("curl", 1, 1);
    assert_eq!(s.len(), 2);
    assert_eq!(s.get("Safari"), Some(ProcessBytes { rx: 15, tx: 3 }));
}
