// Linux-specific helpers: sysfs classification, link speed, `iw` link parsing.

use crate::models::{AdapterType, InterfaceMetadata, WifiInfo};
use std::collections::HashMap;
use std::path::Path;

pub(super) const SYS_CLASS_NET: &str = "/sys/class/net";

/// ARPHRD_ETHER from `/sys/class/net/<if>/type`.
const ARPHRD_ETHER: &str = "1";

/// Read network interface link speed from `<root>/<interface>/speed`.
/// Returns bits per second, or 0 if unavailable (virtual links report -1).
pub(super) fn link_speed_bps(root: &Path, interface: &str) -> u64 {
    if let Ok(content) = std::fs::read_to_string(root.join(interface).join("speed"))
        && let Ok(mbps) = content.trim().parse::<i64>()
        && mbps > 0
    {
        return (mbps as u64) * 1_000_000;
    }
    0
}

/// Wireless if the kernel exposes 802.11 state for it; wired if it is an
/// Ethernet-type link backed by a device; anything else (bridges, tunnels,
/// veths, loopback) is "other".
pub(super) fn classify(root: &Path, interface: &str) -> AdapterType {
    let base = root.join(interface);
    if base.join("wireless").exists() || base.join("phy80211").exists() {
        return AdapterType::Wireless;
    }
    let is_ether = std::fs::read_to_string(base.join("type"))
        .map(|t| t.trim() == ARPHRD_ETHER)
        .unwrap_or(false);
    if is_ether && base.join("device").exists() {
        AdapterType::Wired
    } else {
        AdapterType::Other
    }
}

pub(super) fn display_name(kind: AdapterType, interface: &str) -> String {
    match kind {
        AdapterType::Wireless => format!("Wi-Fi ({interface})"),
        AdapterType::Wired => format!("Ethernet ({interface})"),
        AdapterType::Other => interface.to_string(),
    }
}

pub(super) fn interface_info(root: &Path) -> HashMap<String, InterfaceMetadata> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return HashMap::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .map(|name| {
            let kind = classify(root, &name);
            let meta = InterfaceMetadata {
                kind,
                display_name: display_name(kind, &name),
            };
            (name, meta)
        })
        .collect()
}

/// Band label from a channel centre frequency in MHz.
pub(crate) fn band_label(freq_mhz: Option<f64>) -> &'static str {
    match freq_mhz {
        Some(f) if f >= 5925.0 => "Wi-Fi (6 GHz)",
        Some(f) if f >= 4900.0 => "Wi-Fi (5 GHz)",
        Some(f) if (2400.0..2500.0).contains(&f) => "Wi-Fi (2.4 GHz)",
        _ => "Wi-Fi",
    }
}

/// Parse `iw dev <if> link` output. A disconnected radio still yields an entry
/// with the generic band label, zero rate and no SSID.
pub(super) fn parse_iw_link(output: &str) -> WifiInfo {
    let mut freq = None;
    let mut tx_rate = 0.0;
    let mut ssid = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("SSID:") {
            let v = v.trim();
            if !v.is_empty() {
                ssid = Some(v.to_string());
            }
        } else if let Some(v) = line.strip_prefix("freq:") {
            freq = v.split_whitespace().next().and_then(|f| f.parse::<f64>().ok());
        } else if let Some(v) = line.strip_prefix("tx bitrate:") {
            tx_rate = v
                .split_whitespace()
                .next()
                .and_then(|r| r.parse::<f64>().ok())
                .unwrap_or(0.0);
        }
    }
    WifiInfo {
        mode: band_label(freq).to_string(),
        tx_rate_mbps: tx_rate,
        ssid,
    }
}
