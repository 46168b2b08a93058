// Network adapter models: raw counter samples, classification, per-tick status

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// POSIX `IFF_UP` (same value on Linux and the BSDs).
pub const IFF_UP: u32 = 0x1;

/// Adapter classification; serializes to lowercase JSON (e.g. "wireless").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    Wireless,
    Wired,
    #[default]
    #[serde(other)]
    Other,
}

/// One reading of an interface's raw counters. Produced fresh every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSample {
    pub id: String,
    pub flags: u32,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    /// Negotiated link rate in bits/s, 0 if unknown.
    pub link_rate_bps: u64,
}

impl InterfaceSample {
    pub fn is_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceMetadata {
    pub kind: AdapterType,
    pub display_name: String,
}

/// Wireless-only attributes, keyed by interface id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiInfo {
    /// Band label, e.g. "Wi-Fi (5 GHz)", or plain "Wi-Fi" when the channel is unknown.
    pub mode: String,
    pub tx_rate_mbps: f64,
    pub ssid: Option<String>,
}

/// Per-tick view of one adapter. Rates are bytes/s and never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: AdapterType,
    pub is_up: bool,
    pub link_speed_bps: Option<u64>,
    pub wifi_mode: Option<String>,
    pub wifi_tx_rate_mbps: Option<f64>,
    pub wifi_ssid: Option<String>,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_rate_bps: f64,
    pub tx_rate_bps: f64,
}

impl AdapterStatus {
    pub fn is_idle(&self) -> bool {
        self.rx_rate_bps == 0.0 && self.tx_rate_bps == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTotals {
    pub rx_rate_bps: f64,
    pub tx_rate_bps: f64,
}

impl RateTotals {
    pub fn sum<'a>(adapters: impl IntoIterator<Item = &'a AdapterStatus>) -> Self {
        adapters
            .into_iter()
            .fold(Self::default(), |acc, a| Self {
                rx_rate_bps: acc.rx_rate_bps + a.rx_rate_bps,
                tx_rate_bps: acc.tx_rate_bps + a.tx_rate_bps,
            })
    }
}

/// Which adapters a presentation surface shows.
#[derive(Debug, Clone, Default)]
pub struct AdapterFilter {
    pub show_inactive: bool,
    pub show_other: bool,
    pub hidden: HashSet<String>,
}

impl AdapterFilter {
    pub fn allows(&self, adapter: &AdapterStatus) -> bool {
        if !self.show_other && adapter.kind == AdapterType::Other {
            return false;
        }
        // Inactive = down and silent; an up adapter with no traffic still shows.
        if !self.show_inactive && !adapter.is_up && adapter.is_idle() {
            return false;
        }
        !self.hidden.contains(&adapter.id)
    }
}
