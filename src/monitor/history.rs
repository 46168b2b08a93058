// Previous-sample bookkeeping and per-tick adapter synthesis.

use crate::models::{AdapterStatus, AdapterType, InterfaceMetadata, InterfaceSample, WifiInfo};
use crate::rate::rate;
use std::collections::HashMap;
use tokio::time::Instant;

/// Last sample per interface id plus the time of the tick that took them.
/// Owned by the monitor task alone; ticks are serialized, so no locking.
#[derive(Debug, Default)]
pub struct SampleHistory {
    last: HashMap<String, InterfaceSample>,
    last_tick: Option<Instant>,
}

impl SampleHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds this tick's adapter list and replaces the stored samples with
    /// `samples`. Interfaces that vanished are forgotten; new ones start at rate 0.
    pub fn advance(
        &mut self,
        now: Instant,
        samples: Vec<InterfaceSample>,
        info: &HashMap<String, InterfaceMetadata>,
        wifi: &HashMap<String, WifiInfo>,
    ) -> Vec<AdapterStatus> {
        let delta_secs = self
            .last_tick
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .unwrap_or(0.0);

        let mut adapters: Vec<AdapterStatus> = samples
            .iter()
            .map(|sample| {
                let previous = self.last.get(&sample.id);
                let meta = info.get(&sample.id);
                let kind = meta.map(|m| m.kind).unwrap_or_default();
                let wifi = wifi.get(&sample.id);
                AdapterStatus {
                    id: sample.id.clone(),
                    display_name: meta
                        .map(|m| m.display_name.clone())
                        .unwrap_or_else(|| sample.id.clone()),
                    kind,
                    is_up: sample.is_up(),
                    link_speed_bps: (kind == AdapterType::Wired && sample.link_rate_bps > 0)
                        .then_some(sample.link_rate_bps),
                    wifi_mode: wifi.map(|w| w.mode.clone()),
                    wifi_tx_rate_mbps: wifi.map(|w| w.tx_rate_mbps),
                    wifi_ssid: wifi.and_then(|w| w.ssid.clone()),
                    rx_bytes: sample.rx_bytes,
                    tx_bytes: sample.tx_bytes,
                    rx_rate_bps: rate(sample.rx_bytes, previous.map(|p| p.rx_bytes), delta_secs),
                    tx_rate_bps: rate(sample.tx_bytes, previous.map(|p| p.tx_bytes), delta_secs),
                }
            })
            .collect();
        adapters.sort_by_cached_key(|a| (a.display_name.to_lowercase(), a.id.clone()));

        self.last = samples.into_iter().map(|s| (s.id.clone(), s)).collect();
        self.last_tick = Some(now);
        adapters
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IFF_UP;
    use tokio::time::Duration;

    fn sample(id: &str, rx: u64, tx: u64) -> InterfaceSample {
        InterfaceSample {
            id: id.into(),
            flags: IFF_UP,
            rx_bytes: rx,
            tx_bytes: tx,
            link_rate_bps: 0,
        }
    }

    fn meta(kind: AdapterType, name: &str) -> InterfaceMetadata {
        InterfaceMetadata {
            kind,
            display_name: name.into(),
        }
    }

    #[test]
    fn first_tick_is_cold_start() {
        let mut h = SampleHistory::new();
        let out = h.advance(
            Instant::now(),
            vec![sample("en0", 9_999_999, 42)],
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(out[0].rx_rate_bps, 0.0);
        assert_eq!(out[0].tx_rate_bps, 0.0);
        assert_eq!(out[0].rx_bytes, 9_999_999);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn rates_use_previous_sample_of_same_id() {
        let t0 = Instant::now();
        let mut h = SampleHistory::new();
        h.advance(t0, vec![sample("en0", 0, 0), sample("en1", 500, 0)], &HashMap::new(), &HashMap::new());
        let out = h.advance(
            t0 + Duration::from_secs(2),
            vec![sample("en0", 250_000, 1_000), sample("en1", 100, 0)],
            &HashMap::new(),
            &HashMap::new(),
        );
        let en0 = out.iter().find(|a| a.id == "en0").unwrap();
        let en1 = out.iter().find(|a| a.id == "en1").unwrap();
        assert_eq!(en0.rx_rate_bps, 125_000.0);
        assert_eq!(en0.tx_rate_bps, 500.0);
        assert_eq!(en1.rx_rate_bps, 0.0, "counter reset reads as idle");
    }

    #[test]
    fn metadata_and_sorting() {
        let mut info = HashMap::new();
        info.insert("en0".to_string(), meta(AdapterType::Wireless, "wi-fi"));
        info.insert("en5".to_string(), meta(AdapterType::Wired, "Ethernet"));
        let mut wifi = HashMap::new();
        wifi.insert(
            "en0".to_string(),
            WifiInfo {
                mode: "Wi-Fi (5 GHz)".into(),
                tx_rate_mbps: 866.0,
                ssid: Some("Home".into()),
            },
        );
        let mut wired = sample("en5", 0, 0);
        wired.link_rate_bps = 1_000_000_000;
        let mut down = sample("utun2", 0, 0);
        down.flags = 0;

        let out = SampleHistory::new().advance(
            Instant::now(),
            vec![sample("en0", 0, 0), wired, down],
            &info,
            &wifi,
        );
        let names: Vec<&str> = out.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["Ethernet", "utun2", "wi-fi"]);

        assert_eq!(out[0].kind, AdapterType::Wired);
        assert_eq!(out[0].link_speed_bps, Some(1_000_000_000));
        assert_eq!(out[1].kind, AdapterType::Other);
        assert!(!out[1].is_up);
        assert_eq!(out[1].link_speed_bps, None);
        assert_eq!(out[2].wifi_ssid.as_deref(), Some("Home"));
        assert_eq!(out[2].wifi_tx_rate_mbps, Some(866.0));
    }
}
