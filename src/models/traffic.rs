// Per-process traffic models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One process's estimated current throughput (bytes/s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppTraffic {
    pub name: String,
    pub rx_rate_bps: f64,
    pub tx_rate_bps: f64,
}

impl AppTraffic {
    pub fn total_bps(&self) -> f64 {
        self.rx_rate_bps + self.tx_rate_bps
    }
}

/// Cumulative byte totals for one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessBytes {
    pub rx: u64,
    pub tx: u64,
}

/// Point-in-time mapping from process name to cumulative bytes. Only the
/// traffic sampler and the monitor look inside; everyone else sees [`AppTraffic`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessByteSnapshot {
    totals: HashMap<String, ProcessBytes>,
}

impl ProcessByteSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the running totals for `name` (several PIDs can share one name).
    pub fn add(&mut self, name: impl Into<String>, rx: u64, tx: u64) {
        let entry = self.totals.entry(name.into()).or_default();
        entry.rx = entry.rx.saturating_add(rx);
        entry.tx = entry.tx.saturating_add(tx);
    }

    pub fn get(&self, name: &str) -> Option<ProcessBytes> {
        self.totals.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ProcessBytes)> {
        self.totals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

/// Published state of the per-process traffic side channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "camelCase")]
pub enum TopApps {
    #[default]
    Disabled,
    /// Enabled, but fewer than two samples taken so far.
    Pending,
    Ready(Vec<AppTraffic>),
    /// Sampling failed; human-readable reason for the user.
    Unavailable(String),
}
