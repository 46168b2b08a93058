// Per-process traffic: netstat connection counters grouped by process.

mod names;
mod schema;

pub use schema::ColumnIndices;

use crate::command::{self, CommandError};
use crate::models::{AppTraffic, ProcessByteSnapshot};
use crate::rate::rate;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrafficError {
    #[error("no connection table in netstat output (access possibly restricted)")]
    HeaderNotFound,
    #[error("netstat output has no `{0}` column")]
    MissingColumn(&'static str),
    #[error("no connection data (access possibly restricted)")]
    NoRows,
    #[error("netstat failed: {0}")]
    Command(String),
}

impl From<CommandError> for TrafficError {
    fn from(e: CommandError) -> Self {
        Self::Command(e.to_string())
    }
}

/// Source of cumulative per-process byte snapshots.
pub trait TrafficSource: Send + Sync + 'static {
    fn sample(&self) -> impl Future<Output = Result<ProcessByteSnapshot, TrafficError>> + Send;
}

/// Ranked per-process rates between two snapshots, top `limit` by rx+tx.
///
/// A process missing from `previous` is cold-started at 0, and a shrinking
/// total (connections closed) counts as no traffic. Silent processes are dropped.
pub fn rates(
    current: &ProcessByteSnapshot,
    previous: &ProcessByteSnapshot,
    elapsed_secs: f64,
    limit: usize,
) -> Vec<AppTraffic> {
    let mut apps: Vec<AppTraffic> = current
        .iter()
        .filter_map(|(name, curr)| {
            let prev = previous.get(name);
            let rx_rate_bps = rate(curr.rx, prev.map(|p| p.rx), elapsed_secs);
            let tx_rate_bps = rate(curr.tx, prev.map(|p| p.tx), elapsed_secs);
            (rx_rate_bps > 0.0 || tx_rate_bps > 0.0).then(|| AppTraffic {
                name: name.to_string(),
                rx_rate_bps,
                tx_rate_bps,
            })
        })
        .collect();
    apps.sort_by(|a, b| b.total_bps().total_cmp(&a.total_bps()));
    apps.truncate(limit);
    apps
}

/// Samples `netstat -n -b -v` (or a configured equivalent).
pub struct NetstatSource {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    namer: Arc<names::ProcessNamer>,
}

impl NetstatSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            namer: Arc::new(names::ProcessNamer::new()),
        }
    }
}

impl TrafficSource for NetstatSource {
    #[instrument(skip(self), fields(repo = "traffic", operation = "sample"))]
    async fn sample(&self) -> Result<ProcessByteSnapshot, TrafficError> {
        let output = command::run_capture(&self.program, &self.args, self.timeout).await?;
        let per_pid = schema::parse_netstat(&output)?;

        let namer = self.namer.clone();
        tokio::task::spawn_blocking(move || {
            let pids: Vec<u32> = per_pid.keys().copied().collect();
            let names = namer.resolve(&pids);
            let mut snapshot = ProcessByteSnapshot::new();
            for (pid, bytes) in per_pid {
                let name = names
                    .get(&pid)
                    .cloned()
                    .unwrap_or_else(|| format!("PID {pid}"));
                snapshot.add(name, bytes.rx, bytes.tx);
            }
            tracing::debug!(processes = snapshot.len(), "process traffic sampled");
            snapshot
        })
        .await
        .map_err(|e| TrafficError::Command(format!("process name task join: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, u64, u64)]) -> ProcessByteSnapshot {
        let mut s = ProcessByteSnapshot::new();
        for (name, rx, tx) in entries {
            s.add(*name, *rx, *tx);
        }
        s
    }

    #[test]
    fn ranks_by_combined_rate_and_truncates() {
        let previous = snapshot(&[("A", 0, 0), ("B", 0, 0)]);
        let current = snapshot(&[("A", 1000, 0), ("B", 500, 0)]);
        let top = rates(&current, &previous, 1.0, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "A");
        assert_eq!(top[0].rx_rate_bps, 1000.0);

        let both = rates(&current, &previous, 1.0, 10);
        assert_eq!(
            both.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
    }

    #[test]
    fn new_process_is_cold_started() {
        let previous = snapshot(&[("A", 100, 100)]);
        let current = snapshot(&[("A", 300, 100), ("New", 1_000_000, 1_000_000)]);
        let top = rates(&current, &previous, 2.0, 5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "A");
        assert_eq!(top[0].rx_rate_bps, 100.0);
        assert_eq!(top[0].tx_rate_bps, 0.0);
    }

    #[test]
    fn shrinking_totals_count_as_idle() {
        let previous = snapshot(&[("A", 5_000, 5_000)]);
        let current = snapshot(&[("A", 10, 10)]);
        assert!(rates(&current, &previous, 1.0, 5).is_empty());
    }

    #[test]
    fn snapshot_sums_shared_names() {
        let s = snapshot(&[("Chrome", 10, 1), ("Chrome", 5, 2)]);
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("Chrome").map(|b| (b.rx, b.tx)), Some((15, 3)));
    }

    #[test]
    fn command_errors_map_to_traffic_errors() {
        let err: TrafficError = CommandError::Timeout {
            program: "netstat".into(),
            secs: 10,
        }
        .into();
        assert!(matches!(err, TrafficError::Command(m) if m.contains("timed out")));
    }
}
