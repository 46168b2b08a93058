// Poll loop: one task owns all sampling state. Ticks, side-channel completions
// and commands are serialized through a single select loop; the latest
// snapshot is published on a watch channel and broadcast for streaming clients.

mod history;

pub use history::SampleHistory;

use crate::config::AppConfig;
use crate::interface_repo::InterfaceSource;
use crate::ip_repo::{IpSource, LocalAddresses};
use crate::models::{
    AdapterStatus, AdapterType, IpAddresses, NetworkSnapshot, ProcessByteSnapshot, RateTotals,
    TopApps, UNAVAILABLE,
};
use crate::reconnect::{AdapterControl, is_valid_adapter_id};
use crate::side_channel::SideChannel;
use crate::traffic_repo::{self, TrafficError, TrafficSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval};
use tracing::Instrument;

pub const MIN_INTERVAL_SECS: f64 = 0.2;
pub const MAX_INTERVAL_SECS: f64 = 10.0;
const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Process samples closer together than this are not turned into rates.
const MIN_PROCESS_ELAPSED_SECS: f64 = 0.1;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Rate limit for "no receivers" logging (avoid logging every tick when no one is on /ws/snapshot)
const NO_RECEIVERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(300);

/// Clamps a requested poll interval to [0.2, 10] seconds. Non-finite input
/// falls back to one second.
pub fn clamp_interval(secs: f64) -> Duration {
    let secs = if secs.is_finite() {
        secs
    } else {
        DEFAULT_INTERVAL_SECS
    };
    Duration::from_secs_f64(secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS))
}

/// Why a reconnect request did not start a power-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReconnectRejected {
    #[error("adapter id must be alphanumeric")]
    InvalidId,
    #[error("no such adapter")]
    UnknownAdapter,
    #[error("adapter type cannot be reconnected")]
    NotReconnectable,
    #[error("adapter is already reconnecting")]
    InProgress,
}

/// Requests accepted by the running monitor.
#[derive(Debug)]
pub enum MonitorCommand {
    Start {
        interval_secs: f64,
    },
    ConfigureProcessTraffic {
        enabled: bool,
        limit: usize,
    },
    Reconnect {
        id: String,
        reply: oneshot::Sender<Result<(), ReconnectRejected>>,
    },
}

/// Results of side-channel work, delivered back to the monitor task.
#[derive(Debug)]
pub enum Completion {
    ProcessSample {
        started_at: Instant,
        result: Result<ProcessByteSnapshot, TrafficError>,
    },
    LocalAddresses(LocalAddresses),
    ExternalIp(Option<String>),
    Reconnected(String),
}

/// Sources the monitor samples from.
pub struct MonitorDeps<S, P, I, C> {
    pub interfaces: Arc<S>,
    pub traffic: Arc<P>,
    pub ips: Arc<I>,
    pub control: Arc<C>,
    pub ws_connections: Arc<AtomicUsize>,
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub process_traffic_enabled: bool,
    pub process_limit: usize,
    pub process_min_interval: Duration,
    pub local_ip_interval: Duration,
    pub external_ip_enabled: bool,
    pub external_ip_interval: Duration,
    pub broadcast_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            process_traffic_enabled: false,
            process_limit: 5,
            process_min_interval: Duration::from_secs(2),
            local_ip_interval: Duration::from_secs(5),
            external_ip_enabled: true,
            external_ip_interval: Duration::from_secs(60),
            broadcast_capacity: 16,
        }
    }
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            process_traffic_enabled: config.process_traffic.enabled,
            process_limit: config.process_traffic.limit,
            process_min_interval: Duration::from_secs_f64(config.process_traffic.min_interval_secs),
            local_ip_interval: Duration::from_secs_f64(config.ip_lookup.local_interval_secs),
            external_ip_enabled: config.ip_lookup.external_enabled,
            external_ip_interval: Duration::from_secs_f64(config.ip_lookup.external_interval_secs),
            broadcast_capacity: config.monitoring.broadcast_capacity,
        }
    }
}

/// Cloneable front door to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    snapshots: broadcast::Sender<NetworkSnapshot>,
    latest: watch::Receiver<Option<NetworkSnapshot>>,
}

impl MonitorHandle {
    async fn send(&self, command: MonitorCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("monitor task is not running"))
    }

    /// Starts polling, or changes the interval of a running loop.
    pub async fn start(&self, interval_secs: f64) -> anyhow::Result<()> {
        self.send(MonitorCommand::Start { interval_secs }).await
    }

    pub async fn configure_process_traffic(&self, enabled: bool, limit: usize) -> anyhow::Result<()> {
        self.send(MonitorCommand::ConfigureProcessTraffic { enabled, limit })
            .await
    }

    /// Asks the monitor to power-cycle an adapter and waits for its verdict.
    pub async fn reconnect(
        &self,
        id: impl Into<String>,
    ) -> anyhow::Result<Result<(), ReconnectRejected>> {
        let (reply, verdict) = oneshot::channel();
        self.send(MonitorCommand::Reconnect {
            id: id.into(),
            reply,
        })
        .await?;
        verdict
            .await
            .map_err(|_| anyhow::anyhow!("monitor task is not running"))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkSnapshot> {
        self.snapshots.subscribe()
    }

    /// Most recent snapshot, or None before the first tick.
    pub fn latest(&self) -> Option<NetworkSnapshot> {
        self.latest.borrow().clone()
    }

    /// Waits until a snapshot newer than the last one seen by this handle is published.
    pub async fn changed(&mut self) -> anyhow::Result<()> {
        self.latest.changed().await?;
        Ok(())
    }
}

struct Schedule {
    period: Duration,
    ticker: Interval,
}

/// State of the per-process traffic side channel.
struct ProcessChannel {
    gate: SideChannel,
    enabled: bool,
    limit: usize,
    previous: ProcessByteSnapshot,
    previous_at: Option<Instant>,
    top_apps: TopApps,
}

impl ProcessChannel {
    fn new(settings: &MonitorSettings) -> Self {
        Self {
            gate: SideChannel::new(settings.process_min_interval),
            enabled: settings.process_traffic_enabled,
            limit: settings.process_limit.max(1),
            previous: ProcessByteSnapshot::new(),
            previous_at: None,
            top_apps: if settings.process_traffic_enabled {
                TopApps::Pending
            } else {
                TopApps::Disabled
            },
        }
    }

    fn forget_samples(&mut self) {
        self.previous = ProcessByteSnapshot::new();
        self.previous_at = None;
    }

    fn merge(&mut self, started_at: Instant, result: Result<ProcessByteSnapshot, TrafficError>) {
        if !self.enabled {
            return;
        }
        match result {
            Ok(snapshot) => {
                let elapsed = self
                    .previous_at
                    .map(|t| started_at.saturating_duration_since(t).as_secs_f64());
                match elapsed {
                    Some(elapsed)
                        if !self.previous.is_empty() && elapsed >= MIN_PROCESS_ELAPSED_SECS =>
                    {
                        let apps =
                            traffic_repo::rates(&snapshot, &self.previous, elapsed, self.limit);
                        self.top_apps = TopApps::Ready(apps);
                    }
                    _ => {
                        if matches!(self.top_apps, TopApps::Unavailable(_)) {
                            self.top_apps = TopApps::Pending;
                        }
                    }
                }
                self.previous = snapshot;
                self.previous_at = Some(started_at);
            }
            Err(e) => {
                let reason = e.to_string();
                if self.top_apps != TopApps::Unavailable(reason.clone()) {
                    tracing::warn!(error = %e, operation = "process_traffic", "process traffic unavailable");
                }
                self.top_apps = TopApps::Unavailable(reason);
                self.forget_samples();
            }
        }
    }
}

pub struct Monitor<S, P, I, C> {
    deps: MonitorDeps<S, P, I, C>,
    settings: MonitorSettings,
    schedule: Option<Schedule>,
    history: SampleHistory,
    adapters: Vec<AdapterStatus>,
    totals: RateTotals,
    ticks: u64,
    process: ProcessChannel,
    local_ip: SideChannel,
    external_ip: SideChannel,
    ips: IpAddresses,
    reconnecting: BTreeSet<String>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    commands_rx: mpsc::Receiver<MonitorCommand>,
    snapshots: broadcast::Sender<NetworkSnapshot>,
    latest: watch::Sender<Option<NetworkSnapshot>>,
    last_no_receivers_log: Option<Instant>,
}

impl<S, P, I, C> Monitor<S, P, I, C>
where
    S: InterfaceSource,
    P: TrafficSource,
    I: IpSource,
    C: AdapterControl,
{
    pub fn new(deps: MonitorDeps<S, P, I, C>, settings: MonitorSettings) -> (Self, MonitorHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshots, _) = broadcast::channel(settings.broadcast_capacity.max(1));
        let (latest, latest_rx) = watch::channel(None);

        let handle = MonitorHandle {
            commands: commands_tx,
            snapshots: snapshots.clone(),
            latest: latest_rx,
        };
        let monitor = Self {
            process: ProcessChannel::new(&settings),
            local_ip: SideChannel::new(settings.local_ip_interval),
            external_ip: SideChannel::new(settings.external_ip_interval),
            deps,
            settings,
            schedule: None,
            history: SampleHistory::new(),
            adapters: Vec::new(),
            totals: RateTotals::default(),
            ticks: 0,
            ips: IpAddresses::default(),
            reconnecting: BTreeSet::new(),
            completion_tx,
            completion_rx,
            commands_rx,
            snapshots,
            latest,
            last_no_receivers_log: None,
        };
        (monitor, handle)
    }

    /// Schedules ticks every `interval_secs` (clamped). Returns false when the
    /// loop already runs at that interval, in which case nothing changes.
    /// The first tick of a new schedule fires immediately.
    pub fn start(&mut self, interval_secs: f64) -> bool {
        let period = clamp_interval(interval_secs);
        if self.schedule.as_ref().is_some_and(|s| s.period == period) {
            return false;
        }
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.schedule = Some(Schedule { period, ticker });
        tracing::info!(interval_ms = period.as_millis() as u64, "poll loop scheduled");
        true
    }

    pub fn interval(&self) -> Option<Duration> {
        self.schedule.as_ref().map(|s| s.period)
    }

    pub fn is_running(&self) -> bool {
        self.schedule.is_some()
    }

    /// One poll: sample counters and metadata, compute rates, publish, then
    /// kick off whichever side channels are due.
    pub async fn tick(&mut self) {
        let now = Instant::now();
        let interfaces = &self.deps.interfaces;
        let metadata = async {
            let info = interfaces.interface_info().await;
            let wireless: Vec<String> = info
                .iter()
                .filter(|(_, meta)| meta.kind == AdapterType::Wireless)
                .map(|(id, _)| id.clone())
                .collect();
            let wifi = interfaces.wifi_info(&wireless).await;
            (info, wifi)
        };
        let (samples, (info, wifi)) = tokio::join!(interfaces.fetch_samples(), metadata);
        self.adapters = self.history.advance(now, samples, &info, &wifi);
        self.totals = RateTotals::sum(&self.adapters);
        self.ticks += 1;
        tracing::debug!(
            tick = self.ticks,
            adapters = self.adapters.len(),
            rx_rate_bps = self.totals.rx_rate_bps,
            tx_rate_bps = self.totals.tx_rate_bps,
            "tick"
        );
        self.publish();
        self.launch_side_channels(now);
    }

    fn launch_side_channels(&mut self, now: Instant) {
        if self.process.enabled && self.process.gate.try_begin(now) {
            let traffic = self.deps.traffic.clone();
            let tx = self.completion_tx.clone();
            tokio::spawn(async move {
                let result = traffic.sample().await;
                let _ = tx.send(Completion::ProcessSample {
                    started_at: now,
                    result,
                });
            });
        }
        if self.local_ip.try_begin(now) {
            let ips = self.deps.ips.clone();
            let tx = self.completion_tx.clone();
            tokio::spawn(async move {
                let addresses = ips.local_addresses().await;
                let _ = tx.send(Completion::LocalAddresses(addresses));
            });
        }
        if self.settings.external_ip_enabled && self.external_ip.try_begin(now) {
            let ips = self.deps.ips.clone();
            let tx = self.completion_tx.clone();
            tokio::spawn(async move {
                let ip = ips.external_ip().await;
                let _ = tx.send(Completion::ExternalIp(ip));
            });
        }
    }

    /// Folds a side-channel result into the published state.
    pub fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::ProcessSample { started_at, result } => {
                self.process.gate.finish();
                self.process.merge(started_at, result);
            }
            Completion::LocalAddresses(addresses) => {
                self.local_ip.finish();
                self.ips.internal = addresses.internal.unwrap_or_else(|| UNAVAILABLE.into());
                self.ips.gateway = addresses.gateway.unwrap_or_else(|| UNAVAILABLE.into());
            }
            Completion::ExternalIp(ip) => {
                self.external_ip.finish();
                self.ips.external = ip.unwrap_or_else(|| UNAVAILABLE.into());
            }
            Completion::Reconnected(id) => {
                tracing::info!(adapter = %id, "adapter reconnect finished");
                self.reconnecting.remove(&id);
            }
        }
        if self.ticks > 0 {
            self.publish();
        }
    }

    /// Turns per-process sampling on or off and sets the published list length.
    /// Turning it off clears the list and the stored samples.
    pub fn configure_process_traffic(&mut self, enabled: bool, limit: usize) {
        self.process.limit = limit.max(1);
        if let TopApps::Ready(apps) = &mut self.process.top_apps {
            apps.truncate(self.process.limit);
        }
        if enabled != self.process.enabled {
            self.process.enabled = enabled;
            self.process.forget_samples();
            self.process.gate.reset_throttle();
            self.process.top_apps = if enabled {
                TopApps::Pending
            } else {
                TopApps::Disabled
            };
            tracing::info!(enabled, limit = self.process.limit, "process traffic configured");
        }
        if self.ticks > 0 {
            self.publish();
        }
    }

    /// Power-cycles a known wired or wireless adapter in the background.
    pub fn reconnect(&mut self, id: String) -> Result<(), ReconnectRejected> {
        if !is_valid_adapter_id(&id) {
            return Err(ReconnectRejected::InvalidId);
        }
        if self.reconnecting.contains(&id) {
            return Err(ReconnectRejected::InProgress);
        }
        let Some(kind) = self.adapters.iter().find(|a| a.id == id).map(|a| a.kind) else {
            return Err(ReconnectRejected::UnknownAdapter);
        };
        if kind == AdapterType::Other {
            return Err(ReconnectRejected::NotReconnectable);
        }
        self.reconnecting.insert(id.clone());
        let control = self.deps.control.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            control.power_cycle(id.clone(), kind).await;
            let _ = tx.send(Completion::Reconnected(id));
        });
        self.publish();
        Ok(())
    }

    pub fn on_command(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::Start { interval_secs } => {
                self.start(interval_secs);
            }
            MonitorCommand::ConfigureProcessTraffic { enabled, limit } => {
                self.configure_process_traffic(enabled, limit);
            }
            MonitorCommand::Reconnect { id, reply } => {
                let verdict = self.reconnect(id.clone());
                if let Err(reason) = verdict {
                    tracing::debug!(adapter = %id, %reason, "reconnect request rejected");
                }
                let _ = reply.send(verdict);
            }
        }
    }

    /// Applies every queued command without waiting.
    pub fn drain_commands(&mut self) {
        while let Ok(command) = self.commands_rx.try_recv() {
            self.on_command(command);
        }
    }

    /// Next side-channel completion; the monitor holds a sender, so this only
    /// returns None if that invariant is broken.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
                0
            });
        NetworkSnapshot {
            timestamp,
            tick: self.ticks,
            adapters: self.adapters.clone(),
            totals: self.totals,
            top_apps: self.process.top_apps.clone(),
            ips: self.ips.clone(),
            reconnecting: self.reconnecting.iter().cloned().collect(),
        }
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.latest.send_replace(Some(snapshot.clone()));
        if self.snapshots.send(snapshot).is_err() {
            let should_log = self
                .last_no_receivers_log
                .is_none_or(|t| t.elapsed() >= NO_RECEIVERS_LOG_INTERVAL);
            if should_log {
                tracing::debug!(
                    operation = "broadcast_snapshot",
                    "No active WebSocket clients; broadcast channel has no receivers"
                );
                self.last_no_receivers_log = Some(Instant::now());
            }
        }
    }

    /// Runs until `shutdown_rx` fires (or its sender is dropped).
    pub async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) {
        let mut stats_log_tick = interval(STATS_LOG_INTERVAL);
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = next_tick(&mut self.schedule) => self.tick().await,
                Some(completion) = self.completion_rx.recv() => self.on_completion(completion),
                Some(command) = self.commands_rx.recv() => self.on_command(command),
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ws_snapshot_clients = self.deps.ws_connections.load(Ordering::Relaxed),
                        ticks = self.ticks,
                        adapters = self.adapters.len(),
                        "app stats"
                    );
                }
                _ = &mut shutdown_rx => {
                    tracing::debug!("Monitor shutting down");
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx).instrument(tracing::debug_span!("monitor")))
    }
}

/// Resolves on the next scheduled tick; pending forever while not started.
async fn next_tick(schedule: &mut Option<Schedule>) {
    match schedule {
        Some(s) => {
            s.ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
