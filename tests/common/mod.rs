// Shared test helpers: in-memory sources for the monitor

#![allow(dead_code)]

use netfluss::interface_repo::InterfaceSource;
use netfluss::ip_repo::{IpSource, LocalAddresses};
use netfluss::models::*;
use netfluss::monitor::{Completion, Monitor, MonitorDeps, MonitorHandle, MonitorSettings};
use netfluss::reconnect::AdapterControl;
use netfluss::traffic_repo::{TrafficError, TrafficSource};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::time::Duration;

pub fn sample(id: &str, rx: u64, tx: u64) -> InterfaceSample {
    InterfaceSample {
        id: id.into(),
        flags: IFF_UP,
        rx_bytes: rx,
        tx_bytes: tx,
        link_rate_bps: 0,
    }
}

pub fn process_bytes(entries: &[(&str, u64, u64)]) -> ProcessByteSnapshot {
    let mut snapshot = ProcessByteSnapshot::new();
    for (name, rx, tx) in entries {
        snapshot.add(*name, *rx, *tx);
    }
    snapshot
}

#[derive(Default)]
pub struct FakeInterfaces {
    samples: Mutex<Vec<InterfaceSample>>,
    info: Mutex<HashMap<String, InterfaceMetadata>>,
    wifi: Mutex<HashMap<String, WifiInfo>>,
    wifi_queries: Mutex<Vec<Vec<String>>>,
}

impl FakeInterfaces {
    pub fn set_samples(&self, samples: Vec<InterfaceSample>) {
        *self.samples.lock().unwrap() = samples;
    }

    pub fn set_info(&self, id: &str, kind: AdapterType, display_name: &str) {
        self.info.lock().unwrap().insert(
            id.into(),
            InterfaceMetadata {
                kind,
                display_name: display_name.into(),
            },
        );
    }

    pub fn set_wifi(&self, id: &str, wifi: WifiInfo) {
        self.wifi.lock().unwrap().insert(id.into(), wifi);
    }

    /// Wireless ids passed to each `wifi_info` call, sorted.
    pub fn wifi_queries(&self) -> Vec<Vec<String>> {
        self.wifi_queries.lock().unwrap().clone()
    }
}

impl InterfaceSource for FakeInterfaces {
    async fn fetch_samples(&self) -> Vec<InterfaceSample> {
        self.samples.lock().unwrap().clone()
    }

    async fn interface_info(&self) -> HashMap<String, InterfaceMetadata> {
        self.info.lock().unwrap().clone()
    }

    async fn wifi_info(&self, wireless: &[String]) -> HashMap<String, WifiInfo> {
        let mut ids = wireless.to_vec();
        ids.sort();
        self.wifi_queries.lock().unwrap().push(ids);
        self.wifi.lock().unwrap().clone()
    }
}

/// Replays queued results; the last one repeats. `hold()` blocks sampling
/// until `release()` so in-flight behaviour can be observed.
pub struct FakeTraffic {
    results: Mutex<VecDeque<Result<ProcessByteSnapshot, TrafficError>>>,
    calls: AtomicUsize,
    gate: Semaphore,
    gated: std::sync::atomic::AtomicBool,
}

impl Default for FakeTraffic {
    fn default() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
            gated: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl FakeTraffic {
    pub fn push(&self, result: Result<ProcessByteSnapshot, TrafficError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    fn next_result(&self) -> Result<ProcessByteSnapshot, TrafficError> {
        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            results.pop_front().unwrap()
        } else {
            results.front().cloned().unwrap_or(Err(TrafficError::NoRows))
        }
    }
}

impl TrafficSource for FakeTraffic {
    async fn sample(&self) -> Result<ProcessByteSnapshot, TrafficError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst)
            && let Ok(permit) = self.gate.acquire().await
        {
            permit.forget();
        }
        self.next_result()
    }
}

#[derive(Default)]
pub struct FakeIps {
    pub local: Mutex<LocalAddresses>,
    pub external: Mutex<Option<String>>,
    external_calls: AtomicUsize,
}

impl FakeIps {
    pub fn external_calls(&self) -> usize {
        self.external_calls.load(Ordering::SeqCst)
    }
}

impl IpSource for FakeIps {
    async fn local_addresses(&self) -> LocalAddresses {
        self.local.lock().unwrap().clone()
    }

    async fn external_ip(&self) -> Option<String> {
        self.external_calls.fetch_add(1, Ordering::SeqCst);
        self.external.lock().unwrap().clone()
    }
}

/// Records power-cycle requests; each cycle waits for one `release()`.
pub struct FakeControl {
    pub cycled: Mutex<Vec<(String, AdapterType)>>,
    gate: Semaphore,
}

impl Default for FakeControl {
    fn default() -> Self {
        Self {
            cycled: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
        }
    }
}

impl FakeControl {
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

impl AdapterControl for FakeControl {
    async fn power_cycle(&self, id: String, kind: AdapterType) {
        self.cycled.lock().unwrap().push((id, kind));
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

pub type TestMonitor = Monitor<FakeInterfaces, FakeTraffic, FakeIps, FakeControl>;

#[derive(Clone, Default)]
pub struct Fakes {
    pub interfaces: Arc<FakeInterfaces>,
    pub traffic: Arc<FakeTraffic>,
    pub ips: Arc<FakeIps>,
    pub control: Arc<FakeControl>,
}

/// Quiet defaults: no external lookups, no throttle on process sampling.
pub fn settings() -> MonitorSettings {
    MonitorSettings {
        process_traffic_enabled: false,
        process_limit: 5,
        process_min_interval: Duration::ZERO,
        local_ip_interval: Duration::from_secs(5),
        external_ip_enabled: false,
        external_ip_interval: Duration::from_secs(60),
        broadcast_capacity: 16,
    }
}

pub fn monitor(settings: MonitorSettings) -> (TestMonitor, MonitorHandle, Fakes) {
    let fakes = Fakes::default();
    let (monitor, handle) = Monitor::new(
        MonitorDeps {
            interfaces: fakes.interfaces.clone(),
            traffic: fakes.traffic.clone(),
            ips: fakes.ips.clone(),
            control: fakes.control.clone(),
            ws_connections: Arc::new(AtomicUsize::new(0)),
        },
        settings,
    );
    (monitor, handle, fakes)
}

/// Lets spawned side-channel tasks run up to their next await point.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Applies completions until one matching `want` has been applied.
pub async fn apply_until(monitor: &mut TestMonitor, want: fn(&Completion) -> bool) {
    loop {
        let completion = monitor.next_completion().await.expect("completion channel open");
        let done = want(&completion);
        monitor.on_completion(completion);
        if done {
            break;
        }
    }
}

pub fn is_process_sample(c: &Completion) -> bool {
    matches!(c, Completion::ProcessSample { .. })
}
