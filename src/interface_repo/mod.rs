// Interface counters and metadata: sysinfo for counters, getifaddrs for flags,
// sysfs / networksetup / iw / system_profiler for classification and Wi-Fi state.

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) mod linux;
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) mod macos;

use crate::models::{InterfaceMetadata, InterfaceSample, WifiInfo};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::Networks;
use tokio::time::Duration;
use tracing::instrument;

/// Per-tick queries (iw) get a tighter bound than the general command timeout.
const TICK_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// The Wi-Fi listing is slow to produce; reuse it for this long.
#[cfg(target_os = "macos")]
const AIRPORT_REFRESH: Duration = Duration::from_secs(10);

/// Source of per-tick interface readings. Implementations never fail: any
/// OS error degrades to an empty result for that tick.
pub trait InterfaceSource: Send + Sync + 'static {
    fn fetch_samples(&self) -> impl Future<Output = Vec<InterfaceSample>> + Send;
    fn interface_info(&self) -> impl Future<Output = HashMap<String, InterfaceMetadata>> + Send;
    /// Wi-Fi state for the given wireless interface ids, as classified by
    /// `interface_info` on the same tick.
    fn wifi_info(&self, wireless: &[String])
    -> impl Future<Output = HashMap<String, WifiInfo>> + Send;
}

pub struct InterfaceRepo {
    networks: Arc<std::sync::Mutex<Networks>>,
    sysfs_root: PathBuf,
    command_timeout: Duration,
    #[cfg(target_os = "macos")]
    airport: std::sync::Mutex<Option<(tokio::time::Instant, HashMap<String, WifiInfo>)>>,
}

impl InterfaceRepo {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            networks: Arc::new(std::sync::Mutex::new(Networks::new_with_refreshed_list())),
            sysfs_root: PathBuf::from(linux::SYS_CLASS_NET),
            command_timeout,
            #[cfg(target_os = "macos")]
            airport: std::sync::Mutex::new(None),
        }
    }

    fn tick_timeout(&self) -> Duration {
        self.command_timeout.min(TICK_QUERY_TIMEOUT)
    }
}

impl InterfaceSource for InterfaceRepo {
    #[instrument(skip(self), fields(repo = "interfaces", operation = "fetch_samples"))]
    async fn fetch_samples(&self) -> Vec<InterfaceSample> {
        let networks = self.networks.clone();
        let sysfs_root = self.sysfs_root.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut networks_guard = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks_guard.refresh(true);
            let flags = interface_flags();
            let samples: Vec<InterfaceSample> = networks_guard
                .list()
                .iter()
                .map(|(name, data)| InterfaceSample {
                    id: name.clone(),
                    flags: flags.get(name).copied().unwrap_or(0),
                    rx_bytes: data.total_received(),
                    tx_bytes: data.total_transmitted(),
                    link_rate_bps: link_rate_bps(&sysfs_root, name),
                })
                .collect();
            anyhow::Ok(samples)
        })
        .await;

        match result {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "interface counters unavailable");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "interface counter task join failed");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self), fields(repo = "interfaces", operation = "interface_info"))]
    async fn interface_info(&self) -> HashMap<String, InterfaceMetadata> {
        #[cfg(target_os = "macos")]
        {
            let args = crate::command::args(&["-listallhardwareports"]);
            match crate::command::run_capture(macos::NETWORKSETUP, &args, self.tick_timeout())
                .await
            {
                Ok(output) => macos::interface_info(&output),
                Err(e) => {
                    tracing::debug!(error = %e, "hardware port listing failed");
                    HashMap::new()
                }
            }
        }
        #[cfg(not(target_os = "macos"))]
        {
            let root = self.sysfs_root.clone();
            tokio::task::spawn_blocking(move || linux::interface_info(&root))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "interface info task join failed");
                    HashMap::new()
                })
        }
    }

    #[instrument(skip_all, fields(repo = "interfaces", operation = "wifi_info", wireless = wireless.len()))]
    async fn wifi_info(&self, wireless: &[String]) -> HashMap<String, WifiInfo> {
        if wireless.is_empty() {
            return HashMap::new();
        }
        #[cfg(target_os = "macos")]
        {
            let mut all = self.airport_listing().await;
            all.retain(|id, _| wireless.contains(id));
            all
        }
        #[cfg(target_os = "linux")]
        {
            let limit = self.tick_timeout();
            let queries = wireless.iter().map(|name| async move {
                let args = crate::command::args(&["dev", name.as_str(), "link"]);
                match crate::command::run_capture("iw", &args, limit).await {
                    Ok(output) => Some((name.clone(), linux::parse_iw_link(&output))),
                    Err(e) => {
                        tracing::debug!(error = %e, interface = %name, "iw link failed");
                        None
                    }
                }
            });
            futures_util::future::join_all(queries)
                .await
                .into_iter()
                .flatten()
                .collect()
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            HashMap::new()
        }
    }
}

#[cfg(target_os = "macos")]
impl InterfaceRepo {
    /// Wi-Fi state of every radio from `system_profiler`, cached for
    /// `AIRPORT_REFRESH`. A failed run keeps serving the previous listing.
    async fn airport_listing(&self) -> HashMap<String, WifiInfo> {
        let now = tokio::time::Instant::now();
        let cached = match self.airport.lock() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "airport cache lock poisoned");
                return HashMap::new();
            }
        };
        if let Some((at, listing)) = &cached
            && now.duration_since(*at) < AIRPORT_REFRESH
        {
            return listing.clone();
        }

        let args = crate::command::args(&[macos::AIRPORT_DATA_TYPE]);
        let listing = match crate::command::run_capture(
            macos::SYSTEM_PROFILER,
            &args,
            self.tick_timeout(),
        )
        .await
        {
            Ok(output) => macos::parse_airport(&output),
            Err(e) => {
                tracing::debug!(error = %e, "airport listing failed");
                return cached.map(|(_, listing)| listing).unwrap_or_default();
            }
        };
        if let Ok(mut guard) = self.airport.lock() {
            *guard = Some((now, listing.clone()));
        }
        listing
    }
}

fn link_rate_bps(sysfs_root: &std::path::Path, name: &str) -> u64 {
    #[cfg(target_os = "linux")]
    {
        linux::link_speed_bps(sysfs_root, name)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = (sysfs_root, name);
        0
    }
}

/// OS flag bits per interface name, OR-ed over all of its addresses.
#[cfg(unix)]
fn interface_flags() -> HashMap<String, u32> {
    let mut flags: HashMap<String, u32> = HashMap::new();
    match nix::ifaddrs::getifaddrs() {
        Ok(addrs) => {
            for ifa in addrs {
                *flags.entry(ifa.interface_name).or_default() |= ifa.flags.bits() as u32;
            }
        }
        Err(e) => tracing::debug!(error = %e, "getifaddrs failed"),
    }
    flags
}

#[cfg(not(unix))]
fn interface_flags() -> HashMap<String, u32> {
    HashMap::new()
}
