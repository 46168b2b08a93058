use serde::Deserialize;

use crate::models::AdapterFilter;

/// Upper bound for the side-channel intervals; keeps every value representable
/// as a `Duration`.
pub const MAX_SIDE_INTERVAL_SECS: f64 = 86_400.0;

/// The process sampler shells out to netstat; never run it more often than this.
pub const MIN_PROCESS_INTERVAL_SECS: f64 = 1.0;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub process_traffic: ProcessTrafficConfig,
    #[serde(default)]
    pub ip_lookup: IpLookupConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Poll interval in seconds; clamped to [0.2, 10.0] when the loop starts.
    pub refresh_interval_secs: f64,
    /// Snapshots kept in the broadcast channel for /ws/snapshot (slow clients may lag).
    pub broadcast_capacity: usize,
    /// Upper bound for any OS tool invocation (netstat, iw, route...).
    pub command_timeout_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 1.0,
            broadcast_capacity: 16,
            command_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessTrafficConfig {
    pub enabled: bool,
    /// Top-N processes published.
    pub limit: usize,
    pub min_interval_secs: f64,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ProcessTrafficConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: 5,
            min_interval_secs: 2.0,
            program: "/usr/sbin/netstat".into(),
            args: vec!["-n".into(), "-b".into(), "-v".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpLookupConfig {
    pub external_enabled: bool,
    pub external_url: String,
    pub external_interval_secs: f64,
    pub local_interval_secs: f64,
    /// Interface whose address wins as "internal IP" when it has one.
    pub preferred_interface: String,
    pub http_timeout_secs: u64,
}

impl Default for IpLookupConfig {
    fn default() -> Self {
        Self {
            external_enabled: true,
            external_url: "https://api.ipify.org".into(),
            external_interval_secs: 60.0,
            local_interval_secs: 5.0,
            preferred_interface: "en0".into(),
            http_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub use_bits: bool,
    pub show_inactive: bool,
    pub show_other_adapters: bool,
    pub hidden_adapters: Vec<String>,
    /// Summary totals over visible adapters only instead of all adapters.
    pub totals_only_visible: bool,
}

impl DisplayConfig {
    pub fn adapter_filter(&self) -> AdapterFilter {
        AdapterFilter {
            show_inactive: self.show_inactive,
            show_other: self.show_other_adapters,
            hidden: self.hidden_adapters.iter().cloned().collect(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.monitoring.refresh_interval_secs.is_finite()
                && self.monitoring.refresh_interval_secs > 0.0,
            "monitoring.refresh_interval_secs must be > 0, got {}",
            self.monitoring.refresh_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.broadcast_capacity > 0,
            "monitoring.broadcast_capacity must be > 0, got {}",
            self.monitoring.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.command_timeout_secs > 0,
            "monitoring.command_timeout_secs must be > 0, got {}",
            self.monitoring.command_timeout_secs
        );
        anyhow::ensure!(
            self.process_traffic.limit > 0,
            "process_traffic.limit must be > 0, got {}",
            self.process_traffic.limit
        );
        anyhow::ensure!(
            (MIN_PROCESS_INTERVAL_SECS..=MAX_SIDE_INTERVAL_SECS)
                .contains(&self.process_traffic.min_interval_secs),
            "process_traffic.min_interval_secs must be between {} and {}, got {}",
            MIN_PROCESS_INTERVAL_SECS,
            MAX_SIDE_INTERVAL_SECS,
            self.process_traffic.min_interval_secs
        );
        anyhow::ensure!(
            !self.process_traffic.program.is_empty(),
            "process_traffic.program must be non-empty"
        );
        anyhow::ensure!(
            !self.ip_lookup.external_enabled
                || self.ip_lookup.external_url.starts_with("http://")
                || self.ip_lookup.external_url.starts_with("https://"),
            "ip_lookup.external_url must be an http(s) URL, got {:?}",
            self.ip_lookup.external_url
        );
        anyhow::ensure!(
            self.ip_lookup.external_interval_secs > 0.0
                && self.ip_lookup.external_interval_secs <= MAX_SIDE_INTERVAL_SECS,
            "ip_lookup.external_interval_secs must be in (0, {}], got {}",
            MAX_SIDE_INTERVAL_SECS,
            self.ip_lookup.external_interval_secs
        );
        anyhow::ensure!(
            (0.0..=MAX_SIDE_INTERVAL_SECS).contains(&self.ip_lookup.local_interval_secs),
            "ip_lookup.local_interval_secs must be between 0 and {}, got {}",
            MAX_SIDE_INTERVAL_SECS,
            self.ip_lookup.local_interval_secs
        );
        anyhow::ensure!(
            self.ip_lookup.http_timeout_secs > 0,
            "ip_lookup.http_timeout_secs must be > 0, got {}",
            self.ip_lookup.http_timeout_secs
        );
        Ok(())
    }
}
