// Adapter power-cycling. Fire-and-forget: failures are logged, never surfaced.

use crate::command;
use crate::models::AdapterType;
use std::future::Future;
use tokio::time::Duration;

/// Adapter ids are kernel names (en0, wlp2s0); anything else is refused
/// before it reaches a command line.
pub fn is_valid_adapter_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

pub trait AdapterControl: Send + Sync + 'static {
    fn power_cycle(&self, id: String, kind: AdapterType) -> impl Future<Output = ()> + Send;
}

pub struct SystemAdapterControl {
    command_timeout: Duration,
}

impl SystemAdapterControl {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }
}

impl AdapterControl for SystemAdapterControl {
    async fn power_cycle(&self, id: String, kind: AdapterType) {
        tracing::info!(adapter = %id, kind = ?kind, "power-cycling adapter");
        let limit = self.command_timeout;

        #[cfg(target_os = "macos")]
        {
            match kind {
                AdapterType::Wireless => {
                    use crate::interface_repo::macos;
                    let listing = command::run_capture(
                        macos::NETWORKSETUP,
                        &command::args(&["-listallhardwareports"]),
                        limit,
                    )
                    .await
                    .unwrap_or_default();
                    let port = macos::hardware_port_name(&listing, &id);
                    let power = |state: &str| command::args(&["-setairportpower", &port, state]);
                    command::run_quiet(macos::NETWORKSETUP, &power("off"), limit).await;
                    tokio::time::sleep(Duration::from_millis(1500)).await;
                    command::run_quiet(macos::NETWORKSETUP, &power("on"), limit).await;
                }
                AdapterType::Wired => {
                    let script = format!(
                        "do shell script \"ifconfig {id} down && sleep 1 && ifconfig {id} up\" with administrator privileges"
                    );
                    // Long limit: the script waits on the admin password prompt.
                    command::run_quiet(
                        "/usr/bin/osascript",
                        &command::args(&["-e", &script]),
                        Duration::from_secs(300),
                    )
                    .await;
                }
                AdapterType::Other => {}
            }
        }

        #[cfg(not(target_os = "macos"))]
        {
            if kind == AdapterType::Other {
                return;
            }
            let link = |state: &str| command::args(&["link", "set", "dev", &id, state]);
            command::run_quiet("ip", &link("down"), limit).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            command::run_quiet("ip", &link("up"), limit).await;
        }
    }
}
