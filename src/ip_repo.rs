// Internal, gateway and external IP lookups.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use tokio::time::Duration;
use tracing::instrument;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalAddresses {
    pub internal: Option<String>,
    pub gateway: Option<String>,
}

pub trait IpSource: Send + Sync + 'static {
    fn local_addresses(&self) -> impl Future<Output = LocalAddresses> + Send;
    fn external_ip(&self) -> impl Future<Output = Option<String>> + Send;
}

/// One IPv4 address of one interface, with the flags that matter for picking.
#[derive(Debug, Clone)]
pub(crate) struct AddressCandidate {
    pub interface: String,
    pub addr: Ipv4Addr,
    pub up: bool,
    pub loopback: bool,
}

/// Primary local IPv4: the preferred interface's address if usable, else the
/// first usable one. Skips down, loopback, unspecified and link-local addresses.
pub(crate) fn pick_primary_ipv4(candidates: &[AddressCandidate], preferred: &str) -> Option<String> {
    let mut usable = candidates
        .iter()
        .filter(|c| c.up && !c.loopback && !c.addr.is_unspecified() && !c.addr.is_link_local());
    let first = usable.clone().next();
    usable
        .find(|c| c.interface == preferred)
        .or(first)
        .map(|c| c.addr.to_string())
}

/// Default gateway from `/proc/net/route` (little-endian hex columns).
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn parse_proc_net_route(content: &str) -> Option<String> {
    const RTF_GATEWAY: u32 = 0x2;
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            let destination = *cols.get(1)?;
            let gateway = u32::from_str_radix(cols.get(2)?, 16).ok()?;
            let flags = u32::from_str_radix(cols.get(3)?, 16).ok()?;
            let metric = cols.get(6)?.parse::<u32>().ok()?;
            (destination == "00000000" && flags & RTF_GATEWAY != 0 && gateway != 0)
                .then(|| (metric, Ipv4Addr::from(gateway.to_le_bytes())))
        })
        .min_by_key(|(metric, _)| *metric)
        .map(|(_, addr)| addr.to_string())
}

/// Default gateway from `route -n get default` (BSD/macOS).
#[cfg_attr(target_os = "linux", allow(dead_code))]
pub(crate) fn parse_route_get(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix("gateway:")?.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub struct IpRepo {
    http: reqwest::Client,
    external_url: String,
    preferred_interface: String,
    #[cfg_attr(target_os = "linux", allow(dead_code))]
    command_timeout: Duration,
}

impl IpRepo {
    pub fn new(
        external_url: impl Into<String>,
        preferred_interface: impl Into<String>,
        http_timeout: Duration,
        command_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            http,
            external_url: external_url.into(),
            preferred_interface: preferred_interface.into(),
            command_timeout,
        })
    }

    async fn default_gateway(&self) -> Option<String> {
        #[cfg(target_os = "linux")]
        {
            let content = tokio::fs::read_to_string("/proc/net/route").await.ok()?;
            parse_proc_net_route(&content)
        }
        #[cfg(not(target_os = "linux"))]
        {
            let args = crate::command::args(&["-n", "get", "default"]);
            match crate::command::run_capture("/sbin/route", &args, self.command_timeout).await {
                Ok(output) => parse_route_get(&output),
                Err(e) => {
                    tracing::debug!(error = %e, "default route lookup failed");
                    None
                }
            }
        }
    }
}

impl IpSource for IpRepo {
    #[instrument(skip(self), fields(repo = "ip", operation = "local_addresses"))]
    async fn local_addresses(&self) -> LocalAddresses {
        let preferred = self.preferred_interface.clone();
        let internal = tokio::task::spawn_blocking(move || {
            pick_primary_ipv4(&address_candidates(), &preferred)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "address task join failed");
            None
        });
        LocalAddresses {
            internal,
            gateway: self.default_gateway().await,
        }
    }

    #[instrument(skip(self), fields(repo = "ip", operation = "external_ip"))]
    async fn external_ip(&self) -> Option<String> {
        let body = match self.http.get(&self.external_url).send().await {
            Ok(resp) => match resp.error_for_status() {
                Ok(resp) => resp.text().await.ok()?,
                Err(e) => {
                    tracing::debug!(error = %e, "external IP lookup rejected");
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "external IP lookup failed");
                return None;
            }
        };
        let ip = body.trim();
        ip.parse::<IpAddr>().ok().map(|_| ip.to_string())
    }
}

#[cfg(unix)]
fn address_candidates() -> Vec<AddressCandidate> {
    use nix::net::if_::InterfaceFlags;
    use std::net::SocketAddrV4;

    let Ok(addrs) = nix::ifaddrs::getifaddrs() else {
        return Vec::new();
    };
    addrs
        .filter_map(|ifa| {
            let sin = ifa.address.as_ref()?.as_sockaddr_in().copied()?;
            Some(AddressCandidate {
                addr: *SocketAddrV4::from(sin).ip(),
                up: ifa.flags.contains(InterfaceFlags::IFF_UP),
                loopback: ifa.flags.contains(InterfaceFlags::IFF_LOOPBACK),
                interface: ifa.interface_name,
            })
        })
        .collect()
}

#[cfg(not(unix))]
fn address_candidates() -> Vec<AddressCandidate> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(interface: &str, addr: [u8; 4], up: bool, loopback: bool) -> AddressCandidate {
        AddressCandidate {
            interface: interface.into(),
            addr: Ipv4Addr::from(addr),
            up,
            loopback,
        }
    }

    #[test]
    fn primary_ipv4_prefers_named_interface() {
        let c = vec![
            candidate("lo0", [127, 0, 0, 1], true, true),
            candidate("en5", [10, 0, 0, 7], true, false),
            candidate("en0", [192, 168, 1, 20], true, false),
        ];
        assert_eq!(pick_primary_ipv4(&c, "en0").as_deref(), Some("192.168.1.20"));
        assert_eq!(pick_primary_ipv4(&c, "wlan0").as_deref(), Some("10.0.0.7"));
    }

    #[test]
    fn primary_ipv4_skips_unusable() {
        let c = vec![
            candidate("en0", [169, 254, 3, 4], true, false),
            candidate("en1", [0, 0, 0, 0], true, false),
            candidate("en2", [10, 1, 1, 1], false, false),
            candidate("lo", [127, 0, 0, 1], true, true),
        ];
        assert_eq!(pick_primary_ipv4(&c, "en0"), None);
    }

    #[test]
    fn proc_net_route_default_gateway() {
        let content = "Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT\n\
wlan0\t00000000\t0102A8C0\t0003\t0\t0\t600\t00000000\t0\t0\t0\n\
eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0\n\
eth0\t0001A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0\n";
        assert_eq!(parse_proc_net_route(content).as_deref(), Some("192.168.1.1"));
        assert_eq!(parse_proc_net_route("Iface\tDestination\n"), None);
    }

    #[test]
    fn route_get_gateway() {
        let output = "   route to: default\ndestination: default\n       mask: default\n    gateway: 192.168.178.1\n  interface: en0\n";
        assert_eq!(parse_route_get(output).as_deref(), Some("192.168.178.1"));
        assert_eq!(parse_route_get("route: writing to routing socket: not in table\n"), None);
    }
}
