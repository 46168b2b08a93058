// macOS helpers: `networksetup -listallhardwareports` and
// `system_profiler SPAirPortDataType` parsing.

use super::linux::band_label;
use crate::models::{AdapterType, InterfaceMetadata, WifiInfo};
use std::collections::HashMap;

pub(crate) const NETWORKSETUP: &str = "/usr/sbin/networksetup";
pub(crate) const SYSTEM_PROFILER: &str = "/usr/sbin/system_profiler";
pub(crate) const AIRPORT_DATA_TYPE: &str = "SPAirPortDataType";

/// SSID shown when the process lacks location access.
const REDACTED_SSID: &str = "<redacted>";

/// (hardware port, device) pairs in listing order.
pub(crate) fn parse_hardware_ports(output: &str) -> Vec<(String, String)> {
    let mut ports = Vec::new();
    let mut current_port: Option<String> = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(port) = line.strip_prefix("Hardware Port:") {
            current_port = Some(port.trim().to_string());
        } else if let Some(device) = line.strip_prefix("Device:")
            && let Some(port) = current_port.take()
        {
            let device = device.trim();
            if !device.is_empty() {
                ports.push((port, device.to_string()));
            }
        }
    }
    ports
}

pub(crate) fn classify_port(port: &str) -> AdapterType {
    if port.contains("Wi-Fi") || port.contains("AirPort") {
        AdapterType::Wireless
    } else if port.contains("Ethernet") || port.contains("LAN") {
        AdapterType::Wired
    } else {
        AdapterType::Other
    }
}

pub(super) fn interface_info(output: &str) -> HashMap<String, InterfaceMetadata> {
    parse_hardware_ports(output)
        .into_iter()
        .map(|(port, device)| {
            let meta = InterfaceMetadata {
                kind: classify_port(&port),
                display_name: port,
            };
            (device, meta)
        })
        .collect()
}

/// Hardware port name for a device (e.g. "Wi-Fi" for "en0"); falls back to the device.
pub(crate) fn hardware_port_name(output: &str, device: &str) -> String {
    parse_hardware_ports(output)
        .into_iter()
        .find(|(_, d)| d == device)
        .map(|(port, _)| port)
        .unwrap_or_else(|| device.to_string())
}

fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Band label from a channel description such as "36 (5GHz, 80MHz)".
/// Older releases print only the channel number.
fn channel_band(channel: &str) -> &'static str {
    let freq = if channel.contains("6GHz") {
        Some(5955.0)
    } else if channel.contains("5GHz") {
        Some(5180.0)
    } else if channel.contains("2GHz") || channel.contains("2.4GHz") {
        Some(2412.0)
    } else {
        let number = channel
            .split(|c: char| !c.is_ascii_digit())
            .next()
            .and_then(|n| n.parse::<u32>().ok());
        match number {
            Some(1..=14) => Some(2412.0),
            Some(32..=177) => Some(5180.0),
            _ => None,
        }
    };
    band_label(freq)
}

struct Radio {
    name: String,
    indent: usize,
    info: WifiInfo,
}

/// Wi-Fi state per interface from the `Interfaces:` section of
/// `system_profiler SPAirPortDataType`. Only the "Current Network Information"
/// block is read; neighbouring networks are ignored. A radio without a
/// current network keeps the generic band label, zero rate and no SSID.
pub(crate) fn parse_airport(output: &str) -> HashMap<String, WifiInfo> {
    let mut radios = HashMap::new();
    let mut section: Option<usize> = None;
    let mut radio: Option<Radio> = None;
    // (indent of the "Current Network Information:" header, SSID line seen)
    let mut network: Option<(usize, bool)> = None;

    for line in output.lines() {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let indent = leading_spaces(line);
        if text == "Interfaces:" {
            section = Some(indent);
            continue;
        }
        let Some(section_indent) = section else {
            continue;
        };
        if indent <= section_indent {
            if let Some(r) = radio.take() {
                radios.insert(r.name, r.info);
            }
            section = None;
            network = None;
            continue;
        }

        let starts_radio = match &radio {
            None => true,
            Some(r) => indent <= r.indent,
        };
        if starts_radio {
            if let Some(r) = radio.take() {
                radios.insert(r.name, r.info);
            }
            network = None;
            if let Some(name) = text.strip_suffix(':') {
                radio = Some(Radio {
                    name: name.to_string(),
                    indent,
                    info: WifiInfo {
                        mode: band_label(None).to_string(),
                        tx_rate_mbps: 0.0,
                        ssid: None,
                    },
                });
            }
            continue;
        }
        let Some(r) = radio.as_mut() else {
            continue;
        };

        if let Some((header_indent, _)) = network
            && indent <= header_indent
        {
            network = None;
        }
        match network.as_mut() {
            None => {
                if text == "Current Network Information:" {
                    network = Some((indent, false));
                }
            }
            Some((_, ssid_seen)) if !*ssid_seen => {
                if let Some(ssid) = text.strip_suffix(':') {
                    if ssid != REDACTED_SSID && !ssid.is_empty() {
                        r.info.ssid = Some(ssid.to_string());
                    }
                    *ssid_seen = true;
                }
            }
            Some(_) => {
                if let Some(channel) = text.strip_prefix("Channel:") {
                    r.info.mode = channel_band(channel.trim()).to_string();
                } else if let Some(rate) = text.strip_prefix("Transmit Rate:") {
                    r.info.tx_rate_mbps = rate.trim().parse::<f64>().unwrap_or(0.0);
                }
            }
        }
    }
    if let Some(r) = radio {
        radios.insert(r.name, r.info);
    }
    radios
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\n\
Hardware Port: Ethernet\n\
Device: en0\n\
Ethernet Address: 00:11:22:33:44:55\n\
\n\
Hardware Port: Wi-Fi\n\
Device: en1\n\
Ethernet Address: 66:77:88:99:aa:bb\n\
\n\
Hardware Port: Thunderbolt Bridge\n\
Device: bridge0\n\
Ethernet Address: N/A\n\
\n\
Hardware Port: USB 10/100/1000 LAN\n\
Device: en7\n\
Ethernet Address: cc:dd:ee:ff:00:11\n\
\n\
VLAN Configurations\n\
===================\n";

    #[test]
    fn parses_ports_and_classifies() {
        let info = interface_info(LISTING);
        assert_eq!(info.len(), 4);
        assert_eq!(info["en0"].kind, AdapterType::Wired);
        assert_eq!(info["en1"].kind, AdapterType::Wireless);
        assert_eq!(info["en1"].display_name, "Wi-Fi");
        assert_eq!(info["bridge0"].kind, AdapterType::Other);
        assert_eq!(info["en7"].kind, AdapterType::Wired);
    }

    #[test]
    fn hardware_port_lookup_falls_back_to_device() {
        assert_eq!(hardware_port_name(LISTING, "en1"), "Wi-Fi");
        assert_eq!(hardware_port_name(LISTING, "utun3"), "utun3");
    }

    const AIRPORT: &str = "Wi-Fi:

      Software Versions:
          CoreWLAN: 16.0 (1657)
          Menu Extra: 17.0 (1728)
      Interfaces:
        en0:
          Card Type: Wi-Fi  (0x14E4, 0x4387)
          Firmware Version: wl0: Jul 24 2023
          MAC Address: 66:77:88:99:aa:bb
          Supported PHY Modes: 802.11 a/b/g/n/ac/ax
          Status: Connected
          Current Network Information:
            HomeNet:
              PHY Mode: 802.11ax
              Channel: 36 (5GHz, 80MHz)
              Country Code: US
              Network Type: Infrastructure
              Security: WPA2 Personal
              Signal / Noise: -52 dBm / -94 dBm
              Transmit Rate: 864
              MCS Index: 9
          Other Local Wi-Fi Networks:
            Neighbour:
              PHY Mode: 802.11n
              Channel: 11 (2GHz, 20MHz)
              Transmit Rate: 144
        awdl0:
          MAC Address: 12:34:56:78:9a:bc
          Supported Channels: 1 (2GHz), 6 (2GHz), 149 (5GHz)
          Status: Inactive
";

    #[test]
    fn airport_reads_current_network_only() {
        let radios = parse_airport(AIRPORT);
        assert_eq!(radios.len(), 2);
        let en0 = &radios["en0"];
        assert_eq!(en0.mode, "Wi-Fi (5 GHz)");
        assert_eq!(en0.tx_rate_mbps, 864.0);
        assert_eq!(en0.ssid.as_deref(), Some("HomeNet"));

        let awdl = &radios["awdl0"];
        assert_eq!(awdl.mode, "Wi-Fi");
        assert_eq!(awdl.tx_rate_mbps, 0.0);
        assert_eq!(awdl.ssid, None);
    }

    #[test]
    fn airport_redacted_ssid_and_6ghz() {
        let listing = "Wi-Fi:\n\
\x20     Interfaces:\n\
\x20       en0:\n\
\x20         Current Network Information:\n\
\x20           <redacted>:\n\
\x20             Channel: 37 (6GHz, 160MHz)\n\
\x20             Transmit Rate: 1921\n";
        let radios = parse_airport(listing);
        assert_eq!(radios["en0"].mode, "Wi-Fi (6 GHz)");
        assert_eq!(radios["en0"].tx_rate_mbps, 1921.0);
        assert_eq!(radios["en0"].ssid, None);
    }

    #[test]
    fn channel_band_without_band_suffix() {
        assert_eq!(channel_band("6"), "Wi-Fi (2.4 GHz)");
        assert_eq!(channel_band("149,80"), "Wi-Fi (5 GHz)");
        assert_eq!(channel_band(""), "Wi-Fi");
    }

    #[test]
    fn airport_without_interfaces_is_empty() {
        assert!(parse_airport("Wi-Fi:\n\n      Software Versions:\n").is_empty());
    }
}
