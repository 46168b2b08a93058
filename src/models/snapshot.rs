// Published snapshot: everything the presentation layer reads per tick

use serde::{Deserialize, Serialize};

use super::{AdapterFilter, AdapterStatus, RateTotals, TopApps};

/// Placeholder shown for any address that could not be resolved.
pub const UNAVAILABLE: &str = "—";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddresses {
    pub internal: String,
    pub gateway: String,
    pub external: String,
}

impl Default for IpAddresses {
    fn default() -> Self {
        Self {
            internal: UNAVAILABLE.into(),
            gateway: UNAVAILABLE.into(),
            external: UNAVAILABLE.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    /// Milliseconds since the Unix epoch at publish time.
    pub timestamp: u64,
    /// Number of completed poll ticks.
    pub tick: u64,
    pub adapters: Vec<AdapterStatus>,
    pub totals: RateTotals,
    pub top_apps: TopApps,
    pub ips: IpAddresses,
    pub reconnecting: Vec<String>,
}

impl NetworkSnapshot {
    pub fn visible_adapters<'a>(
        &'a self,
        filter: &'a AdapterFilter,
    ) -> impl Iterator<Item = &'a AdapterStatus> + 'a {
        self.adapters.iter().filter(move |a| filter.allows(a))
    }

    /// Totals for display: all adapters, or only the visible ones when `only_visible`.
    pub fn display_totals(&self, filter: &AdapterFilter, only_visible: bool) -> RateTotals {
        if only_visible {
            RateTotals::sum(self.visible_adapters(filter))
        } else {
            self.totals
        }
    }
}
