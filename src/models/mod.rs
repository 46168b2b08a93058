// Domain models

mod adapter;
mod snapshot;
mod traffic;

pub use adapter::{
    AdapterFilter, AdapterStatus, AdapterType, IFF_UP, InterfaceMetadata, InterfaceSample,
    RateTotals, WifiInfo,
};
pub use snapshot::{IpAddresses, NetworkSnapshot, UNAVAILABLE};
pub use traffic::{AppTraffic, ProcessByteSnapshot, ProcessBytes, TopApps};
