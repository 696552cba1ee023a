//! Revtether configuration
//!
//! Value types shared by the reverse-tethering client:
//!
//! - [`NetworkRange`]: CIDR route prefixes
//! - [`SessionConfiguration`]: parameters of one VPN session, with a
//!   binary [`wire`] form for crossing process boundaries
//! - [`Preferences`] and [`BlockedApps`]: persisted user settings
//! - [`SessionRequest`]: merges a start request with those settings

mod blocked_apps;
mod cidr;
mod config;
mod preferences;
mod request;
pub mod wire;

pub use blocked_apps::BlockedApps;
pub use cidr::{NetworkRange, RangeError};
pub use config::SessionConfiguration;
pub use preferences::{NotificationPolicy, Preferences};
pub use request::{
    SessionRequest, restart_required_for_blocked_apps, restart_required_for_dns,
    stop_on_disconnect_update,
};
pub use wire::WireError;
