//! Interface Requests
//!
//! Translates a session configuration into the parameters handed to the
//! OS, substituting defaults for empty collections.

use crate::interface::{InterfaceBuilder, InterfaceError};
use revtether_config::{NetworkRange, SessionConfiguration};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Resolver used when the configuration names none
pub const FALLBACK_DNS: IpAddr = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

/// Fixed interface parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSettings {
    /// Address of the virtual interface
    pub address: NetworkRange,
    /// Interface MTU
    pub mtu: u16,
    /// Session label shown by the OS
    pub session_name: String,
    /// Blocking reads on the packet stream
    pub blocking: bool,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            address: NetworkRange::host(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            mtu: 0x4000,
            session_name: "Revtether".to_string(),
            blocking: true,
        }
    }
}

/// Everything the OS is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRequest {
    pub settings: InterfaceSettings,
    pub routes: Vec<NetworkRange>,
    pub dns_servers: Vec<IpAddr>,
    pub excluded_apps: Vec<String>,
}

impl InterfaceRequest {
    /// Resolve a configuration.
    ///
    /// No routes means the whole traffic; no DNS server means
    /// [`FALLBACK_DNS`]. Non-empty lists pass through as given.
    pub fn from_configuration(config: &SessionConfiguration, settings: &InterfaceSettings) -> Self {
        let routes = if config.routes().is_empty() {
            vec![NetworkRange::everything()]
        } else {
            config.routes().to_vec()
        };

        let dns_servers = if config.dns_servers().is_empty() {
            vec![FALLBACK_DNS]
        } else {
            config.dns_servers().to_vec()
        };

        Self {
            settings: settings.clone(),
            routes,
            dns_servers,
            excluded_apps: config.blocked_apps().to_vec(),
        }
    }

    /// Feed the request into an OS builder.
    ///
    /// Exclusions are best effort: an application the OS rejects is skipped.
    pub fn apply(&self, builder: &mut dyn InterfaceBuilder) {
        builder.add_address(self.settings.address);
        builder.set_session(&self.settings.session_name);

        for route in &self.routes {
            builder.add_route(*route);
        }
        for server in &self.dns_servers {
            builder.add_dns_server(*server);
        }
        for app in &self.excluded_apps {
            match builder.add_disallowed_application(app) {
                Ok(()) => {}
                Err(InterfaceError::UnknownApplication(_)) => {
                    debug!("Ignoring unknown excluded application {}", app);
                }
                Err(e) => warn!("Cannot exclude {}: {}", app, e),
            }
        }

        builder.set_blocking(self.settings.blocking);
        builder.set_mtu(self.settings.mtu);
    }
}
