//! Session Configuration
//!
//! The parameters a single VPN session is started with: DNS servers,
//! captured routes, excluded applications and the disconnect policy.
//!
//! Empty collections are valid and mean "use the defaults". The session
//! controller, not this type, substitutes them when it builds the
//! interface request.

use crate::cidr::NetworkRange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::net::IpAddr;

/// Configuration of one VPN session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfiguration {
    /// DNS servers, in resolver priority order
    dns_servers: Vec<IpAddr>,
    /// Routes captured by the interface
    routes: Vec<NetworkRange>,
    /// Application identifiers excluded from the VPN
    blocked_apps: Vec<String>,
    /// Stop the whole session when the tunnel drops
    stop_on_disconnect: bool,
    /// Session was requested by the relay server rather than locally
    started_by_server: bool,
}

impl SessionConfiguration {
    /// Create a configuration.
    ///
    /// Duplicate routes and applications are dropped (first occurrence
    /// wins); the DNS list is kept as given.
    pub fn new(
        dns_servers: Vec<IpAddr>,
        routes: Vec<NetworkRange>,
        blocked_apps: Vec<String>,
        stop_on_disconnect: bool,
        started_by_server: bool,
    ) -> Self {
        Self {
            dns_servers,
            routes: dedup(routes),
            blocked_apps: dedup(blocked_apps),
            stop_on_disconnect,
            started_by_server,
        }
    }

    pub fn dns_servers(&self) -> &[IpAddr] {
        &self.dns_servers
    }

    pub fn routes(&self) -> &[NetworkRange] {
        &self.routes
    }

    pub fn blocked_apps(&self) -> &[String] {
        &self.blocked_apps
    }

    pub fn stop_on_disconnect(&self) -> bool {
        self.stop_on_disconnect
    }

    pub fn is_started_by_server(&self) -> bool {
        self.started_by_server
    }

    /// Force the disconnect policy after construction.
    ///
    /// This is the only mutation a configuration allows.
    pub fn set_stop_on_disconnect(&mut self, stop_on_disconnect: bool) {
        self.stop_on_disconnect = stop_on_disconnect;
    }

    /// True when every collection is empty (all defaults apply)
    pub fn is_empty(&self) -> bool {
        self.dns_servers.is_empty() && self.routes.is_empty() && self.blocked_apps.is_empty()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let parsed: Self = serde_json::from_str(content)?;
        // re-apply set semantics to hand-written input
        Ok(Self::new(
            parsed.dns_servers,
            parsed.routes,
            parsed.blocked_apps,
            parsed.stop_on_disconnect,
            parsed.started_by_server,
        ))
    }
}

impl Default for SessionConfiguration {
    /// Empty configuration, as sent by the relay server when it has
    /// nothing specific to ask for.
    fn default() -> Self {
        Self {
            dns_servers: Vec::new(),
            routes: Vec::new(),
            blocked_apps: Vec::new(),
            stop_on_disconnect: false,
            started_by_server: true,
        }
    }
}

fn dedup<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
