//! Start Requests
//!
//! A start request may carry its own DNS servers, routes, excluded apps
//! and disconnect policy. Any field the request leaves out, or that the
//! user chose to overwrite, comes from the preferences instead.

use crate::blocked_apps::BlockedApps;
use crate::cidr::NetworkRange;
use crate::config::SessionConfiguration;
use crate::preferences::Preferences;
use std::collections::HashSet;
use std::net::IpAddr;

/// What an external trigger asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRequest {
    pub dns_servers: Option<Vec<IpAddr>>,
    pub routes: Option<Vec<NetworkRange>>,
    pub blocked_apps: Option<Vec<String>>,
    pub stop_on_disconnect: Option<bool>,
    pub started_by_server: bool,
}

impl SessionRequest {
    /// Request from the local user, no explicit parameters
    pub fn local() -> Self {
        Self::default()
    }

    /// Request from the relay server
    pub fn from_server() -> Self {
        Self {
            started_by_server: true,
            ..Self::default()
        }
    }

    /// Merge with the preferences into a session configuration
    pub fn resolve(&self, prefs: &Preferences, blocked: &BlockedApps) -> SessionConfiguration {
        let dns_servers = match &self.dns_servers {
            Some(servers) if !prefs.overwrite_dns_servers => servers.clone(),
            _ => prefs.dns_servers(),
        };

        let routes = self.routes.clone().unwrap_or_default();

        let blocked_apps = match &self.blocked_apps {
            Some(apps) if !prefs.overwrite_blocked_apps => apps.clone(),
            _ => blocked.to_vec(),
        };

        let stop_on_disconnect = match self.stop_on_disconnect {
            Some(stop) if !prefs.overwrite_stop_on_disconnect => stop,
            _ => prefs.stop_on_disconnect,
        };

        SessionConfiguration::new(
            dns_servers,
            routes,
            blocked_apps,
            stop_on_disconnect,
            self.started_by_server,
        )
    }
}

/// Whether a change to the excluded-app set should restart a running
/// session: locally started sessions always follow the set, server-started
/// ones only when the user overwrites the server's list.
pub fn restart_required_for_blocked_apps(
    last: Option<&SessionConfiguration>,
    prefs: &Preferences,
) -> bool {
    let started_locally = last.is_some_and(|config| !config.is_started_by_server());
    started_locally || prefs.overwrite_blocked_apps
}

/// Whether a change of the DNS preference should restart a running
/// session: the resolved servers differ from the applied ones, and the
/// session either started locally or the user overwrites the server's list.
pub fn restart_required_for_dns(last: Option<&SessionConfiguration>, prefs: &Preferences) -> bool {
    let Some(last) = last else {
        return false;
    };
    if last.is_started_by_server() && !prefs.overwrite_dns_servers {
        return false;
    }

    let applied: HashSet<IpAddr> = last.dns_servers().iter().copied().collect();
    let current: HashSet<IpAddr> = prefs.dns_servers().into_iter().collect();
    applied != current
}

/// Disconnect policy to push into the running session after the
/// preference changed, if the session follows the preference at all.
pub fn stop_on_disconnect_update(
    last: Option<&SessionConfiguration>,
    prefs: &Preferences,
) -> Option<bool> {
    let last = last?;
    (!last.is_started_by_server() || prefs.overwrite_stop_on_disconnect)
        .then_some(prefs.stop_on_disconnect)
}
