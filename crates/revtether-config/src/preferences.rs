//! User Preferences
//!
//! TOML-backed settings that shape how start requests are resolved and
//! which transient messages the user sees.
//!
//! ```toml
//! show_toast_on_connect = true
//! show_toast_on_disconnect = true
//! dns_servers = "1.1.1.1, 9.9.9.9"
//! stop_on_disconnect = true
//! overwrite_dns_servers = false
//! overwrite_blocked_apps = true
//! overwrite_stop_on_disconnect = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, warn};

/// Persisted user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Toast when the tunnel comes up
    pub show_toast_on_connect: bool,
    /// Toast when the tunnel goes down
    pub show_toast_on_disconnect: bool,
    /// Comma-separated DNS servers
    pub dns_servers: String,
    /// Default disconnect policy
    pub stop_on_disconnect: bool,
    /// Ignore DNS servers supplied by the start request
    pub overwrite_dns_servers: bool,
    /// Ignore excluded applications supplied by the start request
    pub overwrite_blocked_apps: bool,
    /// Ignore the disconnect policy supplied by the start request
    pub overwrite_stop_on_disconnect: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            show_toast_on_connect: true,
            show_toast_on_disconnect: true,
            dns_servers: String::new(),
            stop_on_disconnect: true,
            overwrite_dns_servers: false,
            overwrite_blocked_apps: true,
            overwrite_stop_on_disconnect: true,
        }
    }
}

impl Preferences {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No preferences at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read preferences: {}", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save as pretty TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences directory: {}", parent.display())
            })?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize preferences")?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write preferences: {}", path.display()))?;
        Ok(())
    }

    /// Parsed DNS servers. Unparsable entries are skipped.
    pub fn dns_servers(&self) -> Vec<IpAddr> {
        self.dns_servers
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| match entry.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    warn!("Failed to parse DNS server: {}", entry);
                    None
                }
            })
            .collect()
    }

    /// Which transient messages to show
    pub fn notification_policy(&self) -> NotificationPolicy {
        NotificationPolicy {
            on_connect: self.show_toast_on_connect,
            on_disconnect: self.show_toast_on_disconnect,
        }
    }
}

/// Toast opt-ins read by the session controller on every tunnel event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub on_connect: bool,
    pub on_disconnect: bool,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Preferences::default().notification_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert!(prefs.show_toast_on_connect);
        assert!(prefs.dns_servers().is_empty());
        assert!(prefs.stop_on_disconnect);
        assert!(!prefs.overwrite_dns_servers);
        assert!(prefs.overwrite_blocked_apps);
        assert!(prefs.overwrite_stop_on_disconnect);
        assert_eq!(
            prefs.notification_policy(),
            NotificationPolicy { on_connect: true, on_disconnect: true }
        );
    }

    #[test]
    fn test_dns_parsing_skips_garbage() {
        let prefs = Preferences {
            dns_servers: " 1.1.1.1, ,not-an-ip,2606:4700::1111 ".into(),
            ..Default::default()
        };
        let servers = prefs.dns_servers();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0], "1.1.1.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let prefs = Preferences::from_toml("overwrite_dns_servers = true\n").unwrap();
        assert!(prefs.overwrite_dns_servers);
        assert!(prefs.show_toast_on_disconnect);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.toml");

        assert_eq!(Preferences::load(&path).unwrap(), Preferences::default());

        let prefs = Preferences {
            stop_on_disconnect: false,
            dns_servers: "9.9.9.9".into(),
            ..Default::default()
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "stop_on_disconnect = \"maybe\"").unwrap();
        assert!(Preferences::load(&path).is_err());
    }
}
