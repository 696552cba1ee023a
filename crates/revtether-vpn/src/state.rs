//! Session State
//!
//! The two flags every observer cares about, `running` and `connected`,
//! published as one pair through a watch channel so readers never see a
//! torn update. Only the controller writes.

use revtether_config::SessionConfiguration;
use tokio::sync::watch;

/// Snapshot of the session flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    /// The virtual interface is established
    pub running: bool,
    /// The tunnel to the relay is up
    pub connected: bool,
}

impl SessionFlags {
    pub fn phase(&self) -> SessionPhase {
        if self.running {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        }
    }
}

/// Externally observable session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session
    Idle,
    /// Interface established (tunnel may be up or down)
    Active,
}

/// Process-wide session state: single writer, many readers
#[derive(Debug)]
pub struct SessionState {
    flags: watch::Sender<SessionFlags>,
    last_configuration: watch::Sender<Option<SessionConfiguration>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            flags: watch::Sender::new(SessionFlags::default()),
            last_configuration: watch::Sender::new(None),
        }
    }

    pub fn flags(&self) -> SessionFlags {
        *self.flags.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.flags().running
    }

    pub fn is_connected(&self) -> bool {
        self.flags().connected
    }

    pub fn phase(&self) -> SessionPhase {
        self.flags().phase()
    }

    /// Watch flag changes
    pub fn subscribe(&self) -> watch::Receiver<SessionFlags> {
        self.flags.subscribe()
    }

    /// Configuration of the current (or most recent) session.
    ///
    /// Stays readable after a stop until the next start replaces it.
    pub fn last_configuration(&self) -> Option<SessionConfiguration> {
        self.last_configuration.borrow().clone()
    }

    /// Watch configuration changes
    pub fn subscribe_configuration(&self) -> watch::Receiver<Option<SessionConfiguration>> {
        self.last_configuration.subscribe()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.publish(|flags| flags.running = running);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.publish(|flags| flags.connected = connected);
    }

    pub(crate) fn set_last_configuration(&self, config: SessionConfiguration) {
        self.last_configuration.send_replace(Some(config));
    }

    fn publish(&self, update: impl FnOnce(&mut SessionFlags)) {
        self.flags.send_if_modified(|flags| {
            let before = *flags;
            update(flags);
            debug_assert!(
                flags.running || !flags.connected,
                "connected while not running"
            );
            *flags != before
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
