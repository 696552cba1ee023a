//! Connection Notifications
//!
//! Keeps the persistent status indicator in sync with the session and
//! shows transient toasts. Rendering is left to a [`StatusSurface`].

use tracing::debug;

/// Indicator appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStatus {
    /// Session up, tunnel not reported broken
    Connected,
    /// Tunnel down, engine retrying
    Failure,
}

/// Transient user-visible messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toast {
    FailedToStart,
    Connected,
    StoppedNoConnection,
    ConnectionFailed,
}

impl Toast {
    pub fn text(&self) -> &'static str {
        match self {
            Toast::FailedToStart => "Failed to start Revtether",
            Toast::Connected => "Revtether connection established",
            Toast::StoppedNoConnection => "Revtether stopped due to no connection",
            Toast::ConnectionFailed => "Revtether connection failed",
        }
    }
}

/// Rendering boundary (notification area, tray icon, ...)
pub trait StatusSurface: Send {
    /// Show or re-render the persistent indicator
    fn show_indicator(&mut self, status: IndicatorStatus);

    /// Remove the indicator and any channel resources
    fn remove_indicator(&mut self);

    fn show_toast(&mut self, text: &str);
}

/// Drives a [`StatusSurface`] from controller decisions
pub struct ConnectionEventNotifier {
    surface: Box<dyn StatusSurface>,
    failure: bool,
}

impl ConnectionEventNotifier {
    pub fn new(surface: Box<dyn StatusSurface>) -> Self {
        Self {
            surface,
            failure: false,
        }
    }

    /// Show the indicator, clearing any previous failure
    pub fn start(&mut self) {
        self.failure = false;
        self.surface.show_indicator(IndicatorStatus::Connected);
    }

    pub fn stop(&mut self) {
        self.surface.remove_indicator();
    }

    /// Switch the indicator between normal and failure. Repeating the
    /// current value does nothing.
    pub fn set_failure(&mut self, failure: bool) {
        if self.failure == failure {
            return;
        }
        self.failure = failure;
        debug!("Status indicator failure = {}", failure);
        let status = if failure {
            IndicatorStatus::Failure
        } else {
            IndicatorStatus::Connected
        };
        self.surface.show_indicator(status);
    }

    pub fn is_failure(&self) -> bool {
        self.failure
    }

    pub fn toast(&mut self, toast: Toast) {
        self.surface.show_toast(toast.text());
    }
}
