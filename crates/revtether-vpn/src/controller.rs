//! VPN Session Controller
//!
//! The state machine behind a reverse-tethering session. It owns the
//! virtual interface, starts and stops the forwarding engine, and turns
//! tunnel events into state changes and notifications.
//!
//! # States
//!
//! ```text
//!            start ok                 tunnel events
//!   Idle ─────────────▶ Active ◀──────────────────────┐
//!    ▲  (establish fail)  │  connected=false|true ─────┘
//!    └────────────────────┘ stop / disconnect with stop_on_disconnect
//! ```
//!
//! Every input is handled to completion before the next one. Tunnel
//! events that arrive after the session stopped are dropped: the
//! controller trusts its own `running` flag, not the event's origin.

use crate::forwarder::{Forwarder, TunnelEvent, TunnelEventSink};
use crate::interface::{InterfaceError, Platform, VpnInterface};
use crate::notifier::{ConnectionEventNotifier, StatusSurface, Toast};
use crate::request::{InterfaceRequest, InterfaceSettings};
use crate::runtime::ControlMessage;
use crate::state::SessionState;
use revtether_config::{NotificationPolicy, SessionConfiguration};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// External collaborators of the controller
pub struct Collaborators {
    pub platform: Box<dyn Platform>,
    pub forwarder: Box<dyn Forwarder>,
    pub surface: Box<dyn StatusSurface>,
}

/// Controller tuning
#[derive(Default)]
pub struct ControllerOptions {
    /// Fixed interface parameters
    pub settings: InterfaceSettings,
    /// Live toast opt-ins; defaults to showing every toast
    pub policy: Option<watch::Receiver<NotificationPolicy>>,
    /// Shared state to publish into; a fresh one when absent
    pub state: Option<Arc<SessionState>>,
}

/// Session state machine
pub struct VpnSessionController {
    state: Arc<SessionState>,
    platform: Box<dyn Platform>,
    forwarder: Box<dyn Forwarder>,
    notifier: ConnectionEventNotifier,
    policy: watch::Receiver<NotificationPolicy>,
    settings: InterfaceSettings,
    events: TunnelEventSink,
    interface: Option<Box<dyn VpnInterface>>,
    /// `forward` returned successfully and `stop` is still owed
    forwarding: bool,
}

impl VpnSessionController {
    pub fn new(
        collaborators: Collaborators,
        options: ControllerOptions,
        events: TunnelEventSink,
    ) -> Self {
        let policy = options
            .policy
            .unwrap_or_else(|| watch::channel(NotificationPolicy::default()).1);

        Self {
            state: options.state.unwrap_or_default(),
            platform: collaborators.platform,
            forwarder: collaborators.forwarder,
            notifier: ConnectionEventNotifier::new(collaborators.surface),
            policy,
            settings: options.settings,
            events,
            interface: None,
            forwarding: false,
        }
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    /// Process one queued message. Returns false once the controller
    /// should exit.
    pub fn handle(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Start(config) => self.start(config),
            ControlMessage::Stop => self.stop(),
            ControlMessage::Restart(config) => self.restart(config),
            ControlMessage::SetStopOnDisconnect(stop) => self.set_stop_on_disconnect(stop),
            ControlMessage::Tunnel(event) => self.on_tunnel_event(event),
            ControlMessage::Shutdown => {
                self.stop();
                return false;
            }
        }
        true
    }

    /// Start a session. Ignored while one is running.
    ///
    /// No configuration means the empty default one.
    pub fn start(&mut self, config: Option<SessionConfiguration>) {
        if self.state.is_running() {
            debug!("VPN already running, ignoring start request");
            return;
        }

        let config = config.unwrap_or_default();
        let request = InterfaceRequest::from_configuration(&config, &self.settings);
        self.state.set_last_configuration(config);

        info!(
            "Starting VPN session ({} routes, {} DNS servers, {} excluded apps)",
            request.routes.len(),
            request.dns_servers.len(),
            request.excluded_apps.len()
        );

        let interface = match self.establish(&request) {
            Ok(interface) => interface,
            Err(e) => {
                warn!("VPN starting failed, please retry: {}", e);
                self.notifier.toast(Toast::FailedToStart);
                return;
            }
        };

        self.state.set_running(true);
        self.prefer_interface(&*interface);
        self.notifier.start();

        let interface = self.interface.insert(interface);
        if let Err(e) = self.forwarder.forward(&**interface, self.events.clone()) {
            error!("Cannot start forwarding: {}", e);
            self.teardown();
            self.notifier.toast(Toast::FailedToStart);
            return;
        }

        self.forwarding = true;
        info!("VPN session started");
    }

    /// Stop the session. Ignored when idle.
    pub fn stop(&mut self) {
        if !self.state.is_running() {
            debug!("VPN not running, ignoring stop request");
            return;
        }

        info!("Stopping VPN session");
        self.teardown();
        info!("VPN session stopped");
    }

    /// Stop then start again with a freshly resolved configuration.
    /// Ignored when idle.
    pub fn restart(&mut self, config: SessionConfiguration) {
        if !self.state.is_running() {
            debug!("VPN not running, ignoring restart request");
            return;
        }

        info!("Restarting VPN session");
        self.stop();
        self.start(Some(config));
    }

    /// Change the disconnect policy of the current session.
    ///
    /// Turning it on while the tunnel is down stops the session at once.
    pub fn set_stop_on_disconnect(&mut self, stop_on_disconnect: bool) {
        let Some(mut config) = self.state.last_configuration() else {
            debug!("No session configuration, ignoring disconnect policy change");
            return;
        };

        config.set_stop_on_disconnect(stop_on_disconnect);
        self.state.set_last_configuration(config);

        if stop_on_disconnect && self.state.is_running() && !self.state.is_connected() {
            info!("Tunnel down, stopping session");
            self.stop();
            self.notifier.toast(Toast::StoppedNoConnection);
        }
    }

    /// React to the forwarding engine's view of the tunnel
    pub fn on_tunnel_event(&mut self, event: TunnelEvent) {
        if !self.state.is_running() {
            debug!("VPN not running, discarding stale tunnel event {:?}", event);
            return;
        }

        match event {
            TunnelEvent::Connected => self.on_tunnel_connected(),
            TunnelEvent::Disconnected => self.on_tunnel_disconnected(),
        }
    }

    /// Bring the controller back to idle after a collaborator panicked
    /// mid-transition.
    pub fn recover(&mut self) {
        if self.state.is_running() || self.interface.is_some() {
            warn!("Resetting VPN session after a failed transition");
            self.teardown();
        }
    }

    fn on_tunnel_connected(&mut self) {
        debug!("Relay tunnel connected");
        self.notifier.set_failure(false);

        let was_connected = self.state.is_connected();
        self.state.set_connected(true);

        if !was_connected && self.policy.borrow().on_connect {
            self.notifier.toast(Toast::Connected);
        }
    }

    fn on_tunnel_disconnected(&mut self) {
        debug!("Relay tunnel disconnected");
        let was_connected = self.state.is_connected();
        let stop_on_disconnect = self
            .state
            .last_configuration()
            .is_some_and(|config| config.stop_on_disconnect());

        if stop_on_disconnect {
            info!("Tunnel lost, stopping session");
            self.stop();
        } else {
            self.notifier.set_failure(true);
        }

        // repeated disconnects while the engine retries stay quiet
        if was_connected && self.policy.borrow().on_disconnect {
            let toast = if stop_on_disconnect {
                Toast::StoppedNoConnection
            } else {
                Toast::ConnectionFailed
            };
            self.notifier.toast(toast);
        }

        self.state.set_connected(false);
    }

    /// Release everything the session holds, then publish idle
    fn teardown(&mut self) {
        self.notifier.stop();
        if std::mem::take(&mut self.forwarding) {
            self.forwarder.stop();
        }
        if let Some(interface) = self.interface.take() {
            self.release(interface);
        }

        self.state.set_connected(false);
        self.state.set_running(false);
    }

    fn establish(&mut self, request: &InterfaceRequest) -> Result<Box<dyn VpnInterface>, InterfaceError> {
        let mut builder = self.platform.builder();
        request.apply(&mut *builder);
        builder.establish()
    }

    fn prefer_interface(&mut self, interface: &dyn VpnInterface) {
        match self.platform.set_underlying_network(interface) {
            Ok(()) => debug!("VPN interface set as underlying network"),
            Err(InterfaceError::Unsupported(reason)) => {
                warn!("Cannot set underlying network: {}", reason);
            }
            Err(e) => warn!("Failed to set underlying network: {}", e),
        }
    }

    fn release(&mut self, interface: Box<dyn VpnInterface>) {
        if let Err(e) = interface.close() {
            warn!("{}", InterfaceError::ReleaseFailed(e));
        }
    }
}
