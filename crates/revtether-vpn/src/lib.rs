//! Revtether VPN - reverse-tethering session control
//!
//! Owns the lifecycle of the local virtual interface that captures the
//! device's traffic and hands it to a forwarding engine, which relays it
//! to the host over a separate tunnel.
//!
//! # Architecture
//!
//! ```text
//!  start/stop ──┐
//!               ▼
//!        ┌─────────────┐  establish   ┌──────────┐
//!        │ controller  │─────────────▶│ Platform │ (OS VPN API)
//!        │  (1 thread) │              └──────────┘
//!        │             │  forward     ┌───────────┐
//!        │             │─────────────▶│ Forwarder │──▶ relay tunnel
//!        └─────────────┘              └─────┬─────┘
//!           ▲      │                        │ connected / disconnected
//!           │      ▼                        │
//!           │  SessionState (watch)         │
//!           └───────────────────────────────┘
//! ```
//!
//! Requests and tunnel events are handled one at a time on the controller
//! thread. Events already posted are handled before the next request, so
//! tunnel events that arrive after a stop are recognized as stale and
//! dropped.

mod controller;
mod forwarder;
mod interface;
mod notifier;
mod request;
mod runtime;
mod state;

pub use controller::{Collaborators, ControllerOptions, VpnSessionController};
pub use forwarder::{Forwarder, ForwarderError, TunnelEvent, TunnelEventSink};
pub use interface::{InterfaceBuilder, InterfaceError, Platform, VpnInterface};
pub use notifier::{ConnectionEventNotifier, IndicatorStatus, StatusSurface, Toast};
pub use request::{FALLBACK_DNS, InterfaceRequest, InterfaceSettings};
pub use runtime::{ControlMessage, QUEUE_CAPACITY, SessionError, SessionHandle};
pub use state::{SessionFlags, SessionPhase, SessionState};
