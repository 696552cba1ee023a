//! Forwarding Engine Boundary
//!
//! The engine relays packets between the interface and the relay tunnel on
//! its own threads. It reports back only through a [`TunnelEventSink`].

use crate::interface::VpnInterface;
use crossbeam_channel::Sender;
use std::io;
use tracing::debug;

/// Tunnel health signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelEvent {
    Connected,
    Disconnected,
}

/// Packet-forwarding engine
pub trait Forwarder: Send {
    /// Start relaying. Events may arrive any number of times, in any order.
    fn forward(
        &mut self,
        interface: &dyn VpnInterface,
        events: TunnelEventSink,
    ) -> Result<(), ForwarderError>;

    /// Stop relaying and release everything tied to the interface.
    ///
    /// Called at most once per successful `forward`; must return in
    /// bounded time.
    fn stop(&mut self);
}

/// Where the engine posts tunnel events.
///
/// Events travel on their own unbounded channel, apart from start/stop
/// requests. Posting never blocks: the controller may itself be waiting in
/// [`Forwarder::stop`] while the engine winds down.
#[derive(Debug, Clone)]
pub struct TunnelEventSink {
    tx: Sender<TunnelEvent>,
}

impl TunnelEventSink {
    pub fn new(tx: Sender<TunnelEvent>) -> Self {
        Self { tx }
    }

    pub fn connected(&self) {
        self.post(TunnelEvent::Connected);
    }

    pub fn disconnected(&self) {
        self.post(TunnelEvent::Disconnected);
    }

    pub fn post(&self, event: TunnelEvent) {
        if self.tx.send(event).is_err() {
            debug!("Controller gone, dropping tunnel event {:?}", event);
        }
    }
}

/// Forwarder errors
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("Failed to start forwarding: {0}")]
    Start(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_sink_posts_events_in_order() {
        let (tx, rx) = unbounded();
        let sink = TunnelEventSink::new(tx);

        sink.connected();
        sink.disconnected();
        sink.connected();

        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![TunnelEvent::Connected, TunnelEvent::Disconnected, TunnelEvent::Connected]
        );
    }

    #[test]
    fn test_sink_survives_closed_controller() {
        let (tx, rx) = unbounded();
        let sink = TunnelEventSink::new(tx);

        drop(rx);
        sink.disconnected();
    }
}
