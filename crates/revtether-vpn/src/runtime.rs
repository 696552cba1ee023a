//! Controller runtime - one thread, two queues.
//!
//! Start/stop requests go through a bounded queue; tunnel events from the
//! forwarding engine go through their own unbounded one. Both are consumed
//! on the controller thread, with panic isolation so a misbehaving
//! collaborator cannot take the process down.
//!
//! Before each request, every tunnel event already posted is handled
//! first, so a request never overtakes an event that happened before it.

use crate::controller::{Collaborators, ControllerOptions, VpnSessionController};
use crate::forwarder::{TunnelEvent, TunnelEventSink};
use crate::state::SessionState;
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use revtether_config::SessionConfiguration;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// Capacity of the request queue
pub const QUEUE_CAPACITY: usize = 64;

/// Inputs of the controller
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// Start a session (`None`: default configuration)
    Start(Option<SessionConfiguration>),
    /// Stop the current session
    Stop,
    /// Stop and start again with a freshly resolved configuration
    Restart(SessionConfiguration),
    /// Change the disconnect policy of the current session
    SetStopOnDisconnect(bool),
    /// Event from the forwarding engine
    Tunnel(TunnelEvent),
    /// Stop the session and exit the controller thread
    Shutdown,
}

/// Handle to a running controller
pub struct SessionHandle {
    tx: Sender<ControlMessage>,
    state: Arc<SessionState>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn the controller thread
    pub fn spawn(
        collaborators: Collaborators,
        options: ControllerOptions,
    ) -> Result<Self, SessionError> {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let (events_tx, events_rx) = unbounded();
        let controller =
            VpnSessionController::new(collaborators, options, TunnelEventSink::new(events_tx));
        let state = controller.state();

        let worker = thread::Builder::new()
            .name("vpn-controller".to_string())
            .spawn(move || {
                info!("VPN controller started");
                run_controller_loop(controller, rx, events_rx);
                info!("VPN controller stopped");
            })
            .map_err(SessionError::Spawn)?;

        Ok(Self {
            tx,
            state,
            worker: Some(worker),
        })
    }

    /// Request a session start
    pub fn start(&self, config: Option<SessionConfiguration>) -> Result<(), SessionError> {
        self.send(ControlMessage::Start(config))
    }

    /// Request a session stop
    pub fn stop(&self) -> Result<(), SessionError> {
        self.send(ControlMessage::Stop)
    }

    /// Request a restart of a running session.
    ///
    /// Pass a configuration resolved from the current preferences; the
    /// previous one is not reused.
    pub fn restart(&self, config: SessionConfiguration) -> Result<(), SessionError> {
        self.send(ControlMessage::Restart(config))
    }

    /// Update the disconnect policy of the running session
    pub fn set_stop_on_disconnect(&self, stop_on_disconnect: bool) -> Result<(), SessionError> {
        self.send(ControlMessage::SetStopOnDisconnect(stop_on_disconnect))
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    /// Stop any session and wait for the controller thread to exit
    pub fn shutdown(mut self) -> Result<(), SessionError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), SessionError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        // an exited controller already dropped its receiver
        let _ = self.tx.send(ControlMessage::Shutdown);
        worker.join().map_err(|_| SessionError::Panicked)
    }

    fn send(&self, message: ControlMessage) -> Result<(), SessionError> {
        self.tx.send(message).map_err(|_| SessionError::ControllerGone)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            error!("{}", e);
        }
    }
}

/// Main controller loop with panic isolation.
fn run_controller_loop(
    mut controller: VpnSessionController,
    requests: Receiver<ControlMessage>,
    events: Receiver<TunnelEvent>,
) {
    loop {
        // the controller holds the event sender, so only requests can close
        let next = select! {
            recv(events) -> event => event.map(Incoming::Event),
            recv(requests) -> request => request.map(Incoming::Request),
        };

        let request = match next {
            Ok(Incoming::Event(event)) => {
                dispatch(&mut controller, ControlMessage::Tunnel(event));
                continue;
            }
            Ok(Incoming::Request(request)) => request,
            Err(_) => break,
        };

        for event in events.try_iter() {
            dispatch(&mut controller, ControlMessage::Tunnel(event));
        }

        if !dispatch(&mut controller, request) {
            debug!("VPN controller received shutdown");
            break;
        }
    }
}

enum Incoming {
    Event(TunnelEvent),
    Request(ControlMessage),
}

/// Handle one message. Returns false once the loop should exit.
fn dispatch(controller: &mut VpnSessionController, message: ControlMessage) -> bool {
    let result = panic::catch_unwind(AssertUnwindSafe(|| controller.handle(message)));

    match result {
        Ok(keep_running) => keep_running,
        Err(panic_info) => {
            let error_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            error!("VPN controller panicked while handling a message: {}", error_msg);

            if panic::catch_unwind(AssertUnwindSafe(|| controller.recover())).is_err() {
                error!("VPN controller panicked again while recovering");
            }
            true
        }
    }
}

/// Runtime errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("VPN controller is not running")]
    ControllerGone,

    #[error("Failed to spawn controller thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("VPN controller thread panicked")]
    Panicked,
}
