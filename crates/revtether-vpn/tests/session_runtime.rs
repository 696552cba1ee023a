use revtether_config::{NetworkRange, NotificationPolicy, SessionConfiguration};
use revtether_vpn::{
    Collaborators, ControllerOptions, Forwarder, ForwarderError, IndicatorStatus, InterfaceBuilder,
    InterfaceError, Platform, SessionFlags, SessionHandle, SessionState, StatusSurface,
    TunnelEventSink, VpnInterface,
};
use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Establish(Vec<NetworkRange>),
    Show(IndicatorStatus),
    Remove,
    Toast(String),
    Forward,
    ForwarderStop,
    Close,
}

type Log = Arc<Mutex<Vec<Call>>>;

struct TestPlatform {
    log: Log,
}

struct TestBuilder {
    log: Log,
    routes: Vec<NetworkRange>,
}

struct TestInterface {
    log: Log,
}

/// Stands in for the forwarding engine: hands its sink to the test
struct TestForwarder {
    log: Log,
    sink: Arc<Mutex<Option<TunnelEventSink>>>,
}

struct TestSurface {
    log: Log,
}

impl Platform for TestPlatform {
    fn builder(&mut self) -> Box<dyn InterfaceBuilder> {
        Box::new(TestBuilder {
            log: self.log.clone(),
            routes: Vec::new(),
        })
    }

    fn set_underlying_network(&mut self, _interface: &dyn VpnInterface) -> Result<(), InterfaceError> {
        Err(InterfaceError::Unsupported("test platform".into()))
    }
}

impl InterfaceBuilder for TestBuilder {
    fn add_address(&mut self, _address: NetworkRange) {}
    fn add_route(&mut self, route: NetworkRange) {
        self.routes.push(route);
    }
    fn add_dns_server(&mut self, _server: IpAddr) {}
    fn add_disallowed_application(&mut self, _app: &str) -> Result<(), InterfaceError> {
        Ok(())
    }
    fn set_mtu(&mut self, _mtu: u16) {}
    fn set_session(&mut self, _name: &str) {}
    fn set_blocking(&mut self, _blocking: bool) {}

    fn establish(self: Box<Self>) -> Result<Box<dyn VpnInterface>, InterfaceError> {
        self.log.lock().unwrap().push(Call::Establish(self.routes));
        Ok(Box::new(TestInterface { log: self.log }))
    }
}

impl VpnInterface for TestInterface {
    fn packet_stream(&self) -> io::Result<File> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "test interface"))
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        self.log.lock().unwrap().push(Call::Close);
        Ok(())
    }
}

impl Forwarder for TestForwarder {
    fn forward(&mut self, _interface: &dyn VpnInterface, events: TunnelEventSink) -> Result<(), ForwarderError> {
        self.log.lock().unwrap().push(Call::Forward);
        *self.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().push(Call::ForwarderStop);
    }
}

impl StatusSurface for TestSurface {
    fn show_indicator(&mut self, status: IndicatorStatus) {
        self.log.lock().unwrap().push(Call::Show(status));
    }

    fn remove_indicator(&mut self) {
        self.log.lock().unwrap().push(Call::Remove);
    }

    fn show_toast(&mut self, text: &str) {
        self.log.lock().unwrap().push(Call::Toast(text.to_string()));
    }
}

struct Setup {
    handle: SessionHandle,
    log: Log,
    sink: Arc<Mutex<Option<TunnelEventSink>>>,
    _policy: watch::Sender<NotificationPolicy>,
}

impl Setup {
    fn new() -> Self {
        let log: Log = Arc::default();
        let sink = Arc::new(Mutex::new(None));
        let (policy, policy_rx) = watch::channel(NotificationPolicy {
            on_connect: true,
            on_disconnect: true,
        });

        let collaborators = Collaborators {
            platform: Box::new(TestPlatform { log: log.clone() }),
            forwarder: Box::new(TestForwarder {
                log: log.clone(),
                sink: sink.clone(),
            }),
            surface: Box::new(TestSurface { log: log.clone() }),
        };
        let options = ControllerOptions {
            policy: Some(policy_rx),
            ..Default::default()
        };
        let handle = SessionHandle::spawn(collaborators, options).unwrap();

        Self {
            handle,
            log,
            sink,
            _policy: policy,
        }
    }

    /// Sink handed to the forwarder by the latest start
    fn engine(&self) -> TunnelEventSink {
        wait_until(|| self.sink.lock().unwrap().is_some());
        self.sink.lock().unwrap().clone().unwrap()
    }

    fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for controller");
        thread::sleep(Duration::from_millis(2));
    }
}

fn wait_for(state: &SessionState, expected: SessionFlags) {
    wait_until(|| state.flags() == expected);
}

const IDLE: SessionFlags = SessionFlags { running: false, connected: false };
const ACTIVE: SessionFlags = SessionFlags { running: true, connected: false };
const CONNECTED: SessionFlags = SessionFlags { running: true, connected: true };

fn config(stop_on_disconnect: bool) -> SessionConfiguration {
    SessionConfiguration::new(
        vec![],
        vec![NetworkRange::parse("192.168.42.0/24").unwrap()],
        vec![],
        stop_on_disconnect,
        false,
    )
}

#[test]
fn test_session_lifecycle() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(Some(config(false))).unwrap();
    wait_for(&state, ACTIVE);

    setup.engine().connected();
    wait_for(&state, CONNECTED);

    setup.engine().disconnected();
    wait_for(&state, ACTIVE);

    setup.engine().connected();
    wait_for(&state, CONNECTED);

    setup.handle.stop().unwrap();
    wait_for(&state, IDLE);

    assert_eq!(
        setup.calls(),
        vec![
            Call::Establish(vec![NetworkRange::parse("192.168.42.0/24").unwrap()]),
            Call::Show(IndicatorStatus::Connected),
            Call::Forward,
            Call::Toast("Revtether connection established".into()),
            Call::Show(IndicatorStatus::Failure),
            Call::Toast("Revtether connection failed".into()),
            Call::Show(IndicatorStatus::Connected),
            Call::Toast("Revtether connection established".into()),
            Call::Remove,
            Call::ForwarderStop,
            Call::Close,
        ]
    );
    setup.handle.shutdown().unwrap();
}

#[test]
fn test_stop_on_disconnect() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(Some(config(true))).unwrap();
    wait_for(&state, ACTIVE);
    setup.engine().connected();
    wait_for(&state, CONNECTED);

    setup.engine().disconnected();
    wait_for(&state, IDLE);
    wait_until(|| setup.calls().last() != Some(&Call::Close));

    let calls = setup.calls();
    assert_eq!(
        calls[calls.len() - 4..],
        [
            Call::Remove,
            Call::ForwarderStop,
            Call::Close,
            Call::Toast("Revtether stopped due to no connection".into()),
        ]
    );
}

#[test]
fn test_stale_events_after_stop() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(None).unwrap();
    wait_for(&state, ACTIVE);
    let engine = setup.engine();

    setup.handle.stop().unwrap();
    wait_for(&state, IDLE);

    engine.connected();
    engine.disconnected();
    // queued behind the stale events
    setup.handle.start(None).unwrap();
    wait_for(&state, ACTIVE);

    let toasts = setup
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Toast(_)))
        .count();
    assert_eq!(toasts, 0);
    assert!(!state.is_connected());
}

#[test]
fn test_concurrent_starts_collapse() {
    let setup = Setup::new();
    let state = setup.handle.state();

    thread::scope(|scope| {
        for i in 0..8 {
            let handle = &setup.handle;
            scope.spawn(move || handle.start(Some(config(i % 2 == 0))).unwrap());
        }
    });
    setup.handle.stop().unwrap();
    wait_for(&state, IDLE);

    assert_eq!(setup.count(&Call::Forward), 1);
    assert_eq!(setup.count(&Call::ForwarderStop), 1);
}

#[test]
fn test_restart_through_queue() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(Some(config(false))).unwrap();
    wait_for(&state, ACTIVE);
    setup.handle.restart(config(true)).unwrap();
    wait_until(|| setup.count(&Call::Forward) == 2);
    assert_eq!(setup.count(&Call::ForwarderStop), 1);

    setup.handle.stop().unwrap();
    wait_for(&state, IDLE);
    assert_eq!(state.last_configuration(), Some(config(true)));
}

#[test]
fn test_stop_on_disconnect_enabled_while_tunnel_down() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(Some(config(false))).unwrap();
    wait_for(&state, ACTIVE);

    setup.handle.set_stop_on_disconnect(true).unwrap();
    wait_for(&state, IDLE);
    wait_until(|| {
        setup.calls().last() == Some(&Call::Toast("Revtether stopped due to no connection".into()))
    });
    assert!(state.last_configuration().unwrap().stop_on_disconnect());
}

#[test]
fn test_shutdown_stops_active_session() {
    let setup = Setup::new();
    let state = setup.handle.state();

    setup.handle.start(None).unwrap();
    wait_for(&state, ACTIVE);

    let Setup { handle, log, .. } = setup;
    handle.shutdown().unwrap();

    assert_eq!(state.flags(), IDLE);
    assert!(log.lock().unwrap().contains(&Call::ForwarderStop));
}

#[tokio::test]
async fn test_observers_are_notified() {
    let setup = Setup::new();
    let state = setup.handle.state();
    let mut flags = state.subscribe();

    setup.handle.start(None).unwrap();
    tokio::time::timeout(Duration::from_secs(5), flags.wait_for(|f| f.running))
        .await
        .expect("timed out")
        .unwrap();

    setup.engine().connected();
    tokio::time::timeout(Duration::from_secs(5), flags.wait_for(|f| f.connected))
        .await
        .expect("timed out")
        .unwrap();

    setup.handle.stop().unwrap();
    tokio::time::timeout(Duration::from_secs(5), flags.wait_for(|f| !f.running))
        .await
        .expect("timed out")
        .unwrap();
    assert!(!state.is_connected());
}
