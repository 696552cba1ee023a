//! Virtual Interface Boundary
//!
//! The operating system owns interface establishment. The controller only
//! talks to it through these traits, the same way a platform VPN API hands
//! out a builder and returns a packet-stream handle.

use revtether_config::NetworkRange;
use std::fs::File;
use std::io;
use std::net::IpAddr;

/// OS facilities needed by the session controller
pub trait Platform: Send {
    /// Fresh builder for one establishment attempt
    fn builder(&mut self) -> Box<dyn InterfaceBuilder>;

    /// Mark the interface as the preferred network path.
    ///
    /// Returns [`InterfaceError::Unsupported`] on systems without the
    /// capability.
    fn set_underlying_network(&mut self, interface: &dyn VpnInterface) -> Result<(), InterfaceError>;
}

/// Accumulates interface parameters before establishment
pub trait InterfaceBuilder {
    fn add_address(&mut self, address: NetworkRange);

    fn add_route(&mut self, route: NetworkRange);

    fn add_dns_server(&mut self, server: IpAddr);

    /// Exclude an application. Unknown identifiers yield
    /// [`InterfaceError::UnknownApplication`].
    fn add_disallowed_application(&mut self, app: &str) -> Result<(), InterfaceError>;

    fn set_mtu(&mut self, mtu: u16);

    fn set_session(&mut self, name: &str);

    fn set_blocking(&mut self, blocking: bool);

    /// Create the interface. Fails when the OS declines or the client is
    /// not authorized.
    fn establish(self: Box<Self>) -> Result<Box<dyn VpnInterface>, InterfaceError>;
}

/// An established virtual interface
pub trait VpnInterface: Send {
    /// Handle to the interface's packet stream, for the forwarder
    fn packet_stream(&self) -> io::Result<File>;

    /// Release the interface
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Interface errors
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("Interface establishment failed: {0}")]
    EstablishmentFailed(String),

    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    #[error("Interface release failed: {0}")]
    ReleaseFailed(#[from] io::Error),
}
