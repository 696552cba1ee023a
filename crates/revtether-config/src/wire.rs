//! Configuration Wire Format
//!
//! Binary encoding used to hand a [`SessionConfiguration`] across a
//! process boundary.
//!
//! # Layout (big-endian)
//!
//! ```text
//! u32 dns_count    | per server: u8 len (4|16), address bytes
//! u32 route_count  | per route:  u8 len (4|16), address bytes, u8 prefix
//! u32 app_count    | per app:    u32 len, UTF-8 bytes
//! u8  stop_on_disconnect (0|1)
//! u8  started_by_server  (0|1)
//! ```
//!
//! A record that does not decode cleanly is rejected as a whole. Defaults
//! are never substituted for corrupt input.

use crate::cidr::NetworkRange;
use crate::config::SessionConfiguration;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Encode a configuration
pub fn encode(config: &SessionConfiguration) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);

    buf.extend_from_slice(&(config.dns_servers().len() as u32).to_be_bytes());
    for addr in config.dns_servers() {
        put_address(&mut buf, addr);
    }

    buf.extend_from_slice(&(config.routes().len() as u32).to_be_bytes());
    for route in config.routes() {
        put_address(&mut buf, &route.address());
        buf.push(route.prefix_length());
    }

    buf.extend_from_slice(&(config.blocked_apps().len() as u32).to_be_bytes());
    for app in config.blocked_apps() {
        buf.extend_from_slice(&(app.len() as u32).to_be_bytes());
        buf.extend_from_slice(app.as_bytes());
    }

    buf.push(config.stop_on_disconnect() as u8);
    buf.push(config.is_started_by_server() as u8);
    buf
}

/// Decode a configuration
pub fn decode(bytes: &[u8]) -> Result<SessionConfiguration, WireError> {
    let mut reader = Reader { buf: bytes, pos: 0 };

    // smallest DNS entry: 1 length byte + 4 address bytes
    let dns_count = reader.count(5)?;
    let mut dns_servers = Vec::with_capacity(dns_count);
    for _ in 0..dns_count {
        dns_servers.push(reader.address()?);
    }

    // smallest route: 1 + 4 + 1 prefix byte
    let route_count = reader.count(6)?;
    let mut routes = Vec::with_capacity(route_count);
    for _ in 0..route_count {
        let address = reader.address()?;
        let prefix = reader.u8()?;
        let route = NetworkRange::new(address, prefix)
            .map_err(|_| WireError::InvalidPrefix(prefix))?;
        routes.push(route);
    }

    let app_count = reader.count(4)?;
    let mut blocked_apps = Vec::with_capacity(app_count);
    for _ in 0..app_count {
        let len = reader.u32()? as usize;
        let raw = reader.take(len)?;
        let app = std::str::from_utf8(raw).map_err(|_| WireError::InvalidUtf8)?;
        blocked_apps.push(app.to_string());
    }

    let stop_on_disconnect = reader.flag()?;
    let started_by_server = reader.flag()?;

    if reader.remaining() != 0 {
        return Err(WireError::TrailingBytes(reader.remaining()));
    }

    Ok(SessionConfiguration::new(
        dns_servers,
        routes,
        blocked_apps,
        stop_on_disconnect,
        started_by_server,
    ))
}

fn put_address(buf: &mut Vec<u8>, addr: &IpAddr) {
    match addr {
        IpAddr::V4(v4) => {
            buf.push(4);
            buf.extend_from_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            buf.push(16);
            buf.extend_from_slice(&v6.octets());
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < len {
            return Err(WireError::Truncated {
                offset: self.pos,
                needed: len,
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Read an element count, rejecting counts the remaining input
    /// cannot possibly hold.
    fn count(&mut self, min_element_size: usize) -> Result<usize, WireError> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_element_size) > self.remaining() {
            return Err(WireError::CountTooLarge(count as u32));
        }
        Ok(count)
    }

    fn address(&mut self) -> Result<IpAddr, WireError> {
        let len = self.u8()?;
        match len {
            4 => {
                let raw = self.take(4)?;
                Ok(IpAddr::V4(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3])))
            }
            16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(self.take(16)?);
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            other => Err(WireError::InvalidAddressLength(other)),
        }
    }

    fn flag(&mut self) -> Result<bool, WireError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidFlag(other)),
        }
    }
}

/// Corrupt configuration record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("Record truncated at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("Invalid address length: {0}")]
    InvalidAddressLength(u8),

    #[error("Invalid prefix length: {0}")]
    InvalidPrefix(u8),

    #[error("Application identifier is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid flag byte: {0}")]
    InvalidFlag(u8),

    #[error("Element count {0} exceeds record size")]
    CountTooLarge(u32),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}
