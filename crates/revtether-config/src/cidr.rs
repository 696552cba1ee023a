//! Network Ranges
//!
//! An address prefix in CIDR notation (`address/prefix_length`), used for
//! the routes captured by the virtual interface.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// Address prefix (IPv4 or IPv6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRange {
    address: IpAddr,
    prefix_length: u8,
}

impl NetworkRange {
    /// Create a range, checking the prefix against the address width
    pub fn new(address: IpAddr, prefix_length: u8) -> Result<Self, RangeError> {
        let max = max_prefix(&address);
        if prefix_length > max {
            return Err(RangeError::PrefixOutOfRange {
                prefix: prefix_length.into(),
                max,
            });
        }
        Ok(Self {
            address,
            prefix_length,
        })
    }

    /// `0.0.0.0/0`: route the whole IPv4 traffic
    pub fn everything() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            prefix_length: 0,
        }
    }

    /// Single-address range (`/32` or `/128`)
    pub fn host(address: IpAddr) -> Self {
        Self {
            prefix_length: max_prefix(&address),
            address,
        }
    }

    /// Parse `address/prefix_length`
    pub fn parse(text: &str) -> Result<Self, RangeError> {
        let (address, prefix) = text
            .split_once('/')
            .ok_or_else(|| RangeError::MissingPrefix(text.to_string()))?;

        let address: IpAddr = address
            .parse()
            .map_err(|_| RangeError::InvalidAddress(address.to_string()))?;

        // u32 so that "/300" is reported as out of range rather than unparsable
        let prefix: u32 = prefix
            .parse()
            .map_err(|_| RangeError::InvalidPrefix(prefix.to_string()))?;

        let max = max_prefix(&address);
        if prefix > u32::from(max) {
            return Err(RangeError::PrefixOutOfRange { prefix, max });
        }

        Ok(Self {
            address,
            prefix_length: prefix as u8,
        })
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Check whether `addr` falls inside this range.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.address, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = mask_u32(self.prefix_length);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = mask_u128(self.prefix_length);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

fn max_prefix(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)
    }
}

impl FromStr for NetworkRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NetworkRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Invalid range format
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid range format: missing prefix length in {0:?}")]
    MissingPrefix(String),

    #[error("Invalid range format: bad address {0:?}")]
    InvalidAddress(String),

    #[error("Invalid range format: bad prefix length {0:?}")]
    InvalidPrefix(String),

    #[error("Invalid range format: prefix length {prefix} exceeds {max}")]
    PrefixOutOfRange { prefix: u32, max: u8 },
}
