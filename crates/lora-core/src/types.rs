//! Identifier newtypes.
//!
//! All identifiers render as uppercase hex and parse from hex of the exact
//! byte length. EUIs are globally unique and immutable; a `DevAddr` is a
//! short network address that is reassigned on every activation.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdError {
    #[error("invalid hex in {kind}: {source}")]
    InvalidHex {
        kind: &'static str,
        source: hex::FromHexError,
    },
    #[error("{kind} must be {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

macro_rules! hex_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// True when every byte is zero.
            pub fn is_empty(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode_upper(self.0))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|source| IdError::InvalidHex {
                    kind: stringify!($name),
                    source,
                })?;
                let arr: [u8; $len] =
                    bytes.as_slice().try_into().map_err(|_| IdError::InvalidLength {
                        kind: stringify!($name),
                        expected: $len,
                        actual: bytes.len(),
                    })?;
                Ok(Self(arr))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }
    };
}

hex_id!(
    /// Application identifier. Part of a device record's primary key.
    AppEui,
    8
);
hex_id!(
    /// Device identifier. Part of a device record's primary key.
    DevEui,
    8
);
hex_id!(
    /// Gateway identifier.
    GatewayEui,
    8
);
hex_id!(
    /// Short network address assigned on activation. All-zero means
    /// "not activated".
    DevAddr,
    4
);
hex_id!(
    /// Network session key.
    NwkSKey,
    16
);

impl DevAddr {
    /// Extract the DevAddr from a LoRaWAN data frame (MHDR | DevAddr LE | ...).
    pub fn from_mac_payload(payload: &[u8]) -> Option<Self> {
        let raw = payload.get(1..5)?;
        Some(Self([raw[3], raw[2], raw[1], raw[0]]))
    }
}

/// A DevAddr prefix announced by a broker: the first `length` bits of `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevAddrPrefix {
    pub addr: DevAddr,
    pub length: u8,
}

impl DevAddrPrefix {
    pub fn new(addr: DevAddr, length: u8) -> Self {
        Self {
            addr,
            length: length.min(32),
        }
    }

    /// Does `addr` fall inside this prefix?
    pub fn matches(&self, addr: &DevAddr) -> bool {
        if self.length == 0 {
            return true;
        }
        let mask = u32::MAX << (32 - u32::from(self.length));
        let prefix = u32::from_be_bytes(self.addr.0) & mask;
        u32::from_be_bytes(addr.0) & mask == prefix
    }
}

impl fmt::Display for DevAddrPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.length)
    }
}
