//! MAC addresses: the six-byte link-layer identifier used throughout the
//! Ethernet/ARP stack.

use byte_struct::{ByteStruct, ByteStructLen};
use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::error::StackError;

/// Standard 6-byte MAC address, split 24/24 as Block ID | Device ID.
///
/// Locally-administered addresses are `[0x02, ...]`, `[0x06, ...]`,
/// `[0x0A, ...]`, `[0x0E, ...]` — the second-least-significant bit of the
/// first byte set, multicast bit clear. [`MacAddr::random`] always produces
/// one of these.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Build a MAC address from its six raw bytes.
    pub fn new(v: [u8; 6]) -> Self {
        MacAddr(v)
    }

    /// The broadcast address: all bits set. Used as the ARP target MAC for a
    /// REQUEST with an unknown target, and treated as "unknown" by a
    /// learning switch.
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);

    /// The all-zero address, used as a sentinel "no address assigned" value.
    pub const ANY: MacAddr = MacAddr([0x00; 6]);

    /// Generate a random, locally-administered, unicast address.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes: [u8; 6] = rng.gen();
        bytes[0] &= 0b1111_1100; // clear multicast bit, clear the other reserved bit
        bytes[0] |= 0b0000_0010; // set locally-administered bit
        MacAddr(bytes)
    }

    /// `true` if this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == MacAddr::BROADCAST
    }

    /// Raw bytes, big-endian (network) order.
    pub fn to_be_bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr(\"{}\")", self)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = StackError;

    /// Accepts six hex pairs separated by `:` or `-`, either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = if s.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = s.split(sep).collect();
        if parts.len() != 6 {
            return Err(StackError::MalformedInput(format!(
                "MAC address '{s}' does not have six colon/hyphen-separated groups"
            )));
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| {
                StackError::MalformedInput(format!("MAC address '{s}' has invalid hex group '{part}'"))
            })?;
        }
        Ok(MacAddr(bytes))
    }
}

impl ByteStructLen for MacAddr {
    const BYTE_LEN: usize = 6;
}

impl ByteStruct for MacAddr {
    fn read_bytes(bytes: &[u8]) -> Self {
        let mut out = [0u8; 6];
        out.copy_from_slice(&bytes[0..6]);
        MacAddr(out)
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..6].copy_from_slice(&self.0);
    }
}
