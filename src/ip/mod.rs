//! IPv4 and IPv6 header codecs: fixed-layout fields via `byte_struct`,
//! Internet checksum (IPv4 only), TTL/hop-limit management, and dispatch
//! between the two versions by the top nibble of the first byte.

pub mod v4;
pub mod v6;

use crate::enum_with_unknown;
use crate::error::{Result, StackError};

pub use v4::Ipv4Packet;
pub use v6::Ipv6Packet;

enum_with_unknown! {
    /// The encapsulated (transport-layer) protocol carried by an IP packet.
    pub enum Protocol(u8) {
        /// Internet Control Message Protocol.
        Icmp = 1,
        /// Internet Group Management Protocol.
        Igmp = 2,
        /// Transmission Control Protocol.
        Tcp = 6,
        /// User Datagram Protocol.
        Udp = 17,
        /// IPv6 encapsulation.
        Encap = 41,
        /// Open Shortest Path First.
        Ospf = 89,
        /// Stream Control Transmission Protocol.
        Sctp = 132,
    }
}

impl byte_struct::ByteStructLen for Protocol {
    const BYTE_LEN: usize = 1;
}

impl byte_struct::ByteStruct for Protocol {
    fn read_bytes(bytes: &[u8]) -> Self {
        Protocol::from(bytes[0])
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0] = u8::from(*self);
    }
}

/// A decoded IP packet of either version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpPacket {
    /// An IPv4 packet.
    V4(Ipv4Packet),
    /// An IPv6 packet.
    V6(Ipv6Packet),
}

impl IpPacket {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            IpPacket::V4(p) => p.encode(),
            IpPacket::V6(p) => p.encode(),
        }
    }

    /// Dispatch on the top nibble of the first byte to decode either an
    /// IPv4 or IPv6 packet. Any other version nibble fails.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(StackError::MalformedInput("empty IP packet".into()));
        }
        match bytes[0] >> 4 {
            4 => Ok(IpPacket::V4(Ipv4Packet::decode(bytes)?)),
            6 => Ok(IpPacket::V6(Ipv6Packet::decode(bytes)?)),
            other => Err(StackError::MalformedInput(format!("unsupported IP version nibble {other}"))),
        }
    }

    /// The encapsulated transport protocol, whichever version this packet is.
    pub fn protocol(&self) -> Protocol {
        match self {
            IpPacket::V4(p) => p.header.protocol,
            IpPacket::V6(p) => p.header.next_header,
        }
    }
}
