//! IPv6 header and packet codec. No checksum field: integrity for IPv6
//! itself is left to the link layer and upper-layer protocols.

use byte_struct::{bitfields, ByteStruct, ByteStructLen};

use crate::error::{Result, StackError};

use super::Protocol;

bitfields!(
    /// Version (top nibble, always 6), traffic class (DSCP+ECN), and the
    /// 20-bit flow label, packed into the first 32 bits of the header.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    VersionClassFlow: u32 {
        pub version: 4,
        pub dscp: 6,
        pub ecn: 2,
        pub flow_label: 20
    }
);

/// A 16-byte IPv6 address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Ipv6Addr(pub [u8; 16]);

impl Ipv6Addr {
    /// Build an address from its sixteen octets.
    pub fn new(octets: [u8; 16]) -> Self {
        Ipv6Addr(octets)
    }

    /// The unspecified address `::`.
    pub const UNSPECIFIED: Ipv6Addr = Ipv6Addr([0; 16]);
}

impl ByteStructLen for Ipv6Addr {
    const BYTE_LEN: usize = 16;
}

impl ByteStruct for Ipv6Addr {
    fn read_bytes(bytes: &[u8]) -> Self {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&bytes[0..16]);
        Ipv6Addr(octets)
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..16].copy_from_slice(&self.0);
    }
}

/// The fixed 40-byte IPv6 header.
#[derive(ByteStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[byte_struct_be]
pub struct Ipv6Header {
    /// Version, traffic class, and flow label.
    pub version_class_flow: VersionClassFlow,
    /// Length of the payload following this header, in bytes.
    pub payload_length: u16,
    /// The protocol of the first extension header, or the transport
    /// protocol if none is present.
    pub next_header: Protocol,
    /// Remaining hop count.
    pub hop_limit: u8,
    /// Source address.
    pub source: Ipv6Addr,
    /// Destination address.
    pub destination: Ipv6Addr,
}

const FIXED_HEADER_LEN: usize = 40;

/// A complete IPv6 packet: header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Packet {
    /// The fixed-layout header.
    pub header: Ipv6Header,
    /// Payload bytes (the size declared by `payload_length`).
    pub payload: Vec<u8>,
}

impl Ipv6Packet {
    /// Build a new packet.
    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, next_header: Protocol, hop_limit: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > u16::MAX as usize {
            return Err(StackError::PolicyViolation(format!(
                "IPv6 payload of {} bytes exceeds the 16-bit payload_length field",
                payload.len()
            )));
        }
        let header = Ipv6Header {
            version_class_flow: VersionClassFlow::new().with_version(6).with_dscp(0).with_ecn(0).with_flow_label(0),
            payload_length: payload.len() as u16,
            next_header,
            hop_limit,
            source,
            destination,
        };
        Ok(Ipv6Packet { header, payload })
    }

    /// Encode to wire bytes: header followed by payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FIXED_HEADER_LEN];
        self.header.write_bytes(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a packet, validating the version nibble and that enough
    /// bytes are present for the declared `payload_length`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(StackError::MalformedInput(format!(
                "IPv6 header requires {FIXED_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let header = Ipv6Header::read_bytes(&bytes[0..FIXED_HEADER_LEN]);
        if header.version_class_flow.version() != 6 {
            return Err(StackError::MalformedInput("IPv6 decode called on a non-v6 version nibble".into()));
        }
        let payload_len = header.payload_length as usize;
        if bytes.len() < FIXED_HEADER_LEN + payload_len {
            return Err(StackError::MalformedInput("payload_length exceeds the bytes available".into()));
        }
        let payload = bytes[FIXED_HEADER_LEN..FIXED_HEADER_LEN + payload_len].to_vec();
        Ok(Ipv6Packet { header, payload })
    }

    /// Decrement the hop limit by one. Fails once it would reach zero.
    pub fn decrement_hop_limit(&mut self) -> Result<u8> {
        if self.header.hop_limit <= 1 {
            return Err(StackError::TtlExceeded);
        }
        self.header.hop_limit -= 1;
        Ok(self.header.hop_limit)
    }
}
