//! IPv4 header and packet codec.

use byte_struct::{bitfields, ByteStruct, ByteStructLen};

use crate::arp::Ipv4Addr;
use crate::error::{Result, StackError};
use crate::toolkit;

use super::Protocol;

bitfields!(
    /// Version (top nibble) and Internet Header Length in 32-bit words
    /// (bottom nibble).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    VersionAndIhl: u8 {
        pub version: 4,
        pub ihl: 4
    }
);

bitfields!(
    /// Reserved bit (must be zero), Don't-Fragment, More-Fragments, and the
    /// 13-bit fragment offset.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    Fragmentation: u16 {
        reserved: 1,
        pub do_not_fragment: 1,
        pub more_fragments: 1,
        pub offset: 13
    }
);

impl Fragmentation {
    fn unfragmented() -> Self {
        Fragmentation::new().with_do_not_fragment(1).with_more_fragments(0).with_offset(0)
    }
}

/// Differentiated Services Code Point (6 bits) and Explicit Congestion
/// Notification (2 bits), packed into the header's second byte.
bitfields!(
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    DscpEcn: u8 {
        pub dscp: 6,
        pub ecn: 2
    }
);

/// Fixed 20-byte IPv4 header (options are carried alongside, not as part
/// of this `byte_struct`-derived fixed layout).
#[derive(ByteStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[byte_struct_be]
pub struct Ipv4Header {
    /// Version (always 4) and Internet Header Length.
    pub version_and_ihl: VersionAndIhl,
    /// DSCP and ECN.
    pub dscp_ecn: DscpEcn,
    /// Total length: header (including options) plus payload, in bytes.
    pub total_length: u16,
    /// Identification, used for fragment reassembly (unused here).
    pub identification: u16,
    /// Flags and fragment offset.
    pub fragmentation: Fragmentation,
    /// Time to live.
    pub ttl: u8,
    /// Encapsulated protocol.
    pub protocol: Protocol,
    /// Header checksum.
    pub checksum: u16,
    /// Source address.
    pub source: Ipv4Addr,
    /// Destination address.
    pub destination: Ipv4Addr,
}

const FIXED_HEADER_LEN: usize = 20;

impl Ipv4Header {
    /// IHL in bytes (`ihl * 4`).
    pub fn header_len(&self) -> usize {
        self.version_and_ihl.ihl() as usize * 4
    }
}

/// A complete IPv4 packet: header, options, and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    /// The fixed-layout header.
    pub header: Ipv4Header,
    /// Zero or more 32-bit option words, raw.
    pub options: Vec<[u8; 4]>,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// Build a new packet with a freshly computed IHL, total length and
    /// checksum. `ttl` defaults are the caller's responsibility.
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: Protocol, ttl: u8, payload: Vec<u8>) -> Result<Self> {
        Self::with_options(source, destination, protocol, ttl, vec![], payload)
    }

    /// As [`Ipv4Packet::new`], with explicit 32-bit option words.
    pub fn with_options(
        source: Ipv4Addr,
        destination: Ipv4Addr,
        protocol: Protocol,
        ttl: u8,
        options: Vec<[u8; 4]>,
        payload: Vec<u8>,
    ) -> Result<Self> {
        let ihl = (FIXED_HEADER_LEN + options.len() * 4) / 4;
        if ihl > 0xF {
            return Err(StackError::PolicyViolation(format!(
                "IPv4 IHL {ihl} exceeds the 4-bit field's maximum of 15"
            )));
        }
        let total_length = (ihl * 4 + payload.len()) as u16;
        let mut header = Ipv4Header {
            version_and_ihl: VersionAndIhl::new().with_version(4).with_ihl(ihl as u8),
            dscp_ecn: DscpEcn::new(),
            total_length,
            identification: 0,
            fragmentation: Fragmentation::unfragmented(),
            ttl,
            protocol,
            checksum: 0,
            source,
            destination,
        };
        header.checksum = compute_checksum(&header, &options);
        Ok(Ipv4Packet { header, options, payload })
    }

    fn header_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; FIXED_HEADER_LEN];
        self.header.write_bytes(&mut buf);
        for option in &self.options {
            buf.extend_from_slice(option);
        }
        buf
    }

    /// Encode to wire bytes: header, options, payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = self.header_bytes();
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode a packet, validating `total_length`, options length, and the
    /// header checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(StackError::MalformedInput(format!(
                "IPv4 header requires {FIXED_HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let header = Ipv4Header::read_bytes(&bytes[0..FIXED_HEADER_LEN]);
        if header.version_and_ihl.version() != 4 {
            return Err(StackError::MalformedInput("IPv4 decode called on a non-v4 version nibble".into()));
        }
        if header.total_length < FIXED_HEADER_LEN as u16 {
            return Err(StackError::MalformedInput(format!(
                "total_length {} is less than the minimum header size",
                header.total_length
            )));
        }
        let header_len = header.header_len();
        if header_len < FIXED_HEADER_LEN {
            return Err(StackError::MalformedInput(format!(
                "IHL implies a header shorter than {FIXED_HEADER_LEN} bytes"
            )));
        }
        if bytes.len() < header_len {
            return Err(StackError::MalformedInput("declared IHL exceeds the bytes available".into()));
        }
        let options = bytes[FIXED_HEADER_LEN..header_len]
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();

        if toolkit::internet_checksum(&bytes[0..header_len]) != 0 {
            return Err(StackError::IntegrityFailure("IPv4 header checksum mismatch".into()));
        }

        let payload_len = header.total_length as usize - header_len;
        if bytes.len() < header_len + payload_len {
            return Err(StackError::MalformedInput("total_length exceeds the bytes available".into()));
        }
        let payload = bytes[header_len..header_len + payload_len].to_vec();

        Ok(Ipv4Packet { header, options, payload })
    }

    /// Decrement TTL by one, recomputing the header checksum with the
    /// checksum field zeroed before recomputation. Fails if TTL would
    /// reach zero.
    pub fn decrement_ttl(&mut self) -> Result<u8> {
        if self.header.ttl <= 1 {
            return Err(StackError::TtlExceeded);
        }
        self.header.ttl -= 1;
        self.header.checksum = 0;
        self.header.checksum = compute_checksum(&self.header, &self.options);
        Ok(self.header.ttl)
    }

    /// `true` if the header checksum is valid over the packet's current
    /// header and options.
    pub fn checksum_valid(&self) -> bool {
        let mut buf = vec![0u8; FIXED_HEADER_LEN];
        self.header.write_bytes(&mut buf);
        for option in &self.options {
            buf.extend_from_slice(option);
        }
        toolkit::internet_checksum(&buf) == 0
    }
}

fn compute_checksum(header: &Ipv4Header, options: &[[u8; 4]]) -> u16 {
    let mut zeroed = *header;
    zeroed.checksum = 0;
    let mut buf = vec![0u8; FIXED_HEADER_LEN];
    zeroed.write_bytes(&mut buf);
    for option in options {
        buf.extend_from_slice(option);
    }
    toolkit::internet_checksum(&buf)
}
