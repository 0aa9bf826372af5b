//! Address Resolution Protocol: packet layout, request/reply construction.
//!
//! A REPLY is always derived by mutating a clone of the originating
//! REQUEST (never assembled field-by-field from scratch) so that any
//! ordering of the wire bytes surrounding the mutated fields survives
//! untouched.

use byte_struct::{ByteStruct, ByteStructLen};
use static_assertions::const_assert;

use crate::enum_with_unknown;
use crate::error::{Result, StackError};
use crate::eth::EtherType;
use crate::mac::MacAddr;

enum_with_unknown! {
    /// ARP hardware type.
    pub enum HType(u16) {
        /// Ethernet.
        Ethernet = 1,
    }
}

impl ByteStructLen for HType {
    const BYTE_LEN: usize = 2;
}

impl ByteStruct for HType {
    fn read_bytes(bytes: &[u8]) -> Self {
        HType::from(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&u16::from(*self).to_be_bytes());
    }
}

enum_with_unknown! {
    /// ARP operation code.
    pub enum ArpOperation(u16) {
        /// Resolve a target IP address to a MAC address.
        Request = 1,
        /// Answer a REQUEST.
        Reply = 2,
    }
}

impl ByteStructLen for ArpOperation {
    const BYTE_LEN: usize = 2;
}

impl ByteStruct for ArpOperation {
    fn read_bytes(bytes: &[u8]) -> Self {
        ArpOperation::from(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&u16::from(*self).to_be_bytes());
    }
}

/// A 4-byte big-endian IPv4 address, usable as a `byte_struct` field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Ipv4Addr(pub [u8; 4]);

impl Ipv4Addr {
    /// Build an address from its four octets.
    pub fn new(octets: [u8; 4]) -> Self {
        Ipv4Addr(octets)
    }
}

impl ByteStructLen for Ipv4Addr {
    const BYTE_LEN: usize = 4;
}

impl ByteStruct for Ipv4Addr {
    fn read_bytes(bytes: &[u8]) -> Self {
        Ipv4Addr([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..4].copy_from_slice(&self.0);
    }
}

/// The raw 28-byte ARP packet layout for Ethernet/IPv4.
#[derive(ByteStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[byte_struct_be]
pub struct ArpPacket {
    /// Hardware type (1 for Ethernet).
    pub htype: HType,
    /// Protocol type (reuses EtherType values).
    pub ptype: EtherType,
    /// Hardware address length (6 for standard MAC).
    pub hlen: u8,
    /// Protocol address length (4 for IPv4).
    pub plen: u8,
    /// REQUEST or REPLY.
    pub operation: ArpOperation,
    /// Sender MAC address.
    pub sender_mac: MacAddr,
    /// Sender IPv4 address.
    pub sender_ip: Ipv4Addr,
    /// Target MAC address.
    pub target_mac: MacAddr,
    /// Target IPv4 address.
    pub target_ip: Ipv4Addr,
}

const_assert!(ArpPacket::BYTE_LEN == 28);

impl ArpPacket {
    /// Build a new REQUEST packet. If `target_mac` is not given, the
    /// broadcast MAC is used (an unknown target).
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr, target_mac: Option<MacAddr>) -> Self {
        ArpPacket {
            htype: HType::Ethernet,
            ptype: EtherType::IpV4,
            hlen: 6,
            plen: 4,
            operation: ArpOperation::Request,
            sender_mac,
            sender_ip,
            target_mac: target_mac.unwrap_or(MacAddr::BROADCAST),
            target_ip,
        }
    }

    /// Derive the REPLY to this REQUEST: the request's target IP becomes
    /// the reply's sender IP, the request's sender becomes the reply's
    /// target, and the operation flips. Fails if `self` is not a REQUEST.
    pub fn to_reply(&self, answering_mac: MacAddr) -> Result<Self> {
        if self.operation != ArpOperation::Request {
            return Err(StackError::PolicyViolation(
                "can only generate a reply to a REQUEST packet".into(),
            ));
        }
        let mut reply = *self;
        reply.operation = ArpOperation::Reply;
        reply.sender_mac = answering_mac;
        reply.sender_ip = self.target_ip;
        reply.target_mac = self.sender_mac;
        reply.target_ip = self.sender_ip;
        Ok(reply)
    }

    /// Encode to its raw 28-byte wire form.
    pub fn encode(&self) -> [u8; ArpPacket::BYTE_LEN] {
        let mut bytes = [0u8; ArpPacket::BYTE_LEN];
        self.write_bytes(&mut bytes);
        bytes
    }

    /// Decode from raw bytes, validating the fixed hardware/protocol shape.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ArpPacket::BYTE_LEN {
            return Err(StackError::MalformedInput(format!(
                "ARP packet of {} bytes is shorter than the required {}",
                bytes.len(),
                ArpPacket::BYTE_LEN
            )));
        }
        let packet = ArpPacket::read_bytes(&bytes[0..ArpPacket::BYTE_LEN]);
        if !matches!(packet.htype, HType::Ethernet) {
            return Err(StackError::MalformedInput("ARP is only implemented for Ethernet hardware type".into()));
        }
        if !matches!(packet.ptype, EtherType::IpV4) {
            return Err(StackError::MalformedInput("ARP is only implemented for IPv4 protocol type".into()));
        }
        if packet.hlen != 6 {
            return Err(StackError::MalformedInput(format!("expected hlen=6, got {}", packet.hlen)));
        }
        if packet.plen != 4 {
            return Err(StackError::MalformedInput(format!("expected plen=4, got {}", packet.plen)));
        }
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([n; 6])
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let packet = ArpPacket::request(mac(1), Ipv4Addr::new([10, 0, 0, 1]), Ipv4Addr::new([10, 0, 0, 2]), None);
        let bytes = packet.encode();
        assert_eq!(ArpPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn request_targets_broadcast_mac_when_unknown() {
        let packet = ArpPacket::request(mac(1), Ipv4Addr::new([10, 0, 0, 1]), Ipv4Addr::new([10, 0, 0, 2]), None);
        assert_eq!(packet.target_mac, MacAddr::BROADCAST);
    }

    #[test]
    fn reply_is_derived_by_flipping_the_request_fields() {
        let request = ArpPacket::request(mac(1), Ipv4Addr::new([10, 0, 0, 1]), Ipv4Addr::new([10, 0, 0, 2]), None);
        let reply = request.to_reply(mac(2)).unwrap();
        assert_eq!(reply.operation, ArpOperation::Reply);
        assert_eq!(reply.sender_mac, mac(2));
        assert_eq!(reply.sender_ip, request.target_ip);
        assert_eq!(reply.target_mac, request.sender_mac);
        assert_eq!(reply.target_ip, request.sender_ip);
    }

    #[test]
    fn cannot_reply_to_a_reply() {
        let request = ArpPacket::request(mac(1), Ipv4Addr::new([10, 0, 0, 1]), Ipv4Addr::new([10, 0, 0, 2]), None);
        let reply = request.to_reply(mac(2)).unwrap();
        assert!(reply.to_reply(mac(3)).is_err());
    }
}
