//! Ethernet link-layer framing: Ethernet II and IEEE 802.3, plus the
//! delimiter-free stream codec that composes with the physical/signal layer.

use byte_struct::{ByteStruct, ByteStructLen};

use crate::enum_with_unknown;
use crate::error::{Result, StackError};
use crate::mac::MacAddr;
use crate::manchester::Sample;
use crate::toolkit;

/// Minimum/maximum payload length for an Ethernet II frame.
pub const ETHERNET_II_PAYLOAD_RANGE: std::ops::RangeInclusive<usize> = 46..=1500;
/// Minimum/maximum payload length for an IEEE 802.3 frame.
pub const IEEE_8023_PAYLOAD_RANGE: std::ops::RangeInclusive<usize> = 42..=1500;

/// Type/length values `1501..=1535` are reserved and decode as neither a
/// valid EtherType nor a valid 802.3 length.
const LENGTH_TYPE_BOUNDARY: u16 = 1536;

enum_with_unknown! {
    /// EtherType values carried by an Ethernet II frame's type field.
    pub enum EtherType(u16) {
        /// IPv4
        IpV4 = 0x0800,
        /// ARP
        Arp = 0x0806,
        /// IPv6
        IpV6 = 0x86DD,
        /// Wake-on-LAN
        WakeOnLan = 0x0842,
        /// AppleTalk
        AppleTalk = 0x809B,
    }
}

impl ByteStructLen for EtherType {
    const BYTE_LEN: usize = 2;
}

impl ByteStruct for EtherType {
    fn read_bytes(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 2];
        raw.copy_from_slice(&bytes[0..2]);
        EtherType::from(u16::from_be_bytes(raw))
    }

    fn write_bytes(&self, bytes: &mut [u8]) {
        bytes[0..2].copy_from_slice(&u16::from(*self).to_be_bytes());
    }
}

/// The 12-byte destination/source address pair common to every Ethernet
/// frame, per the data model's field order (destination, then source).
#[derive(ByteStruct, Clone, Copy, Debug, PartialEq, Eq)]
#[byte_struct_be]
pub struct EthernetHeader {
    /// Destination MAC address.
    pub destination: MacAddr,
    /// Source MAC address.
    pub source: MacAddr,
}

fn crc_over(destination: MacAddr, source: MacAddr, type_or_length: u16, payload: &[u8]) -> u32 {
    let mut buf = Vec::with_capacity(12 + 2 + payload.len());
    buf.extend_from_slice(&destination.to_be_bytes());
    buf.extend_from_slice(&source.to_be_bytes());
    buf.extend_from_slice(&type_or_length.to_be_bytes());
    buf.extend_from_slice(payload);
    toolkit::crc32(&buf)
}

fn pad_payload(mut payload: Vec<u8>, range: std::ops::RangeInclusive<usize>) -> Result<Vec<u8>> {
    if payload.len() > *range.end() {
        return Err(StackError::PolicyViolation(format!(
            "payload length {} exceeds maximum {}",
            payload.len(),
            range.end()
        )));
    }
    if payload.len() < *range.start() {
        payload.resize(*range.start(), 0);
    }
    Ok(payload)
}

/// An Ethernet II frame: destination, source, EtherType, payload, FCS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetFrame {
    /// Destination MAC address.
    pub destination: MacAddr,
    /// Source MAC address.
    pub source: MacAddr,
    /// EtherType of the payload.
    pub ethertype: EtherType,
    /// Frame payload, zero-padded on the right to the Ethernet II minimum.
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    /// Build a new frame, zero-padding `payload` on the right if it is
    /// shorter than the Ethernet II minimum, or rejecting it if it exceeds
    /// the maximum.
    pub fn new(destination: MacAddr, source: MacAddr, payload: Vec<u8>, ethertype: EtherType) -> Result<Self> {
        Ok(EthernetFrame {
            destination,
            source,
            ethertype,
            payload: pad_payload(payload, ETHERNET_II_PAYLOAD_RANGE)?,
        })
    }

    /// Encode this frame's on-wire bytes, including the 4-byte
    /// little-endian FCS. Does not include preamble/SFD.
    pub fn encode(&self) -> Vec<u8> {
        let type_raw: u16 = self.ethertype.into();
        let mut out = Vec::with_capacity(14 + self.payload.len() + 4);
        out.extend_from_slice(&self.destination.to_be_bytes());
        out.extend_from_slice(&self.source.to_be_bytes());
        out.extend_from_slice(&type_raw.to_be_bytes());
        out.extend_from_slice(&self.payload);
        let fcs = crc_over(self.destination, self.source, type_raw, &self.payload);
        out.extend_from_slice(&fcs.to_le_bytes());
        out
    }

    /// Decode a single frame's bytes (no preamble/SFD), verifying the FCS.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 14 + 4 {
            return Err(StackError::MalformedInput(format!(
                "ethernet II frame too short: {} bytes",
                bytes.len()
            )));
        }
        let header = EthernetHeader::read_bytes(&bytes[0..12]);
        let type_raw = u16::from_be_bytes([bytes[12], bytes[13]]);
        if type_raw < LENGTH_TYPE_BOUNDARY {
            return Err(StackError::MalformedInput(format!(
                "type/length field {type_raw:#06x} is not a valid EtherType"
            )));
        }
        let payload = bytes[14..bytes.len() - 4].to_vec();
        let received_fcs = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let expected_fcs = crc_over(header.destination, header.source, type_raw, &payload);
        if received_fcs != expected_fcs {
            return Err(StackError::IntegrityFailure("ethernet II FCS mismatch".into()));
        }
        Ok(EthernetFrame {
            destination: header.destination,
            source: header.source,
            ethertype: EtherType::from(type_raw),
            payload,
        })
    }
}

/// An IEEE 802.3 frame: destination, source, length, LLC payload, FCS.
///
/// Only the default (IEEE 802.1Q-less) LLC framing is modeled: the bytes
/// immediately following `length` are carried opaquely as `payload`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ieee8023Frame {
    /// Destination MAC address.
    pub destination: MacAddr,
    /// Source MAC address.
    pub source: MacAddr,
    /// Frame payload (LLC header and data), zero-padded on the right to the
    /// 802.3 minimum.
    pub payload: Vec<u8>,
}

impl Ieee8023Frame {
    /// Build a new frame, zero-padding `payload` on the right if it is
    /// shorter than the 802.3 minimum, or rejecting it if it exceeds the
    /// maximum.
    pub fn new(destination: MacAddr, source: MacAddr, payload: Vec<u8>) -> Result<Self> {
        Ok(Ieee8023Frame {
            destination,
            source,
            payload: pad_payload(payload, IEEE_8023_PAYLOAD_RANGE)?,
        })
    }

    /// Encode this frame's on-wire bytes, including the 4-byte
    /// little-endian FCS.
    pub fn encode(&self) -> Vec<u8> {
        let length = self.payload.len() as u16;
        let mut out = Vec::with_capacity(14 + self.payload.len() + 4);
        out.extend_from_slice(&self.destination.to_be_bytes());
        out.extend_from_slice(&self.source.to_be_bytes());
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&self.payload);
        let fcs = crc_over(self.destination, self.source, length, &self.payload);
        out.extend_from_slice(&fcs.to_le_bytes());
        out
    }

    /// Decode a single frame's bytes, verifying the FCS.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 14 + 4 {
            return Err(StackError::MalformedInput(format!(
                "802.3 frame too short: {} bytes",
                bytes.len()
            )));
        }
        let header = EthernetHeader::read_bytes(&bytes[0..12]);
        let length = u16::from_be_bytes([bytes[12], bytes[13]]);
        if length >= LENGTH_TYPE_BOUNDARY {
            return Err(StackError::MalformedInput(format!(
                "type/length field {length:#06x} is not a valid 802.3 length"
            )));
        }
        let payload = bytes[14..bytes.len() - 4].to_vec();
        let received_fcs = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let expected_fcs = crc_over(header.destination, header.source, length, &payload);
        if received_fcs != expected_fcs {
            return Err(StackError::IntegrityFailure("802.3 FCS mismatch".into()));
        }
        Ok(Ieee8023Frame {
            destination: header.destination,
            source: header.source,
            payload,
        })
    }
}

/// Physical-layer constants used only by the stream codec and the signal
/// bridge; never part of a single frame's encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetConfig {
    /// Number of inter-packet-gap silence samples inserted between frames.
    pub inter_packet_gap_bits: usize,
}

impl Default for EthernetConfig {
    fn default() -> Self {
        EthernetConfig {
            inter_packet_gap_bits: 96,
        }
    }
}

const PREAMBLE_BYTE: u8 = 0b1010_1010;
const SFD_BYTE: u8 = 0b1010_1011;
const PREAMBLE_LEN: usize = 7;

fn byte_to_bits(byte: u8) -> [bool; 8] {
    let mut bits = [false; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1 == 1;
    }
    bits
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | (b as u8)))
        .collect()
}

/// Encode a stream of Ethernet II frames into a sequence of line samples:
/// `preamble + SFD + frame bytes` for each frame, separated by
/// `cfg.inter_packet_gap_bits` [`Sample::Silence`]s.
pub fn frame_stream_encode(frames: &[EthernetFrame], cfg: &EthernetConfig) -> Vec<Sample> {
    let mut out = Vec::new();
    for frame in frames {
        for _ in 0..PREAMBLE_LEN {
            out.extend(byte_to_bits(PREAMBLE_BYTE).into_iter().map(Sample::Bit));
        }
        out.extend(byte_to_bits(SFD_BYTE).into_iter().map(Sample::Bit));
        for byte in frame.encode() {
            out.extend(byte_to_bits(byte).into_iter().map(Sample::Bit));
        }
        out.extend(std::iter::repeat(Sample::Silence).take(cfg.inter_packet_gap_bits));
    }
    out
}

/// Decode a stream of line samples back into Ethernet II frames, splitting
/// on inter-packet-gap silence and stripping the preamble/SFD from each
/// block. Invalid blocks (bad FCS, wrong EtherType, too short) are dropped
/// with a diagnostic.
pub fn frame_stream_decode(input: &[Sample]) -> Vec<EthernetFrame> {
    let mut frames = Vec::new();
    for block in input.split(|s| matches!(s, Sample::Silence)) {
        if block.is_empty() {
            continue;
        }
        let bits: Vec<bool> = block
            .iter()
            .filter_map(|s| match s {
                Sample::Bit(b) => Some(*b),
                Sample::Silence => None,
            })
            .collect();
        let bytes = bits_to_bytes(&bits);
        let preamble_and_sfd = PREAMBLE_LEN + 1;
        if bytes.len() <= preamble_and_sfd {
            tracing::warn!("ethernet stream block too short to contain a frame");
            continue;
        }
        match EthernetFrame::decode(&bytes[preamble_and_sfd..]) {
            Ok(frame) => frames.push(frame),
            Err(err) => tracing::warn!(%err, "dropping malformed ethernet frame"),
        }
    }
    frames
}
