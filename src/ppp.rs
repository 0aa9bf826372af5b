//! Point-to-Point Protocol framing: structurally an HDLC Unnumbered-style
//! frame with a fixed address/control pair and a 2-byte protocol selector.
//! Byte-escaping only; no bit-stuffing mode exists for PPP.

use crate::enum_with_unknown;
use crate::error::{Result, StackError};
use crate::hdlc::FLAG_BYTE;
use crate::toolkit::{self, EscapeSchema};

/// The only valid PPP address byte.
pub const ADDRESS: u8 = 0xFF;
/// The only valid PPP control byte.
pub const CONTROL: u8 = 0x03;

enum_with_unknown! {
    /// PPP protocol field values.
    pub enum PppProtocol(u16) {
        /// IPv4
        IpV4 = 0x0021,
        /// IPv6
        IpV6 = 0x0057,
        /// AppleTalk
        AppleTalk = 0x0029,
        /// IPX
        Ipx = 0x002B,
        /// Multilink PPP
        Multilink = 0x003D,
        /// NetBIOS
        NetBios = 0x003F,
        /// IP Control Protocol
        Ipcp = 0x8021,
        /// IPv6 Control Protocol
        Ipv6Cp = 0x8057,
        /// Link Control Protocol
        Lcp = 0xC021,
    }
}

/// A PPP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PppFrame {
    /// The protocol carried in the information field.
    pub protocol: PppProtocol,
    /// The frame's payload.
    pub information: Vec<u8>,
}

fn escape_schema() -> EscapeSchema {
    let mut map = std::collections::HashMap::new();
    map.insert(0x7D, 0x5D);
    map.insert(FLAG_BYTE, 0x5E);
    EscapeSchema::new(0x7D, map)
}

impl PppFrame {
    /// Build a new frame.
    pub fn new(protocol: PppProtocol, information: Vec<u8>) -> Self {
        PppFrame { protocol, information }
    }

    /// Encode this frame's on-wire bytes, including the 4-byte
    /// little-endian FCS. Does not include the flag delimiter or escaping.
    pub fn encode_frame(&self) -> Vec<u8> {
        let protocol_raw: u16 = self.protocol.into();
        let mut buf = vec![ADDRESS, CONTROL];
        buf.extend(protocol_raw.to_be_bytes());
        buf.extend(&self.information);
        let fcs = toolkit::crc32(&buf);
        buf.extend(fcs.to_le_bytes());
        buf
    }

    /// Decode a single frame's bytes, validating the fixed address/control
    /// pair and the FCS.
    pub fn decode_frame(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(StackError::MalformedInput(format!(
                "PPP frame of {} bytes is too short",
                bytes.len()
            )));
        }
        let received_fcs = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let expected_fcs = toolkit::crc32(&bytes[..bytes.len() - 4]);
        if received_fcs != expected_fcs {
            return Err(StackError::IntegrityFailure("PPP frame FCS mismatch".into()));
        }
        if bytes[0] != ADDRESS {
            return Err(StackError::PolicyViolation(format!(
                "PPP frame address {:#04x} is not the fixed {:#04x}",
                bytes[0], ADDRESS
            )));
        }
        if bytes[1] != CONTROL {
            return Err(StackError::PolicyViolation(format!(
                "PPP frame control {:#04x} is not the fixed {:#04x}",
                bytes[1], CONTROL
            )));
        }
        let protocol_raw = u16::from_be_bytes([bytes[2], bytes[3]]);
        let information = bytes[4..bytes.len() - 4].to_vec();
        Ok(PppFrame {
            protocol: PppProtocol::from(protocol_raw),
            information,
        })
    }
}

/// Encode a stream of PPP frames, interleaved with the flag delimiter and
/// byte-escaped.
pub fn frame_stream_encode(frames: &[PppFrame]) -> Vec<u8> {
    let schema = escape_schema();
    let escaped: Vec<Vec<u8>> = frames.iter().map(|f| schema.escape(&f.encode_frame())).collect();
    toolkit::interleave(&escaped, &vec![FLAG_BYTE]).into_iter().flatten().collect()
}

/// Decode a byte stream produced by [`frame_stream_encode`]. Invalid
/// sections are dropped with a diagnostic.
pub fn frame_stream_decode(bytes: &[u8]) -> Vec<PppFrame> {
    let schema = escape_schema();
    toolkit::separate(bytes, &[FLAG_BYTE], None)
        .into_iter()
        .filter_map(|section| {
            let unescaped = schema.unescape(&section);
            match PppFrame::decode_frame(&unescaped) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!(%err, "dropping malformed PPP frame");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let frame = PppFrame::new(PppProtocol::IpV4, b"payload".to_vec());
        let bytes = frame.encode_frame();
        assert_eq!(PppFrame::decode_frame(&bytes).unwrap(), frame);
    }

    #[test]
    fn wrong_address_is_rejected() {
        let frame = PppFrame::new(PppProtocol::IpV4, b"payload".to_vec());
        let mut bytes = frame.encode_frame();
        bytes[0] = 0x01;
        let fcs = toolkit::crc32(&bytes[..bytes.len() - 4]);
        bytes[bytes.len() - 4..].copy_from_slice(&fcs.to_le_bytes());
        assert!(matches!(PppFrame::decode_frame(&bytes), Err(StackError::PolicyViolation(_))));
    }

    #[test]
    fn stream_round_trips_through_escaping() {
        let frames = vec![
            PppFrame::new(PppProtocol::IpV4, vec![0x7E, 0x7D, 1, 2, 3]),
            PppFrame::new(PppProtocol::Lcp, vec![]),
        ];
        let stream = frame_stream_encode(&frames);
        assert_eq!(frame_stream_decode(&stream), frames);
    }
}
