//! The HDLC frame family: Information/Supervisory/Unnumbered control
//! fields, normal and extended sequence-number widths, and the two stream
//! transmission disciplines (bit-stuffing in NORMAL mode, byte-escaping in
//! the ASYNC modes).

use crate::error::{Result, StackError};
use crate::toolkit::{self, EscapeSchema};

/// The delimiter byte bounding every HDLC frame on the wire.
pub const FLAG_BYTE: u8 = 0x7E;
const ESCAPE_BYTE: u8 = 0x7D;

/// Maximum information-field length, bounded the same as an Ethernet MTU.
pub const MAX_INFORMATION_LEN: usize = 1500;

/// Selects the bit- or byte-level transmission discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdlcMode {
    /// Bit-oriented: insert a `0` after every run of five `1`s.
    Normal,
    /// Byte-oriented, asynchronous balanced mode: `0x7E`/`0x7D` escaping.
    Async,
    /// Byte-oriented, asynchronous balanced mode variant.
    AsyncBalanced,
}

/// Stream-codec configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HdlcConfig {
    /// Bit- or byte-level transmission discipline.
    pub mode: HdlcMode,
    /// Use 7-bit N(s)/N(r) counters (Information/Supervisory frames only).
    pub extended: bool,
}

fn escape_schema() -> EscapeSchema {
    let mut map = std::collections::HashMap::new();
    map.insert(ESCAPE_BYTE, 0x5D);
    map.insert(FLAG_BYTE, 0x5E);
    EscapeSchema::new(ESCAPE_BYTE, map)
}

fn stuffing_pattern() -> [bool; 5] {
    [true; 5]
}

fn byte_to_bits(byte: u8) -> [bool; 8] {
    let mut bits = [false; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1 == 1;
    }
    bits
}

fn bits_to_bytes(bits: &[bool]) -> Result<Vec<u8>> {
    if bits.len() % 8 != 0 {
        return Err(StackError::MalformedInput(format!(
            "bit section has length {} which is not a multiple of 8",
            bits.len()
        )));
    }
    Ok(bits
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | (b as u8)))
        .collect())
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes.iter().flat_map(|&b| byte_to_bits(b)).collect()
}

/// Supervisory frame subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisoryType {
    /// Receive ready.
    ReceiveReady,
    /// Reject.
    Reject,
    /// Receive not ready.
    ReceiveNotReady,
    /// Selective reject.
    SelectiveReject,
}

impl SupervisoryType {
    fn code(self) -> u8 {
        match self {
            SupervisoryType::ReceiveReady => 0b00,
            SupervisoryType::Reject => 0b01,
            SupervisoryType::ReceiveNotReady => 0b10,
            SupervisoryType::SelectiveReject => 0b11,
        }
    }

    fn from_code(code: u8) -> Result<Self> {
        Ok(match code & 0b11 {
            0b00 => SupervisoryType::ReceiveReady,
            0b01 => SupervisoryType::Reject,
            0b10 => SupervisoryType::ReceiveNotReady,
            0b11 => SupervisoryType::SelectiveReject,
            _ => unreachable!(),
        })
    }
}

/// Unnumbered frame subtype, identified by the `(m1, m2)` bit-group pair
/// HDLC uses to encode its command/response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnnumberedType {
    /// Set normal response mode.
    Snrm,
    /// Set asynchronous balanced mode.
    Sabm,
    /// Disconnect.
    Disc,
    /// Unnumbered acknowledgment.
    Ua,
    /// Disconnect mode.
    Dm,
    /// Frame reject.
    Frmr,
    /// Unnumbered information.
    Ui,
    /// A command/response code not in the set modeled above; preserved
    /// verbatim as its raw `(m1, m2)` bit groups.
    Unknown(u8, u8),
}

impl UnnumberedType {
    fn codes(self) -> (u8, u8) {
        match self {
            UnnumberedType::Snrm => (0b00, 0b001),
            UnnumberedType::Sabm => (0b11, 0b100),
            UnnumberedType::Disc => (0b00, 0b010),
            UnnumberedType::Ua => (0b00, 0b110),
            UnnumberedType::Dm => (0b11, 0b000),
            UnnumberedType::Frmr => (0b10, 0b001),
            UnnumberedType::Ui => (0b00, 0b000),
            UnnumberedType::Unknown(m1, m2) => (m1, m2),
        }
    }

    fn from_codes(m1: u8, m2: u8) -> Self {
        match (m1 & 0b11, m2 & 0b111) {
            (0b00, 0b001) => UnnumberedType::Snrm,
            (0b11, 0b100) => UnnumberedType::Sabm,
            (0b00, 0b010) => UnnumberedType::Disc,
            (0b00, 0b110) => UnnumberedType::Ua,
            (0b11, 0b000) => UnnumberedType::Dm,
            (0b10, 0b001) => UnnumberedType::Frmr,
            (0b00, 0b000) => UnnumberedType::Ui,
            (m1, m2) => UnnumberedType::Unknown(m1, m2),
        }
    }
}

/// An HDLC control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    /// Information frame: carries sequence numbers and payload.
    Information {
        /// 7-bit counters when `true`, 3-bit otherwise.
        extended: bool,
        /// Poll/final bit.
        pf: bool,
        /// Send sequence number.
        ns: u8,
        /// Receive sequence number.
        nr: u8,
    },
    /// Supervisory frame: flow control, no payload.
    Supervisory {
        /// 7-bit N(r) when `true`, 3-bit otherwise.
        extended: bool,
        /// Poll/final bit.
        pf: bool,
        /// Supervisory subtype.
        s_type: SupervisoryType,
        /// Receive sequence number.
        nr: u8,
    },
    /// Unnumbered frame: no sequence numbers, always a single control byte.
    Unnumbered {
        /// Poll/final bit.
        pf: bool,
        /// Unnumbered subtype.
        u_type: UnnumberedType,
    },
}

impl ControlField {
    fn is_extended(&self) -> bool {
        match self {
            ControlField::Information { extended, .. } => *extended,
            ControlField::Supervisory { extended, .. } => *extended,
            ControlField::Unnumbered { .. } => false,
        }
    }

    fn encode(&self) -> Vec<u8> {
        match *self {
            ControlField::Information { extended: false, pf, ns, nr } => {
                vec![((ns & 0x7) << 4) | ((pf as u8) << 3) | (nr & 0x7)]
            }
            ControlField::Information { extended: true, pf, ns, nr } => {
                let value: u16 = (((ns as u16) & 0x7f) << 8) | ((pf as u16) << 7) | ((nr as u16) & 0x7f);
                value.to_be_bytes().to_vec()
            }
            ControlField::Supervisory { extended: false, pf, s_type, nr } => {
                vec![0x80 | ((s_type.code() & 0x3) << 4) | ((pf as u8) << 3) | (nr & 0x7)]
            }
            ControlField::Supervisory { extended: true, pf, s_type, nr } => {
                let value: u16 = 0x8000
                    | (((s_type.code() as u16) & 0x3) << 8)
                    | ((pf as u16) << 7)
                    | ((nr as u16) & 0x7f);
                value.to_be_bytes().to_vec()
            }
            ControlField::Unnumbered { pf, u_type } => {
                let (m1, m2) = u_type.codes();
                vec![0xC0 | ((m1 & 0x3) << 4) | ((pf as u8) << 3) | (m2 & 0x7)]
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let b0 = bytes[0];
        if b0 & 0x80 == 0 {
            // Information frame.
            if bytes.len() == 2 {
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                Ok(ControlField::Information {
                    extended: true,
                    pf: (value >> 7) & 1 != 0,
                    ns: ((value >> 8) & 0x7f) as u8,
                    nr: (value & 0x7f) as u8,
                })
            } else {
                Ok(ControlField::Information {
                    extended: false,
                    pf: (b0 >> 3) & 1 != 0,
                    ns: (b0 >> 4) & 0x7,
                    nr: b0 & 0x7,
                })
            }
        } else if b0 & 0x40 == 0 {
            // Supervisory frame.
            if bytes.len() == 2 {
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                Ok(ControlField::Supervisory {
                    extended: true,
                    pf: (value >> 7) & 1 != 0,
                    s_type: SupervisoryType::from_code(((value >> 8) & 0x3) as u8)?,
                    nr: (value & 0x7f) as u8,
                })
            } else {
                Ok(ControlField::Supervisory {
                    extended: false,
                    pf: (b0 >> 3) & 1 != 0,
                    s_type: SupervisoryType::from_code((b0 >> 4) & 0x3)?,
                    nr: b0 & 0x7,
                })
            }
        } else {
            // Unnumbered frame: always a single control byte.
            Ok(ControlField::Unnumbered {
                pf: (b0 >> 3) & 1 != 0,
                u_type: UnnumberedType::from_codes((b0 >> 4) & 0x3, b0 & 0x7),
            })
        }
    }
}

fn is_u_frame_byte(b0: u8) -> bool {
    b0 & 0xC0 == 0xC0
}

/// A complete HDLC frame: address, control field, information, FCS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    /// Address byte.
    pub address: u8,
    /// Control field.
    pub control: ControlField,
    /// Information field; empty for Supervisory frames.
    pub information: Vec<u8>,
}

impl HdlcFrame {
    /// Build a new frame. Fails if `information` exceeds
    /// [`MAX_INFORMATION_LEN`].
    pub fn new(address: u8, control: ControlField, information: Vec<u8>) -> Result<Self> {
        if information.len() > MAX_INFORMATION_LEN {
            return Err(StackError::PolicyViolation(format!(
                "HDLC information field of {} bytes exceeds the {} byte maximum",
                information.len(),
                MAX_INFORMATION_LEN
            )));
        }
        Ok(HdlcFrame { address, control, information })
    }

    fn fcs_input(&self) -> Vec<u8> {
        let mut buf = vec![self.address];
        buf.extend(self.control.encode());
        buf.extend(&self.information);
        buf
    }

    /// Encode this frame's on-wire bytes, including the 4-byte
    /// little-endian FCS. Does not include the flag delimiter.
    pub fn encode_frame(&self) -> Vec<u8> {
        let mut buf = self.fcs_input();
        let fcs = toolkit::crc32(&buf);
        buf.extend(fcs.to_le_bytes());
        buf
    }

    /// Decode a single frame's bytes (no flag delimiter), verifying the FCS.
    pub fn decode_frame(bytes: &[u8], extended: bool) -> Result<Self> {
        if bytes.len() < 6 {
            return Err(StackError::MalformedInput(format!(
                "HDLC frame of {} bytes is too short to contain address+control+FCS",
                bytes.len()
            )));
        }
        let control_len = if extended && !is_u_frame_byte(bytes[1]) { 2 } else { 1 };
        let control_end = 1 + control_len;
        let address = bytes[0];
        let control = ControlField::decode(&bytes[1..control_end])?;
        let information = bytes[control_end..bytes.len() - 4].to_vec();
        let received_fcs = u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap());
        let expected_fcs = toolkit::crc32(&bytes[..bytes.len() - 4]);
        if received_fcs != expected_fcs {
            return Err(StackError::IntegrityFailure("HDLC frame FCS mismatch".into()));
        }
        if matches!(control, ControlField::Supervisory { .. }) && !information.is_empty() {
            return Err(StackError::MalformedInput(
                "HDLC supervisory frame must not carry an information field".into(),
            ));
        }
        Ok(HdlcFrame { address, control, information })
    }
}

/// The result of [`frame_stream_encode`]: a bitstream for NORMAL mode, or a
/// byte stream for the ASYNC modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStream {
    /// A bit-stuffed bitstream (NORMAL mode).
    Bits(Vec<bool>),
    /// A byte-escaped byte stream (ASYNC / ASYNC_BALANCED mode).
    Bytes(Vec<u8>),
}

/// Encode a stream of frames, interleaving them with the flag delimiter and
/// applying bit-stuffing (NORMAL) or byte-escaping (ASYNC/ASYNC_BALANCED)
/// per `cfg.mode`.
pub fn frame_stream_encode(frames: &[HdlcFrame], cfg: &HdlcConfig) -> FrameStream {
    match cfg.mode {
        HdlcMode::Normal => {
            let flag_bits = byte_to_bits(FLAG_BYTE).to_vec();
            let pattern = stuffing_pattern();
            let stuffed: Vec<Vec<bool>> = frames
                .iter()
                .map(|f| toolkit::stuff_bits(bytes_to_bits(&f.encode_frame()), &pattern, false))
                .collect();
            FrameStream::Bits(toolkit::interleave(&stuffed, &flag_bits).into_iter().flatten().collect())
        }
        HdlcMode::Async | HdlcMode::AsyncBalanced => {
            let schema = escape_schema();
            let escaped: Vec<Vec<u8>> = frames.iter().map(|f| schema.escape(&f.encode_frame())).collect();
            FrameStream::Bytes(
                toolkit::interleave(&escaped, &vec![FLAG_BYTE])
                    .into_iter()
                    .flatten()
                    .collect(),
            )
        }
    }
}

/// Decode a stream produced by [`frame_stream_encode`] back into frames.
/// Invalid sections (too short, bad FCS, bad control-field shape) are
/// dropped with a diagnostic.
pub fn frame_stream_decode(stream: &FrameStream, cfg: &HdlcConfig) -> Vec<HdlcFrame> {
    let byte_sections: Vec<Vec<u8>> = match (stream, cfg.mode) {
        (FrameStream::Bits(bits), HdlcMode::Normal) => {
            let flag_bits = byte_to_bits(FLAG_BYTE).to_vec();
            let pattern = stuffing_pattern();
            toolkit::separate(bits, &flag_bits, None)
                .into_iter()
                .filter_map(|section| {
                    let destuffed = toolkit::destuff_bits(section, &pattern, false);
                    match bits_to_bytes(&destuffed) {
                        Ok(bytes) => Some(bytes),
                        Err(err) => {
                            tracing::warn!(%err, "dropping malformed HDLC bit section");
                            None
                        }
                    }
                })
                .collect()
        }
        (FrameStream::Bytes(bytes), HdlcMode::Async | HdlcMode::AsyncBalanced) => {
            let schema = escape_schema();
            toolkit::separate(bytes, &[FLAG_BYTE], None)
                .into_iter()
                .map(|section| schema.unescape(&section))
                .collect()
        }
        _ => {
            tracing::warn!("HDLC stream representation does not match configured mode");
            Vec::new()
        }
    };

    byte_sections
        .into_iter()
        .filter_map(|bytes| match HdlcFrame::decode_frame(&bytes, cfg.extended) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::warn!(%err, "dropping malformed HDLC frame");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn information_frame_round_trips_normal_width() {
        let frame = HdlcFrame::new(
            0x03,
            ControlField::Information { extended: false, pf: true, ns: 5, nr: 2 },
            b"payload".to_vec(),
        )
        .unwrap();
        let bytes = frame.encode_frame();
        assert_eq!(HdlcFrame::decode_frame(&bytes, false).unwrap(), frame);
    }

    #[test]
    fn information_frame_round_trips_extended_width() {
        let frame = HdlcFrame::new(
            0x03,
            ControlField::Information { extended: true, pf: false, ns: 100, nr: 99 },
            b"payload".to_vec(),
        )
        .unwrap();
        let bytes = frame.encode_frame();
        assert_eq!(HdlcFrame::decode_frame(&bytes, true).unwrap(), frame);
    }

    #[test]
    fn unnumbered_frame_is_always_one_control_byte_even_when_extended() {
        let frame = HdlcFrame::new(
            0xFF,
            ControlField::Unnumbered { pf: true, u_type: UnnumberedType::Sabm },
            vec![],
        )
        .unwrap();
        let bytes = frame.encode_frame();
        assert_eq!(HdlcFrame::decode_frame(&bytes, true).unwrap(), frame);
    }

    #[test]
    fn supervisory_frame_round_trips() {
        let frame = HdlcFrame::new(
            0x01,
            ControlField::Supervisory { extended: false, pf: false, s_type: SupervisoryType::Reject, nr: 3 },
            vec![],
        )
        .unwrap();
        let bytes = frame.encode_frame();
        assert_eq!(HdlcFrame::decode_frame(&bytes, false).unwrap(), frame);
    }

    #[test]
    fn normal_mode_stream_round_trips_with_bit_stuffing() {
        let frames = vec![
            HdlcFrame::new(0x01, ControlField::Unnumbered { pf: true, u_type: UnnumberedType::Ui }, vec![0xFF; 4]).unwrap(),
            HdlcFrame::new(0x02, ControlField::Unnumbered { pf: false, u_type: UnnumberedType::Disc }, vec![]).unwrap(),
        ];
        let cfg = HdlcConfig { mode: HdlcMode::Normal, extended: false };
        let stream = frame_stream_encode(&frames, &cfg);
        assert_eq!(frame_stream_decode(&stream, &cfg), frames);
    }

    #[test]
    fn async_mode_stream_round_trips_with_byte_escaping() {
        let frames = vec![HdlcFrame::new(
            0xFF,
            ControlField::Unnumbered { pf: true, u_type: UnnumberedType::Ui },
            vec![0x7E, 0x7D, 0x01],
        )
        .unwrap()];
        let cfg = HdlcConfig { mode: HdlcMode::Async, extended: false };
        let stream = frame_stream_encode(&frames, &cfg);
        assert_eq!(frame_stream_decode(&stream, &cfg), frames);
    }

    #[test]
    fn oversized_information_is_rejected() {
        let err = HdlcFrame::new(
            0x01,
            ControlField::Unnumbered { pf: true, u_type: UnnumberedType::Ui },
            vec![0; MAX_INFORMATION_LEN + 1],
        )
        .unwrap_err();
        assert!(matches!(err, StackError::PolicyViolation(_)));
    }
}
