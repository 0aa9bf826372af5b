//! Composes the Manchester line code with each frame family's stream codec,
//! turning a list of frames into a continuous signal and back. Ethernet
//! preserves its inter-packet-gap silence as literal zero-amplitude gaps in
//! the signal; HDLC and PPP carry no line-level silence at all, since their
//! frames are self-delimited by the flag byte rather than a line gap.

use crate::eth::{self, EthernetConfig, EthernetFrame};
use crate::hdlc::{self, FrameStream, HdlcConfig, HdlcFrame, HdlcMode};
use crate::manchester::{LineConfig, Sample, Signal};
use crate::ppp::{self, PppFrame};

fn byte_to_bits(byte: u8) -> [bool; 8] {
    let mut bits = [false; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1 == 1;
    }
    bits
}

fn bytes_to_bits(bytes: &[u8]) -> Vec<bool> {
    bytes.iter().flat_map(|&b| byte_to_bits(b)).collect()
}

fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &b| (acc << 1) | (b as u8)))
        .collect()
}

fn strip_silence(samples: impl Iterator<Item = Sample>) -> Vec<bool> {
    samples
        .filter_map(|s| match s {
            Sample::Bit(b) => Some(b),
            Sample::Silence => None,
        })
        .collect()
}

/// A Manchester signal assembled from maximal runs of [`Sample::Bit`]s, with
/// literal zero amplitude everywhere a [`Sample::Silence`] fell. Used only
/// by the Ethernet bridge, which marks inter-packet gaps this way; HDLC and
/// PPP encode onto a single, gapless [`Signal`] instead.
pub struct GappedSignal {
    runs: Vec<(usize, Signal)>,
    len: usize,
}

impl GappedSignal {
    fn from_samples(samples: &[Sample]) -> Self {
        let mut runs = Vec::new();
        let mut i = 0;
        while i < samples.len() {
            if matches!(samples[i], Sample::Silence) {
                i += 1;
                continue;
            }
            let start = i;
            let mut bits = Vec::new();
            while let Some(Sample::Bit(b)) = samples.get(i) {
                bits.push(*b);
                i += 1;
            }
            runs.push((start, Signal::new(bits)));
        }
        GappedSignal { runs, len: samples.len() }
    }

    /// Sample the composite signal at time `t`.
    pub fn at(&self, t: f64) -> f64 {
        for (start, signal) in &self.runs {
            let local = t - *start as f64;
            if local >= -0.5 && local < signal.len() as f64 - 0.5 {
                return signal.at(local);
            }
        }
        0.0
    }

    /// Total number of bit-times this signal spans, silences included.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if this signal spans no samples at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Re-derive the sample sequence, using the same `t ± cfg.epsilon`
    /// transition test as [`Signal::decode`].
    pub fn decode(&self, cfg: LineConfig) -> Vec<Sample> {
        (0..self.len)
            .map(|i| {
                let t = i as f64;
                let before = self.at(t - cfg.epsilon);
                let after = self.at(t + cfg.epsilon);
                if before == 0.0 && after == 0.0 {
                    Sample::Silence
                } else {
                    Sample::Bit(after > before)
                }
            })
            .collect()
    }
}

/// Turn a stream of Ethernet II frames into a signal, preserving the
/// inter-packet gap between frames as line silence.
pub fn ethernet_to_signal(frames: &[EthernetFrame], cfg: &EthernetConfig) -> GappedSignal {
    GappedSignal::from_samples(&eth::frame_stream_encode(frames, cfg))
}

/// Recover Ethernet II frames from a signal built by [`ethernet_to_signal`].
pub fn signal_to_ethernet(signal: &GappedSignal, line_cfg: LineConfig) -> Vec<EthernetFrame> {
    eth::frame_stream_decode(&signal.decode(line_cfg))
}

/// Turn a stream of HDLC frames into a single continuous signal; there is
/// no line-level silence between frames, since the flag byte delimits them.
pub fn hdlc_to_signal(frames: &[HdlcFrame], cfg: &HdlcConfig) -> Signal {
    match hdlc::frame_stream_encode(frames, cfg) {
        FrameStream::Bits(bits) => Signal::new(bits),
        FrameStream::Bytes(bytes) => Signal::new(bytes_to_bits(&bytes)),
    }
}

/// Recover HDLC frames from a signal built by [`hdlc_to_signal`]. Any
/// [`Sample::Silence`] the line decoder emits (for example past the dead
/// signal threshold) is stripped before regrouping into frames.
pub fn signal_to_hdlc(signal: &Signal, line_cfg: LineConfig, cfg: &HdlcConfig) -> Vec<HdlcFrame> {
    let bits = strip_silence(signal.decode(line_cfg));
    let stream = match cfg.mode {
        HdlcMode::Normal => FrameStream::Bits(bits),
        HdlcMode::Async | HdlcMode::AsyncBalanced => FrameStream::Bytes(bits_to_bytes(&bits)),
    };
    hdlc::frame_stream_decode(&stream, cfg)
}

/// Turn a stream of PPP frames into a single continuous signal.
pub fn ppp_to_signal(frames: &[PppFrame]) -> Signal {
    Signal::new(bytes_to_bits(&ppp::frame_stream_encode(frames)))
}

/// Recover PPP frames from a signal built by [`ppp_to_signal`], stripping
/// any line silence the decoder emits before regrouping into bytes.
pub fn signal_to_ppp(signal: &Signal, line_cfg: LineConfig) -> Vec<PppFrame> {
    let bits = strip_silence(signal.decode(line_cfg));
    ppp::frame_stream_decode(&bits_to_bytes(&bits))
}
