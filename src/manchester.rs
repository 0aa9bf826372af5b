//! Manchester line coding: map a finite bit sequence to a continuous,
//! real-valued signal with a 1 Hz bit rate, and recover bits (or silence)
//! from a signal by sampling around each integer instant.
//!
//! Encoding follows the teacher-style construction used across this crate:
//! closed-form trigonometric segments rather than a lookup table, so the
//! signal can be sampled at any real `t`, not just at bit boundaries.

use std::f64::consts::PI;

/// Parameters governing the line decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineConfig {
    /// Half-width of the sampling window used to detect a transition at each
    /// integer instant.
    pub epsilon: f64,
    /// Number of consecutive silent samples after which the decoder
    /// considers the signal dead and stops iterating.
    pub dead_signal_threshold: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        LineConfig {
            epsilon: 0.001,
            dead_signal_threshold: 8,
        }
    }
}

fn sign(bit: bool) -> f64 {
    if bit {
        1.0
    } else {
        -1.0
    }
}

fn node1(t: f64) -> f64 {
    (2.0 * PI * t).sin()
}

fn node2(t: f64) -> f64 {
    node1(3.0 * t) / 3.0
}

fn same_phase(t: f64) -> f64 {
    node1(t)
}

fn switch_phase(t: f64) -> f64 {
    node1(t / 2.0) + node2(t / 2.0)
}

fn start_smoothing(t: f64) -> f64 {
    if t < -0.5 {
        0.0
    } else if t >= -0.4 {
        1.0
    } else {
        (10.0 * PI * t).cos() / 2.0 + 0.5
    }
}

fn end_smoothing(t: f64) -> f64 {
    start_smoothing(-t)
}

fn encode_segment(t: f64, previous_bit: bool, current_bit: bool) -> f64 {
    if !(-1.0..0.0).contains(&t) {
        return 0.0;
    }
    let sgn = sign(current_bit);
    if previous_bit == current_bit {
        sgn * same_phase(t)
    } else {
        sgn * switch_phase(t)
    }
}

fn encode_boundary(t: f64, current_bit: bool, start: bool) -> f64 {
    if start {
        sign(current_bit) * start_smoothing(t) * node1(t)
    } else {
        sign(current_bit) * end_smoothing(t) * node1(t)
    }
}

/// An encoded Manchester signal: a finite bit sequence, sampled at any real
/// instant `t` via [`Signal::at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    bits: Vec<bool>,
}

impl Signal {
    /// Encode `bits` into a signal. Outside `[-0.5, n-0.5)` the signal is
    /// zero; the endpoints are smoothed over `[-0.5, -0.4]` and
    /// `[n-1.4, n-1]` relative to the first/last bit.
    pub fn new(bits: Vec<bool>) -> Self {
        Signal { bits }
    }

    /// Number of bits encoded by this signal.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// `true` if this signal encodes no bits.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Sample the signal at time `t`.
    pub fn at(&self, t: f64) -> f64 {
        let n = self.bits.len() as f64;
        if t < -0.5 || t >= n - 0.5 {
            return 0.0;
        }
        if t >= 0.0 && t < n - 1.0 {
            let k = t.ceil();
            let idx = k as isize;
            let previous = self.bits[(idx - 1) as usize];
            let current = self.bits[idx as usize];
            encode_segment(t - k, previous, current)
        } else {
            // -0.5 <= t < 0, or n-1 <= t < n-0.5
            let k = t.ceil();
            let idx = t.round() as isize;
            let bit = self.bits[idx.clamp(0, self.bits.len() as isize - 1) as usize];
            encode_boundary(t - k, bit, t < 0.0)
        }
    }

    /// A lazy, finite, non-restartable decoder over this signal's own bits,
    /// sampling at `t ± cfg.epsilon` around each integer instant.
    pub fn decode(&self, cfg: LineConfig) -> Decoder<'_> {
        Decoder {
            signal: self,
            cfg,
            next_t: 0,
            consecutive_silence: 0,
            done: false,
        }
    }
}

/// One element of a decoded Manchester stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// A detected `0` or `1` bit.
    Bit(bool),
    /// No transition detected at this instant.
    Silence,
}

/// A lazy, finite, non-restartable iterator over a [`Signal`]'s samples.
///
/// Stops after [`LineConfig::dead_signal_threshold`] consecutive
/// [`Sample::Silence`]s, or once every integer instant in the signal's
/// domain has been sampled, whichever comes first.
pub struct Decoder<'a> {
    signal: &'a Signal,
    cfg: LineConfig,
    next_t: i64,
    consecutive_silence: usize,
    done: bool,
}

impl Iterator for Decoder<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.done {
            return None;
        }
        let t = self.next_t as f64;
        if t >= self.signal.len() as f64 {
            self.done = true;
            return None;
        }
        self.next_t += 1;

        let before = self.signal.at(t - self.cfg.epsilon);
        let after = self.signal.at(t + self.cfg.epsilon);

        let sample = if before == 0.0 && after == 0.0 {
            self.consecutive_silence += 1;
            Sample::Silence
        } else {
            self.consecutive_silence = 0;
            Sample::Bit(after > before)
        };

        if self.consecutive_silence >= self.cfg.dead_signal_threshold {
            self.done = true;
        }

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_from_str(s: &str) -> Vec<bool> {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn encode_then_sample_recovers_each_bit() {
        let bits = bits_from_str("1001001010111100001010101011101010010011000101111100000010000111");
        let signal = Signal::new(bits.clone());
        let epsilon = 0.01;
        for (i, &expected) in bits.iter().enumerate() {
            let t = i as f64;
            let found = signal.at(t + epsilon) > signal.at(t - epsilon);
            assert_eq!(found, expected, "bit {i}");
        }
    }

    #[test]
    fn decode_recovers_original_bit_sequence() {
        let bits = bits_from_str("10010101101011111100011001001101010000011111110011011001110001110");
        let signal = Signal::new(bits.clone());
        let decoded: Vec<bool> = signal
            .decode(LineConfig::default())
            .take(bits.len())
            .map(|s| matches!(s, Sample::Bit(true)))
            .collect();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn decoder_is_finite_and_terminates() {
        let signal = Signal::new(bits_from_str("101"));
        let samples: Vec<Sample> = signal.decode(LineConfig::default()).collect();
        assert_eq!(samples.len(), 3);
    }

    #[test]
    fn empty_signal_decodes_to_nothing() {
        let signal = Signal::new(vec![]);
        let samples: Vec<Sample> = signal.decode(LineConfig::default()).collect();
        assert!(samples.is_empty());
    }
}
