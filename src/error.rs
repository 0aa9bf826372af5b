//! Crate-wide error taxonomy.
//!
//! Every fallible operation in this crate returns [`StackError`]. Stream-level
//! decoders (`frame_stream_decode` and friends) never let `MalformedInput` or
//! `IntegrityFailure` escape to their caller: those are caught, logged via
//! `tracing`, and the offending section is dropped. Single-frame decoders and
//! the device fabric's `forward`/`receive` surface these errors directly.

use thiserror::Error;

/// The full error taxonomy for the simulated stack.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// Insufficient bytes, an unknown enum value (EtherType, HDLC control,
    /// PPP protocol), a bad IP version nibble, or an options length that is
    /// inconsistent with the declared header length.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A frame's FCS did not match, or an IPv4 header checksum did not
    /// verify to zero.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// A payload fell outside an allowed size range, or a PPP frame's
    /// address/control bytes were not the fixed `{0xFF, 0x03}` pair.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// ARP resolution failed after the single permitted retry, or a
    /// longest-prefix-match lookup found no covering entry and no default
    /// route was configured.
    #[error("resolution failure: {0}")]
    ResolutionFailure(String),

    /// An interface was not wired, was already wired, would have been wired
    /// to itself, or received a frame kind it does not support.
    #[error("wiring error: {0}")]
    Wiring(String),

    /// Decrementing a packet's TTL/hop-limit would bring it to zero.
    #[error("ttl exceeded")]
    TtlExceeded,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, StackError>;
