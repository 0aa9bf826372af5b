//! A didactic, end-to-end simulation of the lower layers of a TCP/IP-style
//! network stack: Manchester line coding, link-layer framing (Ethernet II,
//! IEEE 802.3, the HDLC family, PPP), ARP, IPv4/IPv6, and a longest-prefix-match
//! IP router, wired together into a small fabric of simulated hosts, switches
//! and routers.
//!
//! This crate reproduces bit- and byte-exact on-wire representations; it does
//! not perform any real I/O, drive any hardware, or make throughput
//! guarantees. Everything is a synchronous function call over value types.
//!
//! ```rust
//! use wireframe_net::mac::MacAddr;
//! use wireframe_net::eth::{EtherType, EthernetFrame};
//!
//! let dst = MacAddr::new([0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6]);
//! let src = MacAddr::new([0xff, 0x11, 0xaa, 0x55, 0xcc, 0x99]);
//! let frame = EthernetFrame::new(dst, src, b"hello".to_vec(), EtherType::IpV4).unwrap();
//! let bytes = frame.encode();
//! let decoded = EthernetFrame::decode(&bytes).unwrap();
//! assert_eq!(decoded, frame);
//! ```

#![deny(missing_docs)]

pub mod arp;
pub mod bridge;
pub mod device;
pub mod error;
pub mod eth;
pub mod hdlc;
pub mod ip;
pub mod mac;
pub mod manchester;
pub mod ppp;
pub mod toolkit;
pub mod trie;

pub use error::{Result, StackError};
pub use mac::MacAddr;

/// Derive a `From<repr> for Name` / `From<Name> for repr` pair for a closed
/// enum that must still round-trip values outside of its known variants,
/// adding an `Unknown(repr)` catch-all.
///
/// Mirrors the teacher crate's own `enum_with_unknown!` (itself noted there as
/// adapted from `smoltcp`): used throughout this crate (`EtherType`,
/// `arp::ArpOperation`, `ip::Protocol`, `ppp::PppProtocol`, ...) anywhere the
/// wire format carries a numeric tag drawn from an open set, so that decoding
/// an unrecognized value and re-encoding it is lossless.
#[macro_export]
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*,
            /// A value that does not match any known variant; preserved verbatim
            /// so that decode-then-encode round-trips exactly.
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}
