//! MAC-learning Ethernet switch.

use std::collections::HashMap;

use crate::eth::EthernetFrame;
use crate::mac::MacAddr;

use super::{Device, InterfaceKind, NetworkInterface};

/// A multi-port Ethernet switch: learns `source MAC → port` on every frame
/// seen, then forwards by lookup, flooding only on a cache miss.
pub struct EthernetSwitch {
    name: String,
    interfaces: Vec<NetworkInterface>,
    cache: HashMap<MacAddr, usize>,
}

impl EthernetSwitch {
    /// Build a switch with `num_ports` unwired Ethernet interfaces.
    pub fn new(name: impl Into<String>, num_ports: usize) -> Self {
        EthernetSwitch {
            name: name.into(),
            interfaces: (0..num_ports).map(|i| NetworkInterface::new(i, InterfaceKind::Ethernet)).collect(),
            cache: HashMap::new(),
        }
    }

    fn learn(&mut self, source: MacAddr, in_idx: usize) {
        self.cache.insert(source, in_idx);
    }

    /// The port this switch has learned for `mac`, if any.
    pub fn learned_port(&self, mac: MacAddr) -> Option<usize> {
        self.cache.get(&mac).copied()
    }

    fn forward(&self, frame_bytes: Vec<u8>, destination: MacAddr, in_idx: usize) {
        if destination.is_broadcast() {
            self.flood(frame_bytes, in_idx);
            return;
        }
        match self.cache.get(&destination) {
            Some(&out_idx) if out_idx != in_idx => {
                if let Err(err) = self.send_on(out_idx, frame_bytes) {
                    tracing::debug!(%err, port = out_idx, "switch forward target is unwired");
                }
            }
            Some(_) => {
                // Cached port is the same port the frame arrived on; never self-loop.
            }
            None => self.flood(frame_bytes, in_idx),
        }
    }

    fn flood(&self, frame_bytes: Vec<u8>, in_idx: usize) {
        for iface in &self.interfaces {
            if iface.index() != in_idx && iface.is_wired() {
                let _ = self.send_on(iface.index(), frame_bytes.clone());
            }
        }
    }
}

impl Device for EthernetSwitch {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    fn interfaces_mut(&mut self) -> &mut [NetworkInterface] {
        &mut self.interfaces
    }

    fn receive(&mut self, in_idx: usize, bytes: Vec<u8>) {
        let frame = match EthernetFrame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, port = in_idx, "switch dropping malformed frame");
                return;
            }
        };
        self.learn(frame.source, in_idx);
        self.forward(bytes, frame.destination, in_idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{connect, handle, host::EthernetEndpoint};
    use crate::eth::EtherType;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([n; 6])
    }

    #[test]
    fn learns_source_port_and_then_unicasts() {
        let switch = handle(EthernetSwitch::new("S1", 3));
        let a = handle(EthernetEndpoint::new("A", mac(1)));
        let b = handle(EthernetEndpoint::new("B", mac(2)));
        let c = handle(EthernetEndpoint::new("C", mac(3)));
        connect(&switch, 0, &a, 0).unwrap();
        connect(&switch, 1, &b, 0).unwrap();
        connect(&switch, 2, &c, 0).unwrap();

        let frame = EthernetFrame::new(mac(2), mac(1), b"hi".to_vec(), EtherType::IpV4).unwrap();
        a.borrow().send_on(0, frame.encode()).unwrap();

        assert_eq!(switch.borrow_mut().learned_port(mac(1)), Some(0));
        assert!(b.borrow().last_received().is_some());
        assert!(c.borrow().last_received().is_none());
    }

    #[test]
    fn unknown_destination_floods_all_other_ports() {
        let switch = handle(EthernetSwitch::new("S1", 3));
        let a = handle(EthernetEndpoint::new("A", mac(1)));
        let b = handle(EthernetEndpoint::new("B", mac(2)));
        let c = handle(EthernetEndpoint::new("C", mac(3)));
        connect(&switch, 0, &a, 0).unwrap();
        connect(&switch, 1, &b, 0).unwrap();
        connect(&switch, 2, &c, 0).unwrap();

        let frame = EthernetFrame::new(mac(2), mac(1), b"hi".to_vec(), EtherType::IpV4).unwrap();
        a.borrow().send_on(0, frame.encode()).unwrap();

        assert!(b.borrow().last_received().is_some());
        assert!(c.borrow().last_received().is_some());
    }
}
