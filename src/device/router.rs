//! An IPv4 router: local delivery, directly-attached-network delivery,
//! longest-prefix-match forwarding, and a default-route fallback, with
//! ARP resolution on Ethernet-attached links and plain encapsulation on
//! point-to-point HDLC/PPP links.

use std::collections::HashMap;

use crate::arp::{ArpOperation, ArpPacket, Ipv4Addr};
use crate::error::{Result, StackError};
use crate::eth::{EtherType, EthernetFrame};
use crate::hdlc::{ControlField, HdlcFrame, UnnumberedType};
use crate::ip::v4::Ipv4Packet;
use crate::mac::MacAddr;
use crate::ppp::{PppFrame, PppProtocol};
use crate::trie::{insert_key, Ipv4Network, Ipv4Trie, ToSymbols};

use super::{network_prefix_eq, Device, EthernetAdapter, InterfaceKind, NetworkInterface};

/// What a routing decision resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The destination is one of this router's own addresses.
    Local,
    /// Forward out the named interface.
    Forward(usize),
}

/// A router with Ethernet (ARP-resolved), HDLC, and PPP interfaces, an IPv4
/// longest-prefix-match forwarding table, and an optional default route.
///
/// Only IPv4 is forwarded; an IPv6 packet arriving on any interface is
/// logged and dropped (see the Open Question decision in `DESIGN.md`).
pub struct IpRouter {
    name: String,
    interfaces: Vec<NetworkInterface>,
    point_to_point: HashMap<usize, Ipv4Network>,
    forwarding_table: Ipv4Trie<usize>,
    default_interface: Option<usize>,
}

impl IpRouter {
    /// A router with no interfaces, routes, or default.
    pub fn new(name: impl Into<String>) -> Self {
        IpRouter {
            name: name.into(),
            interfaces: Vec::new(),
            point_to_point: HashMap::new(),
            forwarding_table: Ipv4Trie::new(),
            default_interface: None,
        }
    }

    /// Add an ARP-capable Ethernet interface, returning its index.
    pub fn add_ethernet_interface(&mut self, mac: MacAddr, ipv4: Ipv4Addr, prefix_len: u8) -> usize {
        let idx = self.interfaces.len();
        self.interfaces.push(NetworkInterface::new_with_arp(idx, EthernetAdapter::new(mac, ipv4, prefix_len)));
        idx
    }

    /// Add a point-to-point HDLC interface, returning its index.
    pub fn add_hdlc_interface(&mut self, ipv4: Ipv4Addr, prefix_len: u8) -> usize {
        self.add_point_to_point(InterfaceKind::Hdlc, ipv4, prefix_len)
    }

    /// Add a point-to-point PPP interface, returning its index.
    pub fn add_ppp_interface(&mut self, ipv4: Ipv4Addr, prefix_len: u8) -> usize {
        self.add_point_to_point(InterfaceKind::Ppp, ipv4, prefix_len)
    }

    fn add_point_to_point(&mut self, kind: InterfaceKind, ipv4: Ipv4Addr, prefix_len: u8) -> usize {
        let idx = self.interfaces.len();
        self.interfaces.push(NetworkInterface::new(idx, kind));
        self.point_to_point.insert(idx, Ipv4Network { address: ipv4, prefix_len });
        idx
    }

    /// Add a forwarding-table entry: packets for `network` go out `out_idx`.
    pub fn add_route(&mut self, network: Ipv4Network, out_idx: usize) {
        insert_key(&mut self.forwarding_table, &network, out_idx);
    }

    /// Set the interface used when no more specific route matches.
    pub fn set_default_interface(&mut self, idx: usize) {
        self.default_interface = Some(idx);
    }

    fn own_network(&self, idx: usize) -> Option<Ipv4Network> {
        if let Some(net) = self.point_to_point.get(&idx) {
            return Some(*net);
        }
        self.interfaces.get(idx)?.eth.as_ref().map(|eth| Ipv4Network { address: eth.ipv4, prefix_len: eth.prefix_len })
    }

    fn own_address(&self, idx: usize) -> Option<Ipv4Addr> {
        self.own_network(idx).map(|net| net.address)
    }

    fn is_own_address(&self, addr: Ipv4Addr) -> bool {
        (0..self.interfaces.len()).any(|idx| self.own_address(idx) == Some(addr))
    }

    fn local_interface_for(&self, addr: Ipv4Addr) -> Option<usize> {
        (0..self.interfaces.len()).find(|&idx| {
            self.own_network(idx).is_some_and(|net| network_prefix_eq(net.address, addr, net.prefix_len))
        })
    }

    fn best_route(&self, addr: Ipv4Addr) -> Option<usize> {
        let matched = self.forwarding_table.find_best_match_symbols(&addr.to_symbols())?;
        self.forwarding_table.get(&matched).copied()
    }

    /// Resolve where `destination` should go: this router's own address,
    /// a directly-attached network, the longest matching route, the
    /// default route, or failure if none of those apply.
    pub fn route(&self, destination: Ipv4Addr) -> Result<RouteOutcome> {
        if self.is_own_address(destination) {
            return Ok(RouteOutcome::Local);
        }
        if let Some(idx) = self.local_interface_for(destination) {
            return Ok(RouteOutcome::Forward(idx));
        }
        if let Some(idx) = self.best_route(destination) {
            return Ok(RouteOutcome::Forward(idx));
        }
        if let Some(idx) = self.default_interface {
            return Ok(RouteOutcome::Forward(idx));
        }
        Err(StackError::ResolutionFailure(format!("no route to {destination:?}")))
    }

    fn forward_packet(&self, packet: Ipv4Packet, in_idx: usize) {
        let mut packet = packet;
        match self.route(packet.header.destination) {
            Ok(RouteOutcome::Local) => {
                tracing::debug!(router = %self.name, "packet addressed to this router, no upper layer to deliver to");
            }
            Ok(RouteOutcome::Forward(out_idx)) => match packet.decrement_ttl() {
                Ok(_) => {
                    if let Err(err) = self.send_encapsulated(out_idx, &packet) {
                        tracing::debug!(%err, router = %self.name, port = out_idx, "could not forward packet");
                    }
                }
                Err(err) => tracing::debug!(%err, router = %self.name, in_port = in_idx, "dropping packet, ttl exceeded"),
            },
            Err(err) => tracing::debug!(%err, router = %self.name, in_port = in_idx, "no route for packet"),
        }
    }

    /// Encapsulate `packet` for `out_idx`'s link kind and send it. On an
    /// Ethernet link this resolves the destination's MAC via the interface's
    /// ARP cache, sending a single ARP request and re-checking the cache
    /// once on a miss before giving up; HDLC and PPP links carry the packet
    /// directly, with no address resolution step.
    fn send_encapsulated(&self, out_idx: usize, packet: &Ipv4Packet) -> Result<()> {
        match self.interfaces.get(out_idx).map(NetworkInterface::kind) {
            Some(InterfaceKind::EthernetWithArp) => {
                let adapter = self.interfaces[out_idx].eth.as_ref().expect("EthernetWithArp interface always carries an adapter");
                let destination = packet.header.destination;
                let target_mac = match adapter.arp_cache.get(&destination).copied() {
                    Some(mac) => mac,
                    None => {
                        let request = ArpPacket::request(adapter.mac, adapter.ipv4, destination, None);
                        let frame = EthernetFrame::new(MacAddr::BROADCAST, adapter.mac, request.encode().to_vec(), EtherType::Arp)?;
                        let _ = self.send_on(out_idx, frame.encode());
                        let adapter = self.interfaces[out_idx].eth.as_ref().expect("still present after sending");
                        adapter.arp_cache.get(&destination).copied().ok_or_else(|| {
                            StackError::ResolutionFailure(format!("could not resolve {destination:?} after one retry"))
                        })?
                    }
                };
                let own_mac = self.interfaces[out_idx].eth.as_ref().unwrap().mac;
                let frame = EthernetFrame::new(target_mac, own_mac, packet.encode(), EtherType::IpV4)?;
                self.send_on(out_idx, frame.encode())
            }
            Some(InterfaceKind::Hdlc) => {
                let frame = HdlcFrame::new(0xFF, ControlField::Unnumbered { pf: false, u_type: UnnumberedType::Ui }, packet.encode())?;
                self.send_on(out_idx, frame.encode_frame())
            }
            Some(InterfaceKind::Ppp) => {
                let frame = PppFrame::new(PppProtocol::IpV4, packet.encode());
                self.send_on(out_idx, frame.encode_frame())
            }
            _ => Err(StackError::Wiring(format!("interface {out_idx} on {} cannot carry IP traffic", self.name))),
        }
    }

    fn handle_arp(&mut self, in_idx: usize, packet: ArpPacket) {
        let Some(own_ip) = self.own_address(in_idx) else { return };
        if packet.target_ip != own_ip {
            tracing::debug!(router = %self.name, port = in_idx, target = ?packet.target_ip, "dropping ARP packet not addressed to this interface");
            return;
        }
        if packet.sender_ip != own_ip {
            if let Some(eth) = self.interfaces[in_idx].eth.as_mut() {
                eth.arp_cache.insert(packet.sender_ip, packet.sender_mac);
            }
        }
        if packet.operation != ArpOperation::Request {
            return;
        }
        let Some(own_mac) = self.interfaces[in_idx].eth.as_ref().map(|eth| eth.mac) else { return };
        let reply = match packet.to_reply(own_mac) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(%err, router = %self.name, "cannot build ARP reply");
                return;
            }
        };
        let frame = match EthernetFrame::new(packet.sender_mac, own_mac, reply.encode().to_vec(), EtherType::Arp) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, router = %self.name, "cannot frame ARP reply");
                return;
            }
        };
        if let Err(err) = self.send_on(in_idx, frame.encode()) {
            tracing::debug!(%err, router = %self.name, "cannot send ARP reply, interface unwired");
        }
    }
}

impl Device for IpRouter {
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
        let Some(kind) = self.interfaces.get(in_idx).map(NetworkInterface::kind) else { return };
        match kind {
            InterfaceKind::EthernetWithArp => {
                let frame = match EthernetFrame::decode(&bytes) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed frame");
                        return;
                    }
                };
                let own_mac = self.interfaces[in_idx].eth.as_ref().map(|eth| eth.mac);
                if Some(frame.destination) != own_mac && !frame.destination.is_broadcast() {
                    return;
                }
                match frame.ethertype {
                    EtherType::Arp => match ArpPacket::decode(&frame.payload) {
                        Ok(packet) => self.handle_arp(in_idx, packet),
                        Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed ARP packet"),
                    },
                    EtherType::IpV4 => match Ipv4Packet::decode(&frame.payload) {
                        Ok(packet) => self.forward_packet(packet, in_idx),
                        Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed IPv4 packet"),
                    },
                    other => tracing::debug!(router = %self.name, port = in_idx, ethertype = ?other, "dropping unsupported ethertype"),
                }
            }
            InterfaceKind::Hdlc => match HdlcFrame::decode_frame(&bytes, false) {
                Ok(frame) => match Ipv4Packet::decode(&frame.information) {
                    Ok(packet) => self.forward_packet(packet, in_idx),
                    Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed IPv4 packet"),
                },
                Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed HDLC frame"),
            },
            InterfaceKind::Ppp => match PppFrame::decode_frame(&bytes) {
                Ok(frame) if frame.protocol == PppProtocol::IpV4 => match Ipv4Packet::decode(&frame.information) {
                    Ok(packet) => self.forward_packet(packet, in_idx),
                    Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed IPv4 packet"),
                },
                Ok(frame) => tracing::debug!(router = %self.name, port = in_idx, protocol = ?frame.protocol, "dropping unsupported PPP protocol"),
                Err(err) => tracing::warn!(%err, router = %self.name, port = in_idx, "dropping malformed PPP frame"),
            },
            other => tracing::debug!(router = %self.name, port = in_idx, kind = ?other, "interface kind cannot carry IP traffic"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{connect, handle, host::IpHost};
    use crate::ip::Protocol;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([n; 6])
    }

    fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
        Ipv4Addr::new([a, b, c, d])
    }

    #[test]
    fn route_prefers_local_network_over_the_forwarding_table() {
        let mut router = IpRouter::new("R1");
        router.add_ethernet_interface(mac(1), ip(192, 168, 1, 1), 24);
        router.add_route(Ipv4Network { address: ip(192, 168, 1, 0), prefix_len: 24 }, 5);

        assert_eq!(router.route(ip(192, 168, 1, 50)).unwrap(), RouteOutcome::Forward(0));
    }

    #[test]
    fn route_falls_back_to_default_when_nothing_else_matches() {
        let mut router = IpRouter::new("R1");
        router.add_ethernet_interface(mac(1), ip(192, 168, 1, 1), 24);
        router.set_default_interface(0);

        assert_eq!(router.route(ip(8, 8, 8, 8)).unwrap(), RouteOutcome::Forward(0));
    }

    #[test]
    fn route_fails_when_no_route_and_no_default() {
        let router = {
            let mut r = IpRouter::new("R1");
            r.add_ethernet_interface(mac(1), ip(192, 168, 1, 1), 24);
            r
        };
        assert!(router.route(ip(8, 8, 8, 8)).is_err());
    }

    #[test]
    fn forwards_between_two_ethernet_subnets() {
        let router = handle(IpRouter::new("R1"));
        router.borrow_mut().add_ethernet_interface(mac(1), ip(10, 0, 0, 1), 24);
        router.borrow_mut().add_ethernet_interface(mac(2), ip(10, 0, 1, 1), 24);
        router.borrow_mut().add_route(Ipv4Network { address: ip(10, 0, 1, 0), prefix_len: 24 }, 1);
        router.borrow_mut().add_route(Ipv4Network { address: ip(10, 0, 0, 0), prefix_len: 24 }, 0);

        let host_a = handle(IpHost::new("A", mac(10), ip(10, 0, 0, 50), 24));
        let host_b = handle(IpHost::new("B", mac(20), ip(10, 0, 1, 50), 24));
        connect(&router, 0, &host_a, 0).unwrap();
        connect(&router, 1, &host_b, 0).unwrap();

        // Pre-resolve ARP both ways so the router's forward doesn't need
        // a live retry (see `send_encapsulated`'s Open Question note).
        host_a.borrow_mut().send_arp_for(ip(10, 0, 0, 1)).unwrap();
        router.borrow_mut().handle_arp(1, ArpPacket::request(mac(20), ip(10, 0, 1, 50), ip(10, 0, 1, 1), None));

        let packet = crate::ip::v4::Ipv4Packet::new(ip(10, 0, 0, 50), ip(10, 0, 1, 50), Protocol::Udp, 64, vec![1, 2, 3]).unwrap();
        host_a.borrow_mut().send_ip(mac(1), &crate::ip::IpPacket::V4(packet)).unwrap();

        assert_eq!(host_b.borrow().delivered().len(), 1);
    }
}
