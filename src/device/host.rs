//! End-host devices: a bare Ethernet endpoint with no network-layer
//! awareness, and an ARP-capable IP host.

use crate::arp::{ArpOperation, ArpPacket, Ipv4Addr};
use crate::error::Result;
use crate::eth::{EtherType, EthernetFrame};
use crate::ip::{IpPacket, Protocol};
use crate::mac::MacAddr;

use super::{Device, EthernetAdapter, InterfaceKind, NetworkInterface};

/// A single-interface Ethernet device with no network-layer logic: it keeps
/// the last frame addressed to it and silently drops everything else.
pub struct EthernetEndpoint {
    name: String,
    mac: MacAddr,
    interfaces: Vec<NetworkInterface>,
    last_received: Option<EthernetFrame>,
}

impl EthernetEndpoint {
    /// Build a new endpoint with a single unwired Ethernet interface.
    pub fn new(name: impl Into<String>, mac: MacAddr) -> Self {
        EthernetEndpoint {
            name: name.into(),
            mac,
            interfaces: vec![NetworkInterface::new(0, InterfaceKind::Ethernet)],
            last_received: None,
        }
    }

    /// This endpoint's MAC address.
    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    /// The last frame accepted (addressed to this endpoint or broadcast),
    /// if any.
    pub fn last_received(&self) -> Option<&EthernetFrame> {
        self.last_received.as_ref()
    }
}

impl Device for EthernetEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    fn interfaces_mut(&mut self) -> &mut [NetworkInterface] {
        &mut self.interfaces
    }

    fn receive(&mut self, _in_idx: usize, bytes: Vec<u8>) {
        let frame = match EthernetFrame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, endpoint = %self.name, "dropping malformed frame");
                return;
            }
        };
        if frame.destination != self.mac && !frame.destination.is_broadcast() {
            return;
        }
        self.last_received = Some(frame);
    }
}

/// An ARP-aware IP host: a single [`InterfaceKind::EthernetWithArp`]
/// interface. Answers ARP requests for its own address, learns sender
/// mappings from every ARP packet it sees, and delivers IP packets addressed
/// to it. Never forwards; an undeliverable packet is logged and dropped.
pub struct IpHost {
    name: String,
    interfaces: Vec<NetworkInterface>,
    delivered: Vec<IpPacket>,
}

impl IpHost {
    /// Build a new host with a single unwired ARP-capable interface.
    pub fn new(name: impl Into<String>, mac: MacAddr, ipv4: Ipv4Addr, prefix_len: u8) -> Self {
        let adapter = EthernetAdapter::new(mac, ipv4, prefix_len);
        IpHost {
            name: name.into(),
            interfaces: vec![NetworkInterface::new_with_arp(0, adapter)],
            delivered: Vec::new(),
        }
    }

    fn adapter(&self) -> &EthernetAdapter {
        self.interfaces[0].eth.as_ref().expect("IpHost's sole interface always carries an adapter")
    }

    fn adapter_mut(&mut self) -> &mut EthernetAdapter {
        self.interfaces[0].eth.as_mut().expect("IpHost's sole interface always carries an adapter")
    }

    /// This host's MAC address.
    pub fn mac(&self) -> MacAddr {
        self.adapter().mac
    }

    /// This host's IPv4 address.
    pub fn ipv4(&self) -> Ipv4Addr {
        self.adapter().ipv4
    }

    /// The resolved MAC for `ip`, if this host has learned it.
    pub fn resolved_mac(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.adapter().arp_cache.get(&ip).copied()
    }

    /// IP packets delivered to this host so far, oldest first.
    pub fn delivered(&self) -> &[IpPacket] {
        &self.delivered
    }

    /// Build and send an ARP REQUEST for `target_ip` out interface 0.
    pub fn send_arp_for(&mut self, target_ip: Ipv4Addr) -> Result<()> {
        let (mac, ipv4) = (self.mac(), self.ipv4());
        let request = ArpPacket::request(mac, ipv4, target_ip, None);
        let frame = EthernetFrame::new(MacAddr::BROADCAST, mac, request.encode().to_vec(), EtherType::Arp)?;
        self.send_on(0, frame.encode())
    }

    /// Send an already-built IP packet out interface 0 to `destination_mac`.
    pub fn send_ip(&mut self, destination_mac: MacAddr, packet: &IpPacket) -> Result<()> {
        let ethertype = match packet {
            IpPacket::V4(_) => EtherType::IpV4,
            IpPacket::V6(_) => EtherType::IpV6,
        };
        let frame = EthernetFrame::new(destination_mac, self.mac(), packet.encode(), ethertype)?;
        self.send_on(0, frame.encode())
    }

    fn handle_arp(&mut self, packet: ArpPacket) {
        let own_ip = self.ipv4();
        if packet.target_ip != own_ip {
            tracing::debug!(host = %self.name, target = ?packet.target_ip, "dropping ARP packet not addressed to this host");
            return;
        }
        if packet.sender_ip != own_ip {
            self.adapter_mut().arp_cache.insert(packet.sender_ip, packet.sender_mac);
        }
        if packet.operation != ArpOperation::Request {
            return;
        }
        let own_mac = self.mac();
        let reply = match packet.to_reply(own_mac) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(%err, host = %self.name, "cannot build ARP reply");
                return;
            }
        };
        let frame = match EthernetFrame::new(packet.sender_mac, own_mac, reply.encode().to_vec(), EtherType::Arp) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, host = %self.name, "cannot frame ARP reply");
                return;
            }
        };
        if let Err(err) = self.send_on(0, frame.encode()) {
            tracing::debug!(%err, host = %self.name, "cannot send ARP reply, interface unwired");
        }
    }
}

impl Device for IpHost {
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
                tracing::warn!(%err, host = %self.name, "dropping malformed frame");
                return;
            }
        };
        if frame.destination != self.mac() && !frame.destination.is_broadcast() {
            return;
        }
        match frame.ethertype {
            EtherType::Arp => match ArpPacket::decode(&frame.payload) {
                Ok(packet) => self.handle_arp(packet),
                Err(err) => tracing::warn!(%err, host = %self.name, port = in_idx, "dropping malformed ARP packet"),
            },
            EtherType::IpV4 | EtherType::IpV6 => match IpPacket::decode(&frame.payload) {
                Ok(IpPacket::V4(packet)) if packet.header.destination == self.ipv4() => {
                    self.delivered.push(IpPacket::V4(packet));
                }
                Ok(IpPacket::V4(packet)) => {
                    tracing::debug!(host = %self.name, destination = ?packet.header.destination, "dropping IP packet not addressed to this host");
                }
                Ok(packet @ IpPacket::V6(_)) => self.delivered.push(packet),
                Err(err) => tracing::warn!(%err, host = %self.name, port = in_idx, "dropping malformed IP packet"),
            },
            other => tracing::debug!(host = %self.name, ethertype = ?other, "dropping unsupported ethertype"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{connect, handle};
    use crate::ip::Ipv4Packet;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([n; 6])
    }

    fn ip(n: u8) -> Ipv4Addr {
        Ipv4Addr::new([10, 0, 0, n])
    }

    #[test]
    fn endpoint_drops_frames_not_addressed_to_it() {
        let endpoint = handle(EthernetEndpoint::new("A", mac(1)));
        let other = handle(EthernetEndpoint::new("B", mac(2)));
        connect(&endpoint, 0, &other, 0).unwrap();

        let frame = EthernetFrame::new(mac(9), mac(2), b"hi".to_vec(), EtherType::IpV4).unwrap();
        other.borrow().send_on(0, frame.encode()).unwrap();
        assert!(endpoint.borrow().last_received().is_none());
    }

    #[test]
    fn endpoint_keeps_frames_addressed_to_it() {
        let endpoint = handle(EthernetEndpoint::new("A", mac(1)));
        let other = handle(EthernetEndpoint::new("B", mac(2)));
        connect(&endpoint, 0, &other, 0).unwrap();

        let frame = EthernetFrame::new(mac(1), mac(2), b"hi".to_vec(), EtherType::IpV4).unwrap();
        other.borrow().send_on(0, frame.encode()).unwrap();
        assert_eq!(endpoint.borrow().last_received().unwrap().source, mac(2));
    }

    #[test]
    fn arp_request_for_own_address_is_answered_and_cache_updated() {
        let host_a = handle(IpHost::new("A", mac(1), ip(1), 24));
        let host_b = handle(IpHost::new("B", mac(2), ip(2), 24));
        connect(&host_a, 0, &host_b, 0).unwrap();

        host_a.borrow_mut().send_arp_for(ip(2)).unwrap();

        assert_eq!(host_a.borrow().resolved_mac(ip(2)), Some(mac(2)));
    }

    #[test]
    fn arp_request_for_someone_else_is_dropped_without_learning_the_sender() {
        let host_a = handle(IpHost::new("A", mac(1), ip(1), 24));
        let host_b = handle(IpHost::new("B", mac(2), ip(2), 24));
        connect(&host_a, 0, &host_b, 0).unwrap();

        host_a.borrow_mut().send_arp_for(ip(3)).unwrap();

        assert!(host_b.borrow().resolved_mac(ip(1)).is_none());
    }

    #[test]
    fn ip_packet_addressed_to_host_is_delivered() {
        let host_a = handle(IpHost::new("A", mac(1), ip(1), 24));
        let host_b = handle(IpHost::new("B", mac(2), ip(2), 24));
        connect(&host_a, 0, &host_b, 0).unwrap();

        let packet = IpPacket::V4(Ipv4Packet::new(ip(2), ip(1), Protocol::Udp, 64, vec![7, 7, 7]).unwrap());
        host_b.borrow_mut().send_ip(mac(1), &packet).unwrap();

        assert_eq!(host_a.borrow().delivered().len(), 1);
    }
}
