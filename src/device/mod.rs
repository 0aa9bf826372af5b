//! The device fabric: network interfaces wired symmetrically between
//! devices, and the `Device` trait every simulated node implements.
//!
//! Frames cross the wire as already-encoded bytes (`Vec<u8>`); what those
//! bytes mean is decided by the receiving interface's [`InterfaceKind`].
//! `send`/`receive` are ordinary synchronous function calls: a `receive`
//! that forwards or replies calls `send_on` directly, recursing down the
//! call stack exactly as far as the topology requires. There is no queue,
//! no executor, and no reentrancy guard beyond what `RefCell` enforces for
//! free: a device that is already borrowed (mid-`receive`) will panic if
//! something tries to re-enter it before that call returns.

pub mod host;
pub mod router;
pub mod switch;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use host::{EthernetEndpoint, IpHost};
pub use router::IpRouter;
pub use switch::EthernetSwitch;

use crate::arp::Ipv4Addr;
use crate::error::{Result, StackError};
use crate::mac::MacAddr;

/// A shared handle to a device, wired into the fabric by reference.
pub type DeviceHandle = Rc<RefCell<dyn Device>>;

/// What kind of link a [`NetworkInterface`] speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    /// Opaque bytes, no framing understood by this crate.
    RawBytes,
    /// Ethernet II / 802.3 framing, no address resolution.
    Ethernet,
    /// HDLC framing (point-to-point, no L2 address).
    Hdlc,
    /// PPP framing (point-to-point, no L2 address).
    Ppp,
    /// Ethernet framing plus an owned MAC/IPv4 pair and ARP cache.
    EthernetWithArp,
}

/// Per-interface state for an [`InterfaceKind::EthernetWithArp`] interface:
/// its own MAC and IPv4 address, and the ARP cache mapping peers' IPv4
/// addresses to their MAC addresses.
#[derive(Debug, Clone)]
pub struct EthernetAdapter {
    /// This interface's own MAC address.
    pub mac: MacAddr,
    /// This interface's own IPv4 address.
    pub ipv4: Ipv4Addr,
    /// Subnet prefix length, used by routers to decide "local" delivery.
    pub prefix_len: u8,
    /// Resolved neighbors: IPv4 address to MAC address.
    pub arp_cache: HashMap<Ipv4Addr, MacAddr>,
}

impl EthernetAdapter {
    /// Build a fresh adapter with an empty ARP cache.
    pub fn new(mac: MacAddr, ipv4: Ipv4Addr, prefix_len: u8) -> Self {
        EthernetAdapter { mac, ipv4, prefix_len, arp_cache: HashMap::new() }
    }

    /// `true` if `addr` falls within this adapter's subnet.
    pub fn is_local(&self, addr: Ipv4Addr) -> bool {
        network_prefix_eq(self.ipv4, addr, self.prefix_len)
    }
}

/// `true` if `a` and `b` share the same leading `prefix_len` bits.
pub fn network_prefix_eq(a: Ipv4Addr, b: Ipv4Addr, prefix_len: u8) -> bool {
    let a = u32::from_be_bytes(a.0);
    let b = u32::from_be_bytes(b.0);
    let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len as u32) };
    (a & mask) == (b & mask)
}

/// A single interface belonging to a device: a stable index, a kind, the
/// optional peer it is wired to, and (for [`InterfaceKind::EthernetWithArp`])
/// its own adapter state.
#[derive(Clone)]
pub struct NetworkInterface {
    index: usize,
    kind: InterfaceKind,
    peer: Option<(DeviceHandle, usize)>,
    /// Present only for [`InterfaceKind::EthernetWithArp`] interfaces.
    pub eth: Option<EthernetAdapter>,
}

impl std::fmt::Debug for NetworkInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("index", &self.index)
            .field("kind", &self.kind)
            .field("wired", &self.peer.is_some())
            .finish()
    }
}

impl NetworkInterface {
    /// A new, unwired interface of the given kind.
    pub fn new(index: usize, kind: InterfaceKind) -> Self {
        NetworkInterface { index, kind, peer: None, eth: None }
    }

    /// A new, unwired [`InterfaceKind::EthernetWithArp`] interface.
    pub fn new_with_arp(index: usize, adapter: EthernetAdapter) -> Self {
        NetworkInterface { index, kind: InterfaceKind::EthernetWithArp, peer: None, eth: Some(adapter) }
    }

    /// This interface's stable index within its owning device.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The kind of framing this interface speaks.
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// `true` if a peer is wired to this interface.
    pub fn is_wired(&self) -> bool {
        self.peer.is_some()
    }
}

/// A named collection of interfaces implementing `receive`; devices forward,
/// reply, or deliver locally entirely from within `receive`.
pub trait Device {
    /// A human-readable name, used in diagnostics.
    fn name(&self) -> &str;

    /// This device's interfaces, in index order.
    fn interfaces(&self) -> &[NetworkInterface];

    /// Mutable access to this device's interfaces, for wiring and ARP-cache
    /// updates.
    fn interfaces_mut(&mut self) -> &mut [NetworkInterface];

    /// Handle a frame that arrived on `in_idx`.
    fn receive(&mut self, in_idx: usize, bytes: Vec<u8>);

    /// Send `bytes` out `out_idx`: look up the wired peer and deliver
    /// straight into its `receive`. Available from `&self`, so device
    /// implementations can call it recursively from within their own
    /// `receive` without needing a handle to themselves.
    fn send_on(&self, out_idx: usize, bytes: Vec<u8>) -> Result<()> {
        let iface = self
            .interfaces()
            .get(out_idx)
            .ok_or_else(|| StackError::Wiring(format!("{} has no interface {out_idx}", self.name())))?;
        let (peer_device, peer_idx) = iface
            .peer
            .clone()
            .ok_or_else(|| StackError::Wiring(format!("interface {out_idx} on {} is not wired", self.name())))?;
        peer_device.borrow_mut().receive(peer_idx, bytes);
        Ok(())
    }
}

/// Build a shared handle for a device, ready to be wired with [`connect`].
pub fn handle<D: Device + 'static>(device: D) -> DeviceHandle {
    Rc::new(RefCell::new(device))
}

/// Symmetrically wire interface `a_idx` of `a` to interface `b_idx` of `b`.
/// Fails if either interface is already wired, or if the two endpoints name
/// the same interface of the same device.
pub fn connect(a: &DeviceHandle, a_idx: usize, b: &DeviceHandle, b_idx: usize) -> Result<()> {
    if Rc::ptr_eq(a, b) && a_idx == b_idx {
        return Err(StackError::Wiring("cannot wire an interface to itself".into()));
    }
    {
        let a_ref = a.borrow();
        let iface = a_ref
            .interfaces()
            .get(a_idx)
            .ok_or_else(|| StackError::Wiring(format!("{} has no interface {a_idx}", a_ref.name())))?;
        if iface.is_wired() {
            return Err(StackError::Wiring(format!("interface {a_idx} on {} is already wired", a_ref.name())));
        }
    }
    {
        let b_ref = b.borrow();
        let iface = b_ref
            .interfaces()
            .get(b_idx)
            .ok_or_else(|| StackError::Wiring(format!("{} has no interface {b_idx}", b_ref.name())))?;
        if iface.is_wired() {
            return Err(StackError::Wiring(format!("interface {b_idx} on {} is already wired", b_ref.name())));
        }
    }
    a.borrow_mut().interfaces_mut()[a_idx].peer = Some((Rc::clone(b), b_idx));
    b.borrow_mut().interfaces_mut()[b_idx].peer = Some((Rc::clone(a), a_idx));
    Ok(())
}

/// Tear down the wiring on `idx`, if any, on both ends atomically.
pub fn disconnect(device: &DeviceHandle, idx: usize) -> Result<()> {
    let peer = {
        let mut dev_ref = device.borrow_mut();
        let iface = dev_ref
            .interfaces_mut()
            .get_mut(idx)
            .ok_or_else(|| StackError::Wiring(format!("{} has no interface {idx}", dev_ref.name())))?;
        iface.peer.take()
    };
    if let Some((peer_device, peer_idx)) = peer {
        if let Some(peer_iface) = peer_device.borrow_mut().interfaces_mut().get_mut(peer_idx) {
            peer_iface.peer = None;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        name: String,
        interfaces: Vec<NetworkInterface>,
        received: Rc<RefCell<Vec<(usize, Vec<u8>)>>>,
    }

    impl Echo {
        fn new(name: &str, n: usize, received: Rc<RefCell<Vec<(usize, Vec<u8>)>>>) -> Self {
            Echo {
                name: name.into(),
                interfaces: (0..n).map(|i| NetworkInterface::new(i, InterfaceKind::RawBytes)).collect(),
                received,
            }
        }
    }

    impl Device for Echo {
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
            self.received.borrow_mut().push((in_idx, bytes));
        }
    }

    #[test]
    fn connect_is_symmetric_and_send_reaches_the_peer() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = handle(Echo::new("A", 1, Rc::new(RefCell::new(Vec::new()))));
        let b = handle(Echo::new("B", 1, Rc::clone(&log)));
        connect(&a, 0, &b, 0).unwrap();
        a.borrow().send_on(0, vec![1, 2, 3]).unwrap();
        assert_eq!(*log.borrow(), vec![(0, vec![1, 2, 3])]);
    }

    fn blank_echo(name: &str, n: usize) -> Echo {
        Echo::new(name, n, Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn wiring_the_same_interface_twice_fails() {
        let a = handle(blank_echo("A", 1));
        let b = handle(blank_echo("B", 1));
        let c = handle(blank_echo("C", 1));
        connect(&a, 0, &b, 0).unwrap();
        assert!(connect(&a, 0, &c, 0).is_err());
    }

    #[test]
    fn disconnect_clears_both_sides() {
        let a = handle(blank_echo("A", 1));
        let b = handle(blank_echo("B", 1));
        connect(&a, 0, &b, 0).unwrap();
        disconnect(&a, 0).unwrap();
        assert!(!a.borrow().interfaces()[0].is_wired());
        assert!(!b.borrow().interfaces()[0].is_wired());
    }

    #[test]
    fn sending_on_an_unwired_interface_fails() {
        let a = handle(blank_echo("A", 1));
        assert!(a.borrow().send_on(0, vec![]).is_err());
    }
}
