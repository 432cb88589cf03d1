//! Shared simulated medium for several nodes

use crate::constants::BROADCAST_ADDRESS;
use crate::error::{BridgeError, Result};
use crate::transport::{Connector, LinkConfig, RxHeader, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

struct NodeState {
    address: u8,
    promiscuous: bool,
    inbox: VecDeque<(RxHeader, Vec<u8>)>,
    retries: u8,
    timeout_ms: u16,
    retransmissions: u32,
    next_id: u8,
}

impl NodeState {
    fn accepts(&self, to: u8) -> bool {
        self.promiscuous || to == BROADCAST_ADDRESS || to == self.address
    }
}

#[derive(Default)]
struct Air {
    nodes: HashMap<u64, NodeState>,
    next_node: u64,
}

impl Air {
    /// Deliver to every accepting node except `sender`; true if `to` was reached
    fn deliver(&mut self, sender: Option<u64>, header: RxHeader, data: &[u8]) -> bool {
        let mut reached = header.to == BROADCAST_ADDRESS;
        for (id, node) in self.nodes.iter_mut() {
            if Some(*id) == sender || !node.accepts(header.to) {
                continue;
            }
            reached |= node.address == header.to;
            node.inbox.push_back((header, data.to_vec()));
        }
        reached
    }
}

/// Simulated half-duplex medium
///
/// Cloning yields another handle to the same medium.
#[derive(Clone, Default)]
pub struct SimAir {
    inner: Arc<Mutex<Air>>,
}

impl SimAir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> SimConnector {
        SimConnector { air: self.clone() }
    }

    /// Put a frame on the air from a node that is not bridged
    ///
    /// Returns whether a node owning `to` (or broadcast) received it.
    pub fn inject(&self, from: u8, to: u8, id: u8, flags: u8, data: &[u8]) -> bool {
        let header = RxHeader {
            len: data.len() as u8,
            from,
            to,
            id,
            flags,
        };
        self.inner.lock().deliver(None, header, data)
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

/// Registers a new node on a `SimAir` for each `open`
pub struct SimConnector {
    air: SimAir,
}

impl Connector for SimConnector {
    type Transport = SimNode;

    fn connect(&self, link: &LinkConfig) -> Result<SimNode> {
        let mut air = self.air.inner.lock();
        if air.nodes.values().any(|n| n.address == link.address) {
            return Err(BridgeError::TransportInit {
                port: link.port.clone(),
                reason: format!("address 0x{:02X} already in use", link.address),
            });
        }
        let id = air.next_node;
        air.next_node += 1;
        air.nodes.insert(
            id,
            NodeState {
                address: link.address,
                promiscuous: false,
                inbox: VecDeque::new(),
                retries: 0,
                timeout_ms: 0,
                retransmissions: 0,
                next_id: 0,
            },
        );
        Ok(SimNode {
            air: self.air.clone(),
            id,
        })
    }
}

/// One node's transport on a `SimAir`
///
/// Leaves the air when dropped.
pub struct SimNode {
    air: SimAir,
    id: u64,
}

impl SimNode {
    fn with_node<R>(&self, f: impl FnOnce(&mut NodeState) -> R) -> Option<R> {
        self.air.inner.lock().nodes.get_mut(&self.id).map(f)
    }
}

impl Transport for SimNode {
    fn init(&mut self) -> bool {
        self.with_node(|_| ()).is_some()
    }

    fn available(&mut self) -> bool {
        self.with_node(|n| !n.inbox.is_empty()).unwrap_or(false)
    }

    fn receive_ack(&mut self, buf: &mut [u8]) -> Option<RxHeader> {
        let (mut header, data) = self.with_node(|n| n.inbox.pop_front()).flatten()?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        header.len = n as u8;
        Some(header)
    }

    fn send_wait(&mut self, data: &[u8], to: u8) -> bool {
        let mut air = self.air.inner.lock();
        let Some(node) = air.nodes.get_mut(&self.id) else {
            return false;
        };
        let header = RxHeader {
            len: data.len() as u8,
            from: node.address,
            to,
            id: node.next_id,
            flags: 0,
        };
        node.next_id = node.next_id.wrapping_add(1);

        let reached = air.deliver(Some(self.id), header, data);
        if !reached {
            if let Some(node) = air.nodes.get_mut(&self.id) {
                node.retransmissions += node.retries as u32;
            }
        }
        reached
    }

    fn set_this_address(&mut self, address: u8) {
        self.with_node(|n| n.address = address);
    }

    fn set_retries(&mut self, retries: u8) {
        self.with_node(|n| n.retries = retries);
    }

    fn retries(&self) -> u8 {
        self.with_node(|n| n.retries).unwrap_or(0)
    }

    fn retransmissions(&self) -> u32 {
        self.with_node(|n| n.retransmissions).unwrap_or(0)
    }

    fn reset_retransmissions(&mut self) {
        self.with_node(|n| n.retransmissions = 0);
    }

    fn set_timeout(&mut self, timeout_ms: u16) {
        self.with_node(|n| n.timeout_ms = timeout_ms);
    }

    fn set_promiscuous(&mut self, promiscuous: bool) {
        self.with_node(|n| n.promiscuous = promiscuous);
    }
}

impl Drop for SimNode {
    fn drop(&mut self) {
        self.air.inner.lock().nodes.remove(&self.id);
    }
}
