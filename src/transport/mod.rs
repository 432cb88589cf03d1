//! Transport abstraction for the reliable-datagram engine
//!
//! The bridge never frames, checksums or retries anything itself. It drives
//! a `Transport` through blocking primitives:
//! - **available**: is a datagram waiting?
//! - **receive_ack**: read it (and acknowledge it)
//! - **send_wait**: send and block until acknowledged or retries run out
//!
//! A `Connector` builds a transport for a given link (port, baud, address).
//! Hardware connectors live with the driver; `crate::sim` provides
//! in-memory ones.
//!
//! # Threading
//!
//! Transport calls are made from the worker's blocking thread and, for
//! configuration passthroughs and drain-on-start, from the host. The bridge
//! serializes every call behind one mutex, so implementations only need
//! `Send`.

use crate::error::Result;

/// Link parameters handed to a `Connector`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Serial port/device (e.g. `/dev/ttyUSB0`)
    pub port: String,
    /// Baud rate
    pub baud: u32,
    /// Own node address
    pub address: u8,
}

impl LinkConfig {
    pub fn new(port: impl Into<String>, baud: u32, address: u8) -> Self {
        Self {
            port: port.into(),
            baud,
            address,
        }
    }
}

/// Header of a datagram read by `Transport::receive_ack`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxHeader {
    /// Number of payload bytes written to the buffer
    pub len: u8,
    /// Sender address
    pub from: u8,
    /// Destination address (own, broadcast, or any in promiscuous mode)
    pub to: u8,
    /// Message id
    pub id: u8,
    /// Header flags
    pub flags: u8,
}

/// Blocking reliable-datagram engine
///
/// Mirrors the RadioHead reliable datagram manager. All methods may block
/// on I/O; `send_wait` blocks for up to retries × timeout.
pub trait Transport: Send + 'static {
    /// Initialize the manager/driver; `false` makes `open` fail
    fn init(&mut self) -> bool;

    /// Whether a datagram is waiting to be read
    fn available(&mut self) -> bool;

    /// Read the waiting datagram into `buf` and acknowledge it
    ///
    /// Returns `None` if the datagram was rejected (checksum, framing,
    /// duplicate...).
    fn receive_ack(&mut self, buf: &mut [u8]) -> Option<RxHeader>;

    /// Send `data` to `to`, blocking until acknowledged
    ///
    /// Returns `false` when no acknowledgement arrived after all retries.
    /// Broadcasts are not acknowledged and report `true` once sent.
    fn send_wait(&mut self, data: &[u8], to: u8) -> bool;

    fn set_this_address(&mut self, address: u8);

    fn set_retries(&mut self, retries: u8);

    fn retries(&self) -> u8;

    /// Retransmissions since start or last reset
    fn retransmissions(&self) -> u32;

    fn reset_retransmissions(&mut self);

    /// Minimum retransmit timeout in milliseconds
    fn set_timeout(&mut self, timeout_ms: u16);

    /// Accept datagrams for any destination, not only own/broadcast
    fn set_promiscuous(&mut self, promiscuous: bool);
}

/// Factory for transports
///
/// Called by `RadioBridge::open`. Errors should be
/// `BridgeError::TransportInit`.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn connect(&self, link: &LinkConfig) -> Result<Self::Transport>;
}
