//! Scripted single-node transport

use crate::error::{BridgeError, Result};
use crate::transport::{Connector, LinkConfig, RxHeader, Transport};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame recorded by `send_wait`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub to: u8,
    pub data: Vec<u8>,
}

enum Inbound {
    Datagram { header: RxHeader, data: Vec<u8> },
    Corrupt,
}

struct ScriptState {
    inbound: VecDeque<Inbound>,
    send_results: VecDeque<bool>,
    default_send_ok: bool,
    sent: Vec<SentFrame>,
    hold_sends: bool,
    sends_started: usize,
    available_calls: usize,
    connect_error: Option<String>,
    init_ok: bool,
    address: u8,
    retries: u8,
    timeout_ms: u16,
    promiscuous: bool,
    retransmissions: u32,
}

struct Script {
    state: Mutex<ScriptState>,
    changed: Condvar,
}

/// Control side of a scripted transport
///
/// Clones share the same script; every transport built from it sees the
/// same queues.
#[derive(Clone)]
pub struct ScriptHandle {
    script: Arc<Script>,
}

impl ScriptHandle {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Script {
                state: Mutex::new(ScriptState {
                    inbound: VecDeque::new(),
                    send_results: VecDeque::new(),
                    default_send_ok: true,
                    sent: Vec::new(),
                    hold_sends: false,
                    sends_started: 0,
                    available_calls: 0,
                    connect_error: None,
                    init_ok: true,
                    address: 0,
                    retries: 0,
                    timeout_ms: 0,
                    promiscuous: false,
                    retransmissions: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn connector(&self) -> ScriptedConnector {
        ScriptedConnector {
            handle: self.clone(),
        }
    }

    pub fn transport(&self) -> ScriptedTransport {
        ScriptedTransport {
            script: self.script.clone(),
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Queue a valid datagram
    pub fn push_datagram(&self, from: u8, to: u8, id: u8, flags: u8, data: &[u8]) {
        let header = RxHeader {
            len: data.len() as u8,
            from,
            to,
            id,
            flags,
        };
        self.script.state.lock().inbound.push_back(Inbound::Datagram {
            header,
            data: data.to_vec(),
        });
    }

    /// Queue a datagram the transport will reject on receive
    pub fn push_corrupt(&self) {
        self.script.state.lock().inbound.push_back(Inbound::Corrupt);
    }

    pub fn pending_inbound(&self) -> usize {
        self.script.state.lock().inbound.len()
    }

    pub fn available_calls(&self) -> usize {
        self.script.state.lock().available_calls
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Outcome of the next `send_wait`, ahead of the default
    pub fn queue_send_result(&self, ok: bool) {
        self.script.state.lock().send_results.push_back(ok);
    }

    pub fn set_default_send_result(&self, ok: bool) {
        self.script.state.lock().default_send_ok = ok;
    }

    /// Make `send_wait` block until `release_sends`
    pub fn hold_sends(&self) {
        self.script.state.lock().hold_sends = true;
    }

    pub fn release_sends(&self) {
        self.script.state.lock().hold_sends = false;
        self.script.changed.notify_all();
    }

    /// Wait until `count` sends have entered `send_wait`
    pub fn wait_for_sends_started(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.script.state.lock();
        while state.sends_started < count {
            if self
                .script
                .changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.sends_started >= count;
            }
        }
        true
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.script.state.lock().sent.clone()
    }

    // =========================================================================
    // Setup & passthrough inspection
    // =========================================================================

    pub fn refuse_connect(&self, reason: impl Into<String>) {
        self.script.state.lock().connect_error = Some(reason.into());
    }

    pub fn fail_init(&self) {
        self.script.state.lock().init_ok = false;
    }

    pub fn address(&self) -> u8 {
        self.script.state.lock().address
    }

    pub fn retries(&self) -> u8 {
        self.script.state.lock().retries
    }

    pub fn timeout_ms(&self) -> u16 {
        self.script.state.lock().timeout_ms
    }

    pub fn promiscuous(&self) -> bool {
        self.script.state.lock().promiscuous
    }

    pub fn set_retransmissions(&self, count: u32) {
        self.script.state.lock().retransmissions = count;
    }
}

impl Default for ScriptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Connector handing out transports bound to one script
pub struct ScriptedConnector {
    handle: ScriptHandle,
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&self, link: &LinkConfig) -> Result<ScriptedTransport> {
        let mut state = self.handle.script.state.lock();
        if let Some(reason) = &state.connect_error {
            return Err(BridgeError::TransportInit {
                port: link.port.clone(),
                reason: reason.clone(),
            });
        }
        state.address = link.address;
        drop(state);
        Ok(self.handle.transport())
    }
}

/// Transport driven by a `ScriptHandle`
pub struct ScriptedTransport {
    script: Arc<Script>,
}

impl Transport for ScriptedTransport {
    fn init(&mut self) -> bool {
        self.script.state.lock().init_ok
    }

    fn available(&mut self) -> bool {
        let mut state = self.script.state.lock();
        state.available_calls += 1;
        !state.inbound.is_empty()
    }

    fn receive_ack(&mut self, buf: &mut [u8]) -> Option<RxHeader> {
        match self.script.state.lock().inbound.pop_front()? {
            Inbound::Datagram { mut header, data } => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                header.len = n as u8;
                Some(header)
            }
            Inbound::Corrupt => None,
        }
    }

    fn send_wait(&mut self, data: &[u8], to: u8) -> bool {
        let mut state = self.script.state.lock();
        state.sends_started += 1;
        self.script.changed.notify_all();
        while state.hold_sends {
            self.script.changed.wait(&mut state);
        }
        let ok = state
            .send_results
            .pop_front()
            .unwrap_or(state.default_send_ok);
        state.sent.push(SentFrame {
            to,
            data: data.to_vec(),
        });
        ok
    }

    fn set_this_address(&mut self, address: u8) {
        self.script.state.lock().address = address;
    }

    fn set_retries(&mut self, retries: u8) {
        self.script.state.lock().retries = retries;
    }

    fn retries(&self) -> u8 {
        self.script.state.lock().retries
    }

    fn retransmissions(&self) -> u32 {
        self.script.state.lock().retransmissions
    }

    fn reset_retransmissions(&mut self) {
        self.script.state.lock().retransmissions = 0;
    }

    fn set_timeout(&mut self, timeout_ms: u16) {
        self.script.state.lock().timeout_ms = timeout_ms;
    }

    fn set_promiscuous(&mut self, promiscuous: bool) {
        self.script.state.lock().promiscuous = promiscuous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_order_and_corrupt() {
        let handle = ScriptHandle::new();
        let mut t = handle.transport();
        handle.push_datagram(0x02, 0x01, 1, 0, b"abc");
        handle.push_corrupt();

        let mut buf = [0u8; 8];
        assert!(t.available());
        let header = t.receive_ack(&mut buf).unwrap();
        assert_eq!(header.len, 3);
        assert_eq!(&buf[..3], b"abc");

        assert!(t.available());
        assert!(t.receive_ack(&mut buf).is_none());
        assert!(!t.available());
        assert_eq!(handle.available_calls(), 3);
    }

    #[test]
    fn test_send_results_queue_then_default() {
        let handle = ScriptHandle::new();
        let mut t = handle.transport();
        handle.queue_send_result(false);

        assert!(!t.send_wait(b"a", 2));
        assert!(t.send_wait(b"b", 3));
        assert_eq!(
            handle.sent(),
            vec![
                SentFrame { to: 2, data: b"a".to_vec() },
                SentFrame { to: 3, data: b"b".to_vec() },
            ]
        );
    }

    #[test]
    fn test_held_send_blocks_until_released() {
        let handle = ScriptHandle::new();
        handle.hold_sends();
        let mut t = handle.transport();
        let sender = std::thread::spawn(move || t.send_wait(b"x", 9));

        assert!(handle.wait_for_sends_started(1, Duration::from_secs(2)));
        assert!(handle.sent().is_empty());

        handle.release_sends();
        assert!(sender.join().unwrap());
        assert_eq!(handle.sent().len(), 1);
    }

    #[test]
    fn test_connect_refused() {
        let handle = ScriptHandle::new();
        handle.refuse_connect("port busy");
        let err = handle
            .connector()
            .connect(&LinkConfig::new("/dev/null", 9600, 1))
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::TransportInit { .. }));
    }
}
