//! Worker loop (runs on a blocking thread)
//!
//! One call to `poll_cycle` is one worker iteration. It loops until exactly
//! one of these happens, then returns so the completion handler can report:
//! - stop requested → `Outcome::Stopped`, without touching the transport
//! - datagram available → one `receive_ack` → `Received` / `Rejected`
//! - TX pending → one `send_wait` → `Sent`
//!
//! With nothing to do it sleeps for the poll interval and checks again; the
//! idle sleep is not an event. Receive is always checked before send, so
//! incoming traffic on the half-duplex link is never starved by a send.

use super::work::WorkItem;
use crate::buffer::FrameBuffer;
use crate::transport::{RxHeader, Transport};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::debug;

/// Result of one worker iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Datagram read into the RX buffer
    Received(RxHeader),
    /// Datagram was available but the transport rejected it
    Rejected,
    /// Pending frame sent; `ok` is the acknowledgement result
    Sent { to: u8, len: u8, ok: bool },
    /// Stop flag observed
    Stopped,
}

pub(crate) fn poll_cycle<T: Transport>(
    transport: &Mutex<T>,
    work: &WorkItem,
    rx: &mut FrameBuffer,
    poll_interval: Duration,
) -> Outcome {
    loop {
        if work.stop_requested() {
            return Outcome::Stopped;
        }

        {
            let mut transport = transport.lock();
            if transport.available() {
                return match transport.receive_ack(rx.as_mut_slice()) {
                    Some(header) if header.len > 0 => Outcome::Received(header),
                    _ => Outcome::Rejected,
                };
            }
        }

        if let Some(frame) = work.take_pending() {
            debug!(to = frame.to, len = frame.len, "sending");
            let ok = transport.lock().send_wait(frame.payload(), frame.to);
            return Outcome::Sent {
                to: frame.to,
                len: frame.len,
                ok,
            };
        }

        std::thread::sleep(poll_interval);
    }
}
