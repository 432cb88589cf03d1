//! Work item shared between host and worker
//!
//! One `WorkItem` exists per start/stop cycle. It carries the only state the
//! two contexts touch concurrently:
//! - the stop flag (host writes, worker reads)
//! - the TX slot (host fills on `send`, worker takes it for `send_wait`)
//! - the stop callback (host stores, completion handler fires)
//!
//! The TX slot is handed over under its mutex: the worker copies the frame
//! out and clears the pending length in one critical section, so a send is
//! never observed half-written and never transmitted twice.

use super::event::{SendCallback, StopCallback};
use crate::buffer::FrameBuffer;
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Frame taken from the TX slot by the worker
pub(crate) struct TxFrame {
    pub to: u8,
    pub len: u8,
    buffer: FrameBuffer,
}

impl TxFrame {
    pub fn payload(&self) -> &[u8] {
        self.buffer.payload(self.len)
    }
}

/// Single outstanding send
struct TxSlot {
    /// TX buffer
    buffer: FrameBuffer,
    to: u8,
    /// Bytes waiting for the worker (0 = nothing to send)
    len: u8,
    /// Accepted and not yet reported
    outstanding: bool,
    on_complete: Option<SendCallback>,
}

pub(crate) struct WorkItem {
    stop_requested: AtomicBool,
    tx: Mutex<TxSlot>,
    on_stopped: Mutex<Option<StopCallback>>,
}

impl WorkItem {
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            tx: Mutex::new(TxSlot {
                buffer: FrameBuffer::new(),
                to: 0,
                len: 0,
                outstanding: false,
                on_complete: None,
            }),
            on_stopped: Mutex::new(None),
        }
    }

    // =========================================================================
    // Stop
    // =========================================================================

    /// Store the stop callback and raise the stop flag
    pub fn request_stop(&self, on_stopped: StopCallback) -> Result<()> {
        let mut slot = self.on_stopped.lock();
        if self.stop_requested.load(Ordering::Acquire) {
            return Err(BridgeError::AlreadyStopping);
        }
        *slot = Some(on_stopped);
        self.stop_requested.store(true, Ordering::Release);
        Ok(())
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    pub fn take_stop_callback(&self) -> Option<StopCallback> {
        self.on_stopped.lock().take()
    }

    // =========================================================================
    // TX slot
    // =========================================================================

    /// Place a payload in the TX slot
    ///
    /// `data` must already be known to fit the buffer.
    pub fn accept_send(&self, to: u8, data: &[u8], on_complete: SendCallback) -> Result<()> {
        let mut slot = self.tx.lock();
        if slot.outstanding {
            return Err(BridgeError::SendInProgress);
        }
        let len = slot.buffer.fill(data)?;
        slot.to = to;
        slot.on_complete = Some(on_complete);
        slot.outstanding = true;
        slot.len = len;
        Ok(())
    }

    /// Take the pending frame, if any (worker side)
    pub fn take_pending(&self) -> Option<TxFrame> {
        let mut slot = self.tx.lock();
        if slot.len == 0 {
            return None;
        }
        let frame = TxFrame {
            to: slot.to,
            len: slot.len,
            buffer: slot.buffer,
        };
        slot.len = 0;
        Some(frame)
    }

    /// Release the slot after the worker reported the send
    pub fn finish_send(&self) -> Option<SendCallback> {
        let mut slot = self.tx.lock();
        slot.outstanding = false;
        slot.on_complete.take()
    }

    /// Drop an accepted send the worker never transmitted
    pub fn cancel_pending(&self) -> Option<(u8, SendCallback)> {
        let mut slot = self.tx.lock();
        if !slot.outstanding {
            return None;
        }
        slot.outstanding = false;
        slot.len = 0;
        let to = slot.to;
        slot.on_complete.take().map(|cb| (to, cb))
    }

    pub fn send_outstanding(&self) -> bool {
        self.tx.lock().outstanding
    }
}
