//! Callback payloads and worker state

use crate::error::{BridgeError, Result};
use bytes::Bytes;

/// Persistent receive callback, armed by `start`
pub type ReceiveCallback = Box<dyn FnMut(RxEvent) + Send + 'static>;

/// One-shot send completion callback
pub type SendCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// One-shot stop completion callback
pub type StopCallback = Box<dyn FnOnce() + Send + 'static>;

/// Receive event handed to `on_receive`
///
/// `error` is set (and `data` empty) iff nothing was received. Besides
/// `ReceiveRejected` this is also how an aborted worker is reported
/// (`WorkerAborted`), as the last event before the worker stops.
#[derive(Debug)]
pub struct RxEvent {
    pub error: Option<BridgeError>,
    pub length: u8,
    pub from: u8,
    pub to: u8,
    pub id: u8,
    pub flags: u8,
    pub data: Bytes,
}

/// A successfully received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub from: u8,
    pub to: u8,
    pub id: u8,
    pub flags: u8,
    pub data: Bytes,
}

impl RxEvent {
    pub(crate) fn rejected() -> Self {
        Self::failed(BridgeError::ReceiveRejected)
    }

    /// Event carrying only an error
    pub(crate) fn failed(error: BridgeError) -> Self {
        Self {
            error: Some(error),
            length: 0,
            from: 0,
            to: 0,
            id: 0,
            flags: 0,
            data: Bytes::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_datagram(self) -> Result<Datagram> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Datagram {
                from: self.from,
                to: self.to,
                id: self.id,
                flags: self.flags,
                data: self.data,
            }),
        }
    }
}

/// Worker lifecycle state
///
/// `Stopped → Polling → Reporting → Polling ...`, leaving the loop through
/// `Stopping → Stopped` only after an explicit stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No work item alive
    Stopped,
    /// Worker iteration in flight on the blocking thread
    Polling,
    /// Completion handler invoking callbacks
    Reporting,
    /// Stop requested, waiting for the in-flight iteration
    Stopping,
}
