//! Async façade over the callback bridge
//!
//! `RadioClient` turns the three callbacks into:
//! - an event stream (`ClientEvent`) for received datagrams and lifecycle
//! - futures for `send` and `stop`
//!
//! Events are emitted from the bridge's dispatcher task, so they arrive in
//! the order the worker produced them. `Started` always precedes the first
//! `Data`, and `Stopped` follows the last one.

use crate::bridge::{BridgeOptions, Datagram, RadioBridge, RxEvent};
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::stats::Stats;
use crate::transport::Connector;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Event emitted by a `RadioClient`
#[derive(Debug)]
pub enum ClientEvent {
    Started,
    Data(Datagram),
    ReceiveError(BridgeError),
    Stopped,
}

pub type EventReceiver = mpsc::UnboundedReceiver<ClientEvent>;

/// Sender guarded so `start` can emit `Started` before any `Data`
#[derive(Clone)]
struct Emitter {
    tx: Arc<Mutex<mpsc::UnboundedSender<ClientEvent>>>,
}

impl Emitter {
    fn emit(&self, event: ClientEvent) {
        // Receiver may be gone; events are then dropped
        let _ = self.tx.lock().send(event);
    }

    fn emit_rx(&self, event: RxEvent) {
        match event.into_datagram() {
            Ok(datagram) => self.emit(ClientEvent::Data(datagram)),
            Err(e) => self.emit(ClientEvent::ReceiveError(e)),
        }
    }
}

/// Bridge with an event channel and awaitable operations
pub struct RadioClient<C: Connector> {
    bridge: Arc<RadioBridge<C>>,
    events: Emitter,
}

impl<C: Connector> RadioClient<C> {
    pub fn new(connector: C) -> (Self, EventReceiver) {
        Self::with_options(connector, BridgeOptions::default())
    }

    pub fn with_options(connector: C, options: BridgeOptions) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            bridge: Arc::new(RadioBridge::with_options(connector, options)),
            events: Emitter {
                tx: Arc::new(Mutex::new(tx)),
            },
        };
        (client, rx)
    }

    /// Underlying callback bridge
    pub fn bridge(&self) -> &Arc<RadioBridge<C>> {
        &self.bridge
    }

    pub fn open(&self, port: &str, baud: u32, address: u8) -> Result<()> {
        self.bridge.open(port, baud, address)
    }

    pub fn configure(&self, config: &Config) -> Result<()> {
        self.bridge.configure(config)
    }

    pub fn close(&self) -> Result<()> {
        self.bridge.close()
    }

    /// Start receiving; no-op if already started
    pub fn start(&self) -> Result<()> {
        if self.bridge.is_active() {
            return Ok(());
        }

        let events = self.events.clone();
        let guard = self.events.tx.lock();
        self.bridge.start(move |event| events.emit_rx(event))?;
        let _ = guard.send(ClientEvent::Started);
        Ok(())
    }

    /// Stop receiving; resolves once the worker has stopped
    ///
    /// Resolves immediately if the worker is not running.
    pub async fn stop(&self) -> Result<()> {
        if !self.bridge.is_active() {
            return Ok(());
        }

        let (done_tx, done_rx) = oneshot::channel();
        let events = self.events.clone();
        let requested = self.bridge.stop(move || {
            events.emit(ClientEvent::Stopped);
            let _ = done_tx.send(());
        });
        match requested {
            Ok(()) => {}
            // Finished between the check and the request
            Err(BridgeError::NotActive) => return Ok(()),
            Err(e) => return Err(e),
        }

        // Sender only drops unfired if the runtime is shutting down
        let _ = done_rx.await;
        debug!("client stopped");
        Ok(())
    }

    /// Send one datagram; resolves with the acknowledgement result
    pub async fn send(&self, to: u8, data: &[u8]) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.bridge.send(to, data, move |result| {
            let _ = done_tx.send(result);
        })?;
        done_rx
            .await
            .unwrap_or(Err(BridgeError::SendCancelled { to }))
    }

    pub fn is_active(&self) -> bool {
        self.bridge.is_active()
    }

    pub fn stats(&self) -> &Stats {
        self.bridge.stats()
    }

    pub fn set_address(&self, address: u8) -> Result<()> {
        self.bridge.set_address(address)
    }

    pub fn this_address(&self) -> Result<u8> {
        self.bridge.this_address()
    }

    pub fn set_retries(&self, retries: u8) -> Result<()> {
        self.bridge.set_retries(retries)
    }

    pub fn retries(&self) -> Result<u8> {
        self.bridge.retries()
    }

    pub fn set_ack_timeout(&self, timeout_ms: u16) -> Result<()> {
        self.bridge.set_ack_timeout(timeout_ms)
    }

    pub fn retransmissions(&self) -> Result<u32> {
        self.bridge.retransmissions()
    }

    pub fn reset_retransmissions(&self) -> Result<()> {
        self.bridge.reset_retransmissions()
    }

    pub fn set_promiscuous(&self, promiscuous: bool) -> Result<()> {
        self.bridge.set_promiscuous(promiscuous)
    }
}
