//! Bridge instance: lifecycle & configuration façade
//!
//! Turns the blocking `Transport` into a callback interface:
//! - `start(on_receive)`: drain stale datagrams, spawn the dispatcher
//! - `send(to, data, on_complete)`: hand one frame to the worker
//! - `stop(on_stopped)`: cooperative, fires once the in-flight iteration
//!   has been reported
//!
//! All methods take `&self` and never block on worker progress, so a
//! callback may call back into the bridge (through an `Arc`). Configuration
//! passthroughs share the transport mutex with the worker and wait while a
//! `send_wait` is in flight.

mod completion;
pub mod event;
mod work;
mod worker;

pub use event::{Datagram, ReceiveCallback, RxEvent, SendCallback, StopCallback, WorkerState};

use self::completion::Dispatch;
use self::work::WorkItem;
use crate::buffer::FrameBuffer;
use crate::config::Config;
use crate::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS, DRAIN_LIMIT, MAX_MESSAGE_LEN,
};
use crate::error::{BridgeError, Result};
use crate::stats::Stats;
use crate::transport::{Connector, LinkConfig, Transport};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Construction-time options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Idle sleep between polls when there is nothing to do
    ///
    /// Lower values cut receive/send latency at the cost of CPU and
    /// transport traffic. Has no effect on correctness.
    pub poll_interval: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

// =============================================================================
// Shared worker state
// =============================================================================

/// State shared with the dispatcher task
pub(crate) struct Shared {
    active: AtomicBool,
    state: RwLock<WorkerState>,
    /// Current work item; `None` while stopped
    work: Mutex<Option<Arc<WorkItem>>>,
    stats: Stats,
}

impl Shared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            state: RwLock::new(WorkerState::Stopped),
            work: Mutex::new(None),
            stats: Stats::new(),
        }
    }

    /// Move to `Polling`/`Reporting` unless a stop is pending
    pub(crate) fn enter(&self, next: WorkerState) {
        let mut state = self.state.write();
        if !matches!(*state, WorkerState::Stopping | WorkerState::Stopped) {
            *state = next;
        }
    }

    /// Drop the work item and mark the bridge inactive
    pub(crate) fn release(&self) {
        let mut work = self.work.lock();
        *work = None;
        *self.state.write() = WorkerState::Stopped;
        self.active.store(false, Ordering::Release);
    }
}

// =============================================================================
// Link
// =============================================================================

enum Link<T> {
    Closed,
    Open {
        transport: Arc<Mutex<T>>,
        port: String,
        address: u8,
    },
    /// `open` failed; unusable until `close`
    Failed,
}

// =============================================================================
// RadioBridge
// =============================================================================

/// One bridge instance: transport, buffers and at most one worker
///
/// Instances are independent; each owns its own transport and work item.
pub struct RadioBridge<C: Connector> {
    connector: C,
    link: Mutex<Link<C::Transport>>,
    shared: Arc<Shared>,
    poll_interval: Mutex<Duration>,
}

impl<C: Connector> RadioBridge<C> {
    pub fn new(connector: C) -> Self {
        Self::with_options(connector, BridgeOptions::default())
    }

    pub fn with_options(connector: C, options: BridgeOptions) -> Self {
        Self {
            connector,
            link: Mutex::new(Link::Closed),
            shared: Arc::new(Shared::new()),
            poll_interval: Mutex::new(options.poll_interval),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create and initialize the transport
    ///
    /// Applies the default retries and ack timeout. A failure leaves the
    /// instance unusable until `close`.
    pub fn open(&self, port: &str, baud: u32, address: u8) -> Result<()> {
        let mut link = self.link.lock();
        match *link {
            Link::Open { .. } => return Err(BridgeError::AlreadyOpen),
            Link::Failed => {
                return Err(BridgeError::TransportInit {
                    port: port.to_string(),
                    reason: "previous initialization failed, close first".into(),
                })
            }
            Link::Closed => {}
        }

        let config = LinkConfig::new(port, baud, address);
        let result = self.connector.connect(&config).and_then(|mut transport| {
            if transport.init() {
                Ok(transport)
            } else {
                Err(BridgeError::TransportInit {
                    port: port.to_string(),
                    reason: "manager init failed".into(),
                })
            }
        });

        match result {
            Ok(mut transport) => {
                transport.set_this_address(address);
                transport.set_retries(DEFAULT_RETRIES);
                transport.set_timeout(DEFAULT_TIMEOUT_MS);
                *link = Link::Open {
                    transport: Arc::new(Mutex::new(transport)),
                    port: port.to_string(),
                    address,
                };
                info!(port, baud, address, "Transport open");
                Ok(())
            }
            Err(e) => {
                *link = Link::Failed;
                warn!("Transport open failed: {}", e);
                Err(e)
            }
        }
    }

    /// Open the link and apply the radio settings of `config`
    pub fn configure(&self, config: &Config) -> Result<()> {
        config.validate()?;
        self.set_poll_interval(config.worker.poll_interval());
        self.open(&config.link.port, config.link.baud, config.link.address)?;
        self.set_retries(config.radio.retries)?;
        self.set_ack_timeout(config.radio.ack_timeout_ms)?;
        self.set_promiscuous(config.radio.promiscuous)?;
        Ok(())
    }

    /// Start the worker
    ///
    /// Datagrams already waiting in the transport are discarded first and
    /// never reach `on_receive`. Must be called within a tokio runtime.
    pub fn start<F>(&self, on_receive: F) -> Result<()>
    where
        F: FnMut(RxEvent) + Send + 'static,
    {
        // Held until the worker is published so `close` cannot interleave
        let link = self.link.lock();
        let Link::Open { transport, .. } = &*link else {
            return Err(BridgeError::NotConfigured);
        };
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;

        // `stop` looks the work item up under this lock; it never sees
        // `active` without it
        let mut current = self.shared.work.lock();
        if self
            .shared
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(BridgeError::AlreadyActive);
        }

        let mut rx = FrameBuffer::new();
        let drained = drain(transport, &mut rx);
        if drained > 0 {
            self.shared.stats.add_drained(drained);
            debug!(drained, "discarded stale datagrams");
        }

        let work = Arc::new(WorkItem::new());
        *current = Some(work.clone());
        *self.shared.state.write() = WorkerState::Polling;
        drop(current);

        let poll_interval = *self.poll_interval.lock();
        runtime.spawn(completion::run(Dispatch {
            transport: transport.clone(),
            work,
            shared: self.shared.clone(),
            on_receive: Box::new(on_receive),
            rx,
            poll_interval,
        }));
        drop(link);

        info!(?poll_interval, "Worker started");
        Ok(())
    }

    /// Request the worker to stop
    ///
    /// Does not block. `on_stopped` fires exactly once, after the in-flight
    /// iteration (if any) has been reported.
    pub fn stop<F>(&self, on_stopped: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let work = self.shared.work.lock();
        let work = work.as_ref().ok_or(BridgeError::NotActive)?;
        work.request_stop(Box::new(on_stopped))?;
        *self.shared.state.write() = WorkerState::Stopping;
        info!("Worker stop requested");
        Ok(())
    }

    /// Queue one datagram for the worker
    ///
    /// Only one send may be outstanding; a second one fails with
    /// `SendInProgress`. An oversized payload fails with `PayloadTooLarge`
    /// and `on_complete` is still called with that error.
    pub fn send<F>(&self, to: u8, data: &[u8], on_complete: F) -> Result<()>
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        if !self.accepting_sends() {
            return Err(BridgeError::NotActive);
        }
        if data.is_empty() {
            return Err(BridgeError::EmptyPayload);
        }
        if data.len() > MAX_MESSAGE_LEN {
            on_complete(Err(BridgeError::PayloadTooLarge {
                len: data.len(),
                max: MAX_MESSAGE_LEN,
            }));
            return Err(BridgeError::PayloadTooLarge {
                len: data.len(),
                max: MAX_MESSAGE_LEN,
            });
        }

        let work = self.shared.work.lock();
        let work = work
            .as_ref()
            .filter(|w| !w.stop_requested())
            .ok_or(BridgeError::NotActive)?;
        work.accept_send(to, data, Box::new(on_complete))?;
        debug!(to, len = data.len(), "send queued");
        Ok(())
    }

    /// Release the transport
    ///
    /// Fails with `WorkerStillActive` until `on_stopped` has fired. Also
    /// clears a failed `open`.
    pub fn close(&self) -> Result<()> {
        let mut link = self.link.lock();
        if self.is_active() {
            return Err(BridgeError::WorkerStillActive);
        }
        *link = Link::Closed;
        info!("Transport closed");
        Ok(())
    }

    // =========================================================================
    // State queries
    // =========================================================================

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    pub fn state(&self) -> WorkerState {
        *self.shared.state.read()
    }

    /// An accepted send has not been reported yet
    pub fn send_in_progress(&self) -> bool {
        self.shared
            .work
            .lock()
            .as_ref()
            .is_some_and(|w| w.send_outstanding())
    }

    pub fn stats(&self) -> &Stats {
        &self.shared.stats
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.link.lock(), Link::Open { .. })
    }

    /// Port name of the open transport
    pub fn port(&self) -> Result<String> {
        match &*self.link.lock() {
            Link::Open { port, .. } => Ok(port.clone()),
            _ => Err(BridgeError::NotConfigured),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        *self.poll_interval.lock()
    }

    /// Idle poll interval for the next `start`
    pub fn set_poll_interval(&self, interval: Duration) {
        *self.poll_interval.lock() = interval;
    }

    // =========================================================================
    // Transport passthroughs
    // =========================================================================

    pub fn set_address(&self, address: u8) -> Result<()> {
        let mut link = self.link.lock();
        let Link::Open {
            transport,
            address: own,
            ..
        } = &mut *link
        else {
            return Err(BridgeError::NotConfigured);
        };
        transport.lock().set_this_address(address);
        *own = address;
        Ok(())
    }

    pub fn this_address(&self) -> Result<u8> {
        match &*self.link.lock() {
            Link::Open { address, .. } => Ok(*address),
            _ => Err(BridgeError::NotConfigured),
        }
    }

    pub fn set_retries(&self, retries: u8) -> Result<()> {
        self.with_transport(|t| t.set_retries(retries))
    }

    pub fn retries(&self) -> Result<u8> {
        self.with_transport(|t| t.retries())
    }

    pub fn set_ack_timeout(&self, timeout_ms: u16) -> Result<()> {
        self.with_transport(|t| t.set_timeout(timeout_ms))
    }

    pub fn retransmissions(&self) -> Result<u32> {
        self.with_transport(|t| t.retransmissions())
    }

    pub fn reset_retransmissions(&self) -> Result<()> {
        self.with_transport(|t| t.reset_retransmissions())
    }

    pub fn set_promiscuous(&self, promiscuous: bool) -> Result<()> {
        self.with_transport(|t| t.set_promiscuous(promiscuous))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn transport(&self) -> Result<Arc<Mutex<C::Transport>>> {
        match &*self.link.lock() {
            Link::Open { transport, .. } => Ok(transport.clone()),
            _ => Err(BridgeError::NotConfigured),
        }
    }

    fn with_transport<R>(&self, f: impl FnOnce(&mut C::Transport) -> R) -> Result<R> {
        let transport = self.transport()?;
        let mut transport = transport.lock();
        Ok(f(&mut transport))
    }

    fn accepting_sends(&self) -> bool {
        self.shared
            .work
            .lock()
            .as_ref()
            .is_some_and(|w| !w.stop_requested())
    }
}

impl<C: Connector> Drop for RadioBridge<C> {
    fn drop(&mut self) {
        if let Some(work) = self.shared.work.lock().as_ref() {
            warn!("Bridge dropped while worker active, stopping");
            let _ = work.request_stop(Box::new(|| {}));
        }
    }
}

/// Discard every datagram already waiting in the transport
fn drain<T: Transport>(transport: &Mutex<T>, scratch: &mut FrameBuffer) -> usize {
    let mut transport = transport.lock();
    let mut drained = 0;
    while drained < DRAIN_LIMIT && transport.available() {
        let _ = transport.receive_ack(scratch.as_mut_slice());
        drained += 1;
    }
    if drained == DRAIN_LIMIT {
        warn!("Drain limit reached, transport still reports data");
    }
    drained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptHandle;
    use crate::transport::RxHeader;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    #[derive(Clone, Copy)]
    enum Fault {
        /// Always reports a datagram, never yields one
        Flood,
        /// Panics on the first poll after start's drain
        PanicOnPoll,
    }

    struct Faulty {
        fault: Fault,
        polls: usize,
    }

    impl Transport for Faulty {
        fn init(&mut self) -> bool {
            true
        }

        fn available(&mut self) -> bool {
            self.polls += 1;
            match self.fault {
                Fault::Flood => true,
                Fault::PanicOnPoll if self.polls > 1 => panic!("transport fault"),
                Fault::PanicOnPoll => false,
            }
        }

        fn receive_ack(&mut self, _buf: &mut [u8]) -> Option<RxHeader> {
            None
        }

        fn send_wait(&mut self, _data: &[u8], _to: u8) -> bool {
            false
        }

        fn set_this_address(&mut self, _address: u8) {}
        fn set_retries(&mut self, _retries: u8) {}
        fn retries(&self) -> u8 {
            0
        }
        fn retransmissions(&self) -> u32 {
            0
        }
        fn reset_retransmissions(&mut self) {}
        fn set_timeout(&mut self, _timeout_ms: u16) {}
        fn set_promiscuous(&mut self, _promiscuous: bool) {}
    }

    struct FaultyConnector(Fault);

    impl Connector for FaultyConnector {
        type Transport = Faulty;

        fn connect(&self, _link: &LinkConfig) -> Result<Faulty> {
            Ok(Faulty {
                fault: self.0,
                polls: 0,
            })
        }
    }

    fn faulty(fault: Fault) -> RadioBridge<FaultyConnector> {
        let bridge = RadioBridge::with_options(
            FaultyConnector(fault),
            BridgeOptions {
                poll_interval: Duration::from_millis(1),
            },
        );
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();
        bridge
    }

    fn bridge() -> (ScriptHandle, RadioBridge<crate::sim::ScriptedConnector>) {
        let handle = ScriptHandle::new();
        let bridge = RadioBridge::new(handle.connector());
        (handle, bridge)
    }

    #[test]
    fn test_passthroughs_require_open() {
        let (_handle, bridge) = bridge();
        assert!(matches!(bridge.set_address(2), Err(BridgeError::NotConfigured)));
        assert!(matches!(bridge.set_retries(5), Err(BridgeError::NotConfigured)));
        assert!(matches!(bridge.retries(), Err(BridgeError::NotConfigured)));
        assert!(matches!(bridge.set_ack_timeout(100), Err(BridgeError::NotConfigured)));
        assert!(matches!(bridge.retransmissions(), Err(BridgeError::NotConfigured)));
        assert!(matches!(
            bridge.reset_retransmissions(),
            Err(BridgeError::NotConfigured)
        ));
        assert!(matches!(
            bridge.set_promiscuous(true),
            Err(BridgeError::NotConfigured)
        ));
        assert!(matches!(bridge.this_address(), Err(BridgeError::NotConfigured)));
    }

    #[test]
    fn test_open_applies_defaults() {
        let (handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();

        assert_eq!(handle.address(), 0x01);
        assert_eq!(handle.retries(), DEFAULT_RETRIES);
        assert_eq!(handle.timeout_ms(), DEFAULT_TIMEOUT_MS);
        assert_eq!(bridge.this_address().unwrap(), 0x01);
        assert_eq!(bridge.port().unwrap(), "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_twice_rejected() {
        let (_handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();
        assert!(matches!(
            bridge.open("/dev/ttyUSB0", 9600, 0x01),
            Err(BridgeError::AlreadyOpen)
        ));
    }

    #[test]
    fn test_failed_init_leaves_instance_unusable_until_close() {
        let (handle, bridge) = bridge();
        handle.fail_init();

        let err = bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap_err();
        assert!(matches!(err, BridgeError::TransportInit { .. }));
        assert!(matches!(bridge.retries(), Err(BridgeError::NotConfigured)));
        assert!(matches!(
            bridge.open("/dev/ttyUSB0", 9600, 0x01),
            Err(BridgeError::TransportInit { .. })
        ));

        bridge.close().unwrap();
        assert!(!bridge.is_open());
        assert!(matches!(bridge.retries(), Err(BridgeError::NotConfigured)));
    }

    #[test]
    fn test_close_then_reopen() {
        let (_handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();
        bridge.close().unwrap();
        bridge.open("/dev/ttyUSB1", 9600, 0x02).unwrap();
        assert_eq!(bridge.port().unwrap(), "/dev/ttyUSB1");
    }

    #[test]
    fn test_passthroughs_reach_transport() {
        let (handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();

        bridge.set_address(0x07).unwrap();
        bridge.set_retries(5).unwrap();
        bridge.set_ack_timeout(500).unwrap();
        bridge.set_promiscuous(true).unwrap();
        handle.set_retransmissions(4);

        assert_eq!(handle.address(), 0x07);
        assert_eq!(bridge.this_address().unwrap(), 0x07);
        assert_eq!(bridge.retries().unwrap(), 5);
        assert_eq!(handle.timeout_ms(), 500);
        assert!(handle.promiscuous());
        assert_eq!(bridge.retransmissions().unwrap(), 4);
        bridge.reset_retransmissions().unwrap();
        assert_eq!(bridge.retransmissions().unwrap(), 0);
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (_handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();
        assert!(matches!(bridge.start(|_| {}), Err(BridgeError::NoRuntime)));
        assert!(!bridge.is_active());
    }

    #[test]
    fn test_stop_and_send_require_active_worker() {
        let (_handle, bridge) = bridge();
        bridge.open("/dev/ttyUSB0", 9600, 0x01).unwrap();
        assert!(matches!(bridge.stop(|| {}), Err(BridgeError::NotActive)));
        assert!(matches!(
            bridge.send(0x02, b"hi", |_| panic!("no callback expected")),
            Err(BridgeError::NotActive)
        ));
    }

    #[test]
    fn test_drain_discards_backlog() {
        let handle = ScriptHandle::new();
        handle.push_datagram(0x02, 0x01, 1, 0, b"old");
        handle.push_corrupt();
        let transport = Mutex::new(handle.transport());

        let mut scratch = FrameBuffer::new();
        assert_eq!(drain(&transport, &mut scratch), 2);
        assert_eq!(handle.pending_inbound(), 0);
    }

    #[test]
    fn test_default_options() {
        let options = BridgeOptions::default();
        assert_eq!(
            options.poll_interval,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
    }

    #[tokio::test]
    async fn test_drain_bounded_when_transport_always_available() {
        let bridge = faulty(Fault::Flood);

        let transport = bridge.transport().unwrap();
        let mut scratch = FrameBuffer::new();
        assert_eq!(drain(&transport, &mut scratch), DRAIN_LIMIT);

        bridge.start(|_| {}).unwrap();
        assert_eq!(bridge.stats().snapshot().drained, DRAIN_LIMIT as u64);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        bridge
            .stop(move || {
                let _ = done_tx.send(());
            })
            .unwrap();
        timeout(WAIT, done_rx.recv()).await.unwrap();
        assert!(!bridge.is_active());
    }

    #[tokio::test]
    async fn test_worker_panic_reported_to_receiver() {
        let bridge = faulty(Fault::PanicOnPoll);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        bridge
            .start(move |event: RxEvent| {
                let _ = events_tx.send(event);
            })
            .unwrap();

        let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
        assert!(matches!(
            event.error,
            Some(BridgeError::WorkerAborted { .. })
        ));

        // Receiver is dropped once the dispatcher has finalized
        assert!(timeout(WAIT, events.recv()).await.unwrap().is_none());
        assert!(!bridge.is_active());
        assert_eq!(bridge.state(), WorkerState::Stopped);
        bridge.close().unwrap();
    }
}
