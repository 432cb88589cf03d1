//! Completion handler (dispatcher task)
//!
//! Runs on the tokio runtime and is the host context for callbacks. Each
//! loop turn queues one worker iteration with `spawn_blocking`, awaits it,
//! then reports the outcome:
//! - `Received` / `Rejected` → `on_receive` (kept for the whole cycle)
//! - `Sent` → the send's one-shot callback, then the TX slot is freed
//! - stop requested → finalize: cancel an untransmitted send, release the
//!   work item, mark the bridge inactive, fire `on_stopped`
//! - iteration panicked → `on_receive` gets a `WorkerAborted` error event,
//!   then finalize as above (`on_stopped` only fires if a stop was asked for)
//!
//! The next iteration is queued only after the callbacks return, so results
//! reach the host in the order the iterations completed.

use super::event::{ReceiveCallback, RxEvent, WorkerState};
use super::work::WorkItem;
use super::worker::{self, Outcome};
use super::Shared;
use crate::buffer::FrameBuffer;
use crate::error::BridgeError;
use crate::transport::Transport;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Everything one start/stop cycle needs
pub(crate) struct Dispatch<T: Transport> {
    pub transport: Arc<Mutex<T>>,
    pub work: Arc<WorkItem>,
    pub shared: Arc<Shared>,
    pub on_receive: ReceiveCallback,
    pub rx: FrameBuffer,
    pub poll_interval: Duration,
}

pub(crate) async fn run<T: Transport>(dispatch: Dispatch<T>) {
    let Dispatch {
        transport,
        work,
        shared,
        mut on_receive,
        mut rx,
        poll_interval,
    } = dispatch;

    loop {
        shared.enter(WorkerState::Polling);

        let cycle = {
            let transport = transport.clone();
            let work = work.clone();
            tokio::task::spawn_blocking(move || {
                let outcome = worker::poll_cycle(&transport, &work, &mut rx, poll_interval);
                (rx, outcome)
            })
        };

        let outcome = match cycle.await {
            Ok((buffer, outcome)) => {
                rx = buffer;
                outcome
            }
            Err(e) => {
                error!("Worker iteration aborted: {}", e);
                shared.enter(WorkerState::Reporting);
                on_receive(RxEvent::failed(BridgeError::WorkerAborted {
                    reason: e.to_string(),
                }));
                break;
            }
        };

        shared.enter(WorkerState::Reporting);
        report(outcome, &rx, &work, &shared, &mut on_receive);

        if work.stop_requested() {
            break;
        }
    }

    drop(transport);
    finalize(&work, &shared);
}

/// Turn one worker outcome into callback invocations
fn report(
    outcome: Outcome,
    rx: &FrameBuffer,
    work: &WorkItem,
    shared: &Shared,
    on_receive: &mut ReceiveCallback,
) {
    match outcome {
        Outcome::Received(header) => {
            let data = Bytes::copy_from_slice(rx.payload(header.len));
            shared.stats.add_rx(data.len());
            debug!(
                from = header.from,
                to = header.to,
                id = header.id,
                len = data.len(),
                "received"
            );
            on_receive(RxEvent {
                error: None,
                length: data.len() as u8,
                from: header.from,
                to: header.to,
                id: header.id,
                flags: header.flags,
                data,
            });
        }
        Outcome::Rejected => {
            shared.stats.add_rx_rejected();
            debug!("receive rejected by transport");
            on_receive(RxEvent::rejected());
        }
        Outcome::Sent { to, len, ok } => {
            let result = if ok {
                shared.stats.add_tx(len as usize);
                Ok(())
            } else {
                shared.stats.add_tx_failed();
                warn!(to, len, "send not acknowledged");
                Err(BridgeError::SendFailed { to })
            };
            if let Some(on_complete) = work.finish_send() {
                on_complete(result);
            }
        }
        Outcome::Stopped => {}
    }
}

/// Release the work item and fire the remaining one-shot callbacks
fn finalize(work: &WorkItem, shared: &Shared) {
    shared.release();

    if let Some((to, on_complete)) = work.cancel_pending() {
        shared.stats.add_tx_failed();
        debug!(to, "pending send cancelled");
        on_complete(Err(BridgeError::SendCancelled { to }));
    }

    info!("Worker stopped");
    if let Some(on_stopped) = work.take_stop_callback() {
        on_stopped();
    }
}
