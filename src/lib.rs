//! RadioHead bridge
//!
//! Non-blocking callback interface over a blocking RadioHead
//! reliable-datagram transport. A background worker polls the transport on
//! a blocking thread; results are reported on a tokio task.
//!
//! ```text
//! host ──start/send/stop──► RadioBridge ──► WorkItem ◄── worker (spawn_blocking)
//!   ▲                                                       │
//!   └──────── callbacks ◄── completion handler (task) ◄─────┘
//! ```

pub mod bridge;
pub mod buffer;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod serial;
pub mod sim;
pub mod stats;
pub mod transport;

pub use bridge::{BridgeOptions, Datagram, RadioBridge, RxEvent, WorkerState};
pub use buffer::FrameBuffer;
pub use client::{ClientEvent, RadioClient};
pub use config::Config;
pub use error::{BridgeError, ErrorKind, Result};
pub use stats::{Stats, StatsSnapshot};
pub use transport::{Connector, LinkConfig, RxHeader, Transport};
