//! In-memory transports
//!
//! Stand-ins for the RadioHead serial stack, for tests and the demo:
//! - [`ScriptedTransport`]: one node whose inbound traffic and send
//!   outcomes are scripted through a [`ScriptHandle`]. Sends can be held
//!   to observe a worker blocked inside `send_wait`.
//! - [`SimAir`]: a shared medium; every connected [`SimNode`] sees frames
//!   addressed to it, to broadcast, or to anyone when promiscuous.
//!
//! Neither models retries, timing or framing. A send to an address no
//! node owns simply fails.

pub mod air;
pub mod scripted;

pub use air::{SimAir, SimConnector, SimNode};
pub use scripted::{ScriptHandle, ScriptedConnector, ScriptedTransport, SentFrame};
