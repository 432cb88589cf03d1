//! Centralized error types for the bridge
//!
//! All bridge errors are represented by the `BridgeError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, BridgeError>`.
//!
//! Errors raised at the call boundary are returned directly. Errors that
//! come out of worker iterations (`ReceiveRejected`, `SendFailed`,
//! `SendCancelled`) only ever reach the host through a callback.

use std::fmt;
use std::path::PathBuf;

/// Coarse error category, as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument or configuration value
    Configuration,
    /// The transport could not be created or initialized
    TransportInit,
    /// A datagram was signaled available but the transport rejected it
    ReceiveRejected,
    /// Send-with-acknowledgement did not succeed
    SendFailed,
    /// Operation not allowed in the current lifecycle state
    Lifecycle,
    /// File or OS level failure
    Io,
}

/// All bridge errors
#[derive(Debug)]
pub enum BridgeError {
    // === Configuration ===
    /// Invalid config or argument value
    ConfigValidation { field: &'static str, reason: String },
    /// Payload does not fit the TX buffer
    PayloadTooLarge { len: usize, max: usize },
    /// Nothing to send
    EmptyPayload,

    // === Transport ===
    /// Transport construction or manager initialization failed
    TransportInit { port: String, reason: String },

    // === Worker outcomes ===
    /// Available datagram failed transport-level validation
    ReceiveRejected,
    /// No acknowledgement after the transport's retries
    SendFailed { to: u8 },
    /// Accepted send dropped because the worker stopped first
    SendCancelled { to: u8 },

    // === Lifecycle ===
    /// `open` called on an instance that already has a transport
    AlreadyOpen,
    /// Operation requires a successfully opened transport
    NotConfigured,
    /// `start` called while the worker runs
    AlreadyActive,
    /// Operation requires a running worker
    NotActive,
    /// `stop` called while a stop is already pending
    AlreadyStopping,
    /// A previous send has not completed yet
    SendInProgress,
    /// Teardown requested while the worker runs
    WorkerStillActive,
    /// `start` called outside of a tokio runtime
    NoRuntime,
    /// Worker iteration panicked or was cancelled; the worker has stopped
    WorkerAborted { reason: String },

    // === IO ===
    /// Failed to read or write a config file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for this schema
    ConfigParse { path: PathBuf, reason: String },
    /// Serial port enumeration failed
    SerialEnumerate { reason: String },
    /// Async runtime could not be built
    Runtime { source: std::io::Error },
}

impl BridgeError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigValidation { .. } | Self::PayloadTooLarge { .. } | Self::EmptyPayload => {
                ErrorKind::Configuration
            }
            Self::TransportInit { .. } => ErrorKind::TransportInit,
            Self::ReceiveRejected => ErrorKind::ReceiveRejected,
            Self::SendFailed { .. } | Self::SendCancelled { .. } => ErrorKind::SendFailed,
            Self::AlreadyOpen
            | Self::NotConfigured
            | Self::AlreadyActive
            | Self::NotActive
            | Self::AlreadyStopping
            | Self::SendInProgress
            | Self::WorkerStillActive
            | Self::NoRuntime
            | Self::WorkerAborted { .. } => ErrorKind::Lifecycle,
            Self::ConfigRead { .. }
            | Self::ConfigParse { .. }
            | Self::SerialEnumerate { .. }
            | Self::Runtime { .. } => ErrorKind::Io,
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigRead { source, .. } | Self::Runtime { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::PayloadTooLarge { len, max } => {
                write!(f, "Payload too large: {} bytes (max {})", len, max)
            }
            Self::EmptyPayload => write!(f, "Nothing to send"),
            Self::TransportInit { port, reason } => {
                write!(f, "Transport init failed on {}: {}", port, reason)
            }
            Self::ReceiveRejected => write!(f, "Nothing received"),
            Self::SendFailed { to } => write!(f, "Send to 0x{:02X} not acknowledged", to),
            Self::SendCancelled { to } => {
                write!(f, "Send to 0x{:02X} cancelled by stop", to)
            }
            Self::AlreadyOpen => write!(f, "Transport already open"),
            Self::NotConfigured => write!(f, "Transport not open"),
            Self::AlreadyActive => write!(f, "Worker already active"),
            Self::NotActive => write!(f, "Worker not active"),
            Self::AlreadyStopping => write!(f, "Worker already stopping"),
            Self::SendInProgress => write!(f, "Previous send still in progress"),
            Self::WorkerStillActive => write!(f, "Worker still active, stop it first"),
            Self::NoRuntime => write!(f, "No tokio runtime available"),
            Self::WorkerAborted { reason } => write!(f, "Worker aborted: {}", reason),
            Self::ConfigRead { path, .. } => write!(f, "IO error: {}", path.display()),
            Self::ConfigParse { path, reason } => {
                write!(f, "Invalid config {}: {}", path.display(), reason)
            }
            Self::SerialEnumerate { reason } => {
                write!(f, "Cannot enumerate serial ports: {}", reason)
            }
            Self::Runtime { source } => write!(f, "Cannot start runtime: {}", source),
        }
    }
}

/// Alias for Result with BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
