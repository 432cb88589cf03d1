//! Application-wide constants
//!
//! RadioHead values are the ones the serial driver and the reliable
//! datagram manager use on the remote nodes; they must stay in sync.

// =============================================================================
// Addressing & Flags
// =============================================================================

/// Destination address that every node accepts
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Header flags reserved for the RadioHead library
pub const FLAGS_RESERVED: u8 = 0xF0;

/// Header flags available to applications
pub const FLAGS_APPLICATION_SPECIFIC: u8 = 0x0F;

/// No header flags set
pub const FLAGS_NONE: u8 = 0x00;

/// Flag marking an acknowledgement frame
pub const FLAGS_ACK: u8 = 0x80;

// =============================================================================
// Frame Sizes
// =============================================================================

/// Maximum payload carried by one serial frame (header included)
pub const SERIAL_MAX_PAYLOAD_LEN: usize = 64;

/// RadioHead header length (to, from, id, flags)
pub const SERIAL_HEADER_LEN: usize = 4;

/// Largest user message; size of both the RX and the TX buffer
pub const MAX_MESSAGE_LEN: usize = SERIAL_MAX_PAYLOAD_LEN - SERIAL_HEADER_LEN;

// =============================================================================
// Reliable Datagram Defaults
// =============================================================================

/// Default minimum retransmit timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u16 = 200;

/// Default number of retransmissions before a send is reported failed
pub const DEFAULT_RETRIES: u8 = 3;

/// Default own address when none is configured
pub const DEFAULT_ADDRESS: u8 = 0x01;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

// =============================================================================
// Worker
// =============================================================================

/// Idle sleep between transport polls when there is nothing to do (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Upper bound on stale datagrams discarded when the worker starts
pub const DRAIN_LIMIT: usize = 256;

// =============================================================================
// Files
// =============================================================================

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "rh-bridge.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_len_derived_from_frame() {
        assert_eq!(SERIAL_MAX_PAYLOAD_LEN, 64);
        assert_eq!(SERIAL_HEADER_LEN, 4);
        assert_eq!(MAX_MESSAGE_LEN, 60);
    }

    #[test]
    fn test_flag_masks_partition_byte() {
        assert_eq!(FLAGS_RESERVED & FLAGS_APPLICATION_SPECIFIC, 0);
        assert_eq!(FLAGS_RESERVED | FLAGS_APPLICATION_SPECIFIC, 0xFF);
        assert_eq!(FLAGS_ACK & FLAGS_RESERVED, FLAGS_ACK);
    }
}
