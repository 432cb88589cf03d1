//! Fixed-capacity frame buffers
//!
//! One RX and one TX buffer exist per bridge instance, each sized to the
//! transport's maximum message length.

use crate::constants::MAX_MESSAGE_LEN;
use crate::error::{BridgeError, Result};

/// Byte buffer holding at most one RadioHead message
#[derive(Clone, Copy)]
pub struct FrameBuffer {
    bytes: [u8; MAX_MESSAGE_LEN],
}

impl FrameBuffer {
    pub const CAPACITY: usize = MAX_MESSAGE_LEN;

    pub fn new() -> Self {
        Self {
            bytes: [0u8; MAX_MESSAGE_LEN],
        }
    }

    /// Copy `data` into the buffer, returning its length
    ///
    /// Leaves the buffer untouched when `data` does not fit.
    pub fn fill(&mut self, data: &[u8]) -> Result<u8> {
        if data.len() > Self::CAPACITY {
            return Err(BridgeError::PayloadTooLarge {
                len: data.len(),
                max: Self::CAPACITY,
            });
        }
        self.bytes[..data.len()].copy_from_slice(data);
        Ok(data.len() as u8)
    }

    /// First `len` bytes (clamped to capacity)
    pub fn payload(&self, len: u8) -> &[u8] {
        let len = (len as usize).min(Self::CAPACITY);
        &self.bytes[..len]
    }

    /// Whole buffer, for the transport to receive into
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &Self::CAPACITY)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fill_and_payload() {
        let mut buf = FrameBuffer::new();
        let len = buf.fill(b"hello").unwrap();
        assert_eq!(len, 5);
        assert_eq!(buf.payload(len), b"hello");
    }

    #[test]
    fn test_oversized_fill_leaves_buffer_untouched() {
        let mut buf = FrameBuffer::new();
        buf.fill(b"keep").unwrap();

        let err = buf.fill(&[0xAA; MAX_MESSAGE_LEN + 1]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::PayloadTooLarge { len: 61, max: 60 }
        ));
        assert_eq!(buf.payload(4), b"keep");
    }

    #[test]
    fn test_payload_clamped_to_capacity() {
        let buf = FrameBuffer::new();
        assert_eq!(buf.payload(u8::MAX).len(), MAX_MESSAGE_LEN);
    }

    proptest! {
        #[test]
        fn fill_accepts_exactly_what_fits(data in proptest::collection::vec(any::<u8>(), 0..=128)) {
            let mut buf = FrameBuffer::new();
            match buf.fill(&data) {
                Ok(len) => {
                    prop_assert!(data.len() <= MAX_MESSAGE_LEN);
                    prop_assert_eq!(buf.payload(len), &data[..]);
                }
                Err(_) => prop_assert!(data.len() > MAX_MESSAGE_LEN),
            }
        }
    }
}
