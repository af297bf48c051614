//! # Radio Packet Module
//!
//! Bounded wire buffer for radio transmission and reception.
//!
//! ## Architecture
//!
//! `RadioPacket` holds one fully framed message as it travels over the air.
//! Each packet contains:
//! - Raw data buffer of fixed size (`RADIO_MAX_MESSAGE_SIZE`)
//! - Actual data length
//!
//! ## Design Considerations
//!
//! - **Public Fields**: `data` and `length` are public so radio hardware
//!   interfaces can fill or drain the buffer without copying
//! - **Fixed Size**: every packet occupies the same amount of memory,
//!   keeping the single pending slot's footprint predictable
//! - **Fail Closed**: writes that would overrun the buffer are rejected
//!   whole; the buffer is never silently truncated

use crate::RADIO_MAX_MESSAGE_SIZE;

/// Error type for packet buffer operations
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PacketError {
    /// The write would exceed the fixed buffer capacity
    BufferOverflow,
}

/// Fixed-capacity buffer holding one framed wire message
///
/// # Public Fields
/// The `data` and `length` fields are intentionally public for zero-copy
/// hand-off to radio hardware interfaces.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioPacket {
    /// Raw packet data buffer of fixed size
    pub data: [u8; RADIO_MAX_MESSAGE_SIZE],

    /// Actual number of valid bytes in the data buffer
    pub length: usize,
}

impl RadioPacket {
    /// Creates an empty packet
    pub const fn new() -> Self {
        RadioPacket {
            data: [0; RADIO_MAX_MESSAGE_SIZE],
            length: 0,
        }
    }

    /// Creates a packet holding a copy of `bytes`
    ///
    /// # Returns
    /// * `Err(PacketError::BufferOverflow)` if `bytes` does not fit
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut packet = Self::new();
        packet.write(bytes)?;
        Ok(packet)
    }

    /// Appends `bytes` to the buffer, failing closed on overflow
    ///
    /// On error the buffer content and length are left unchanged.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        let end = self.length.checked_add(bytes.len()).ok_or(PacketError::BufferOverflow)?;
        if end > RADIO_MAX_MESSAGE_SIZE {
            return Err(PacketError::BufferOverflow);
        }
        self.data[self.length..end].copy_from_slice(bytes);
        self.length = end;
        Ok(())
    }

    /// Returns the valid portion of the buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Resets the packet to empty without touching the backing storage
    pub fn clear(&mut self) {
        self.length = 0;
    }
}

impl Default for RadioPacket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn write_appends_and_tracks_length() {
        let mut packet = RadioPacket::new();
        packet.write(b"01:").unwrap();
        packet.write(b"payload").unwrap();
        assert_eq!(packet.as_slice(), b"01:payload");
        assert_eq!(packet.length, 10);
    }

    #[test]
    fn overflowing_write_fails_closed() {
        let mut packet = RadioPacket::from_slice(&[0xAA; RADIO_MAX_MESSAGE_SIZE - 4]).unwrap();
        let before = packet.length;
        assert_eq!(packet.write(&[0xBB; 5]), Err(PacketError::BufferOverflow));
        // Nothing was written, not even a truncated prefix
        assert_eq!(packet.length, before);
        assert!(packet.as_slice().iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn from_slice_rejects_oversized_input() {
        let oversized = [0u8; RADIO_MAX_MESSAGE_SIZE + 1];
        assert_eq!(RadioPacket::from_slice(&oversized).unwrap_err(), PacketError::BufferOverflow);
        assert!(RadioPacket::from_slice(&[0u8; RADIO_MAX_MESSAGE_SIZE]).is_ok());
    }

    #[test]
    fn clear_resets_length_only() {
        let mut packet = RadioPacket::from_slice(b"03:00000001:done").unwrap();
        packet.clear();
        assert_eq!(packet.length, 0);
        assert_eq!(packet.as_slice(), b"");
    }
}
