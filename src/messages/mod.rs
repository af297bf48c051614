//! # Messages Module
//!
//! Wire-level data structures for radio communication.
//!
//! ## Architecture
//!
//! The messages module is organized into two components:
//!
//! - **Wire codec**: pure encode/decode of the `TT:IIIIIIII:<payload>`
//!   framing shared by messages and acknowledgements
//! - **RadioPacket**: bounded buffer holding one framed message
//!
//! ## Key Types
//!
//! - `MessageType`: enumeration of supported message types (Gong, Schedule, Status)
//! - `Frame`: a decoded message borrowing its payload from the receive buffer
//! - `RadioPacket`: fixed-capacity wire buffer with fail-closed writes

// Module declarations
pub mod radio_packet;
pub mod wire;

// Re-export public types for convenient access
pub use radio_packet::{PacketError, RadioPacket};
pub use wire::{decode, encode, EncodeError, FormatError, Frame, MessageType, WIRE_OVERHEAD};
