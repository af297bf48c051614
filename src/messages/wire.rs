//! # Wire Codec Module
//!
//! Encoding and decoding of the colon-delimited framing used on the radio
//! channel. Pure functions, no I/O, no state.
//!
//! ## Wire Format
//!
//! Every message and acknowledgement travels as a single packet:
//!
//! ```text
//! TT:IIIIIIII:<payload>
//! ```
//!
//! - `TT` — message type, two hex digits
//! - `IIIIIIII` — message id, eight hex digits
//! - `<payload>` — application content (JSON object or opaque bytes)
//!
//! Only the first two colons are structural; the payload may contain
//! further colons. The encoder always emits fixed-width uppercase fields;
//! the decoder tolerates shorter fields and lowercase hex, matching what
//! earlier firmware revisions put on the air.

use super::radio_packet::RadioPacket;

/// Framing overhead in bytes: type field, id field and the two separators
pub const WIRE_OVERHEAD: usize = 12;

/// Application-level message types carried on the channel
///
/// `Schedule` and `Status` are recognized but their payloads are reserved
/// for future protocol extension; receiving one must not count as an error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum MessageType {
    /// Chime trigger for local or remote playback
    Gong = 0x01,
    /// Schedule synchronization (reserved)
    Schedule = 0x02,
    /// Status report (reserved)
    Status = 0x03,
}

impl MessageType {
    /// Maps a wire byte onto a known message type
    pub fn from_wire(value: u8) -> Option<MessageType> {
        match value {
            0x01 => Some(MessageType::Gong),
            0x02 => Some(MessageType::Schedule),
            0x03 => Some(MessageType::Status),
            _ => None,
        }
    }

    /// Returns the byte this type is framed as
    pub fn as_wire(self) -> u8 {
        self as u8
    }
}

/// Reasons a received byte sequence is not a valid frame
///
/// The caller drops the packet and counts one error, whatever the reason.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FormatError {
    /// Shorter than the minimal `T:I:` frame
    TooShort,
    /// Fewer than two colon separators
    MissingSeparator,
    /// Type field empty, not hex, or naming an unknown type
    InvalidType,
    /// Id field empty, longer than eight digits, or not hex
    InvalidId,
}

/// Error returned when a payload does not fit the packet buffer once framed
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EncodeError {
    TooLarge,
}

/// A decoded frame borrowing the payload from the receive buffer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Frame<'a> {
    pub message_type: MessageType,
    pub id: u32,
    pub payload: &'a [u8],
}

/// Frames `payload` as `TT:IIIIIIII:<payload>` into `packet`
///
/// The packet is cleared first. Fails with `EncodeError::TooLarge` when the
/// framed form would exceed the buffer; the packet content is unspecified
/// after a failure and must not be transmitted.
pub fn encode(message_type: MessageType, id: u32, payload: &[u8], packet: &mut RadioPacket) -> Result<(), EncodeError> {
    packet.clear();

    let mut header = [0u8; WIRE_OVERHEAD];
    let type_byte = message_type.as_wire();
    header[0] = hex_digit(type_byte >> 4);
    header[1] = hex_digit(type_byte & 0x0F);
    header[2] = b':';
    for (i, slot) in header[3..11].iter_mut().enumerate() {
        *slot = hex_digit(((id >> (28 - 4 * i)) & 0x0F) as u8);
    }
    header[11] = b':';

    packet.write(&header).map_err(|_| EncodeError::TooLarge)?;
    packet.write(payload).map_err(|_| EncodeError::TooLarge)?;
    Ok(())
}

/// Parses a received byte sequence into a [`Frame`]
///
/// Validation: total length of at least 5 bytes, two colon separators, a
/// type field of 1-2 hex digits naming a known type, and an id field of 1-8
/// hex digits. Pure, no side effects.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, FormatError> {
    if bytes.len() < 5 {
        return Err(FormatError::TooShort);
    }

    let first = bytes.iter().position(|&b| b == b':').ok_or(FormatError::MissingSeparator)?;
    let rest = &bytes[first + 1..];
    let second = rest.iter().position(|&b| b == b':').ok_or(FormatError::MissingSeparator)?;

    let type_field = &bytes[..first];
    let id_field = &rest[..second];
    let payload = &rest[second + 1..];

    if type_field.is_empty() || type_field.len() > 2 {
        return Err(FormatError::InvalidType);
    }
    let type_value = parse_hex(type_field).ok_or(FormatError::InvalidType)?;
    let message_type = MessageType::from_wire(type_value as u8).ok_or(FormatError::InvalidType)?;

    if id_field.is_empty() || id_field.len() > 8 {
        return Err(FormatError::InvalidId);
    }
    let id = parse_hex(id_field).ok_or(FormatError::InvalidId)?;

    Ok(Frame { message_type, id, payload })
}

fn hex_digit(nibble: u8) -> u8 {
    match nibble {
        0..=9 => b'0' + nibble,
        _ => b'A' + nibble - 10,
    }
}

fn hex_value(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some((byte - b'0') as u32),
        b'a'..=b'f' => Some((byte - b'a') as u32 + 10),
        b'A'..=b'F' => Some((byte - b'A') as u32 + 10),
        _ => None,
    }
}

fn parse_hex(field: &[u8]) -> Option<u32> {
    let mut value: u32 = 0;
    for &byte in field {
        value = (value << 4) | hex_value(byte)?;
    }
    Some(value)
}
