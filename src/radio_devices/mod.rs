//! Radio device implementations
//!
//! This module contains the transport contract and the device
//! implementations that can back the radio link:
//!
//! - `echo`: loopback device that queues transmitted packets back for
//!   reception, for testing the full stack without hardware
//! - `simulator`: channel-backed device pair for host-side two-node
//!   scenarios
//!
//! A hardware LoRa transceiver is integrated by implementing
//! [`RadioDeviceTrait`] in the firmware crate that owns the SPI bus and
//! pins; initialization is part of the trait here because the link re-runs
//! it on its recovery path.

use crate::RadioConfiguration;

/// Packet-level transport contract driven exclusively by the radio link
///
/// The link owns the device, which keeps the half-duplex channel safe: no
/// send and receive can be issued concurrently because there is exactly one
/// caller. All methods are non-blocking; a send either completes or is
/// reported failed, and reception is polled.
pub trait RadioDeviceTrait {
    /// Brings the transceiver up with the given channel parameters
    ///
    /// Also used by the link's error-recovery path, so it must be safe to
    /// call repeatedly.
    fn initialize(&mut self, params: &RadioConfiguration) -> bool;

    /// Transmits one packet; returns whether the transport accepted it
    fn send_packet(&mut self, data: &[u8]) -> bool;

    /// Size in bytes of a waiting inbound packet, or 0 when none is pending
    fn packet_available(&mut self) -> usize;

    /// Reads the waiting packet into `buf`, returning the number of bytes
    fn read_packet(&mut self, buf: &mut [u8]) -> usize;

    /// Signal strength of the most recently received packet, in dBm
    fn last_rssi(&self) -> i16;
}

#[cfg(feature = "radio-device-echo")]
pub mod echo;

#[cfg(feature = "radio-device-simulator")]
pub mod simulator;
