//! # Radio Device Echo - Loopback Device for Testing
//!
//! The simplest possible radio device: every transmitted packet is queued
//! back for reception at full signal strength. No radio transmission
//! occurs, no timing is simulated.
//!
//! ## Use Cases
//!
//! - Testing the framing and dispatch path without hardware
//! - Smoke testing the send/receive flow of the link state machine
//! - Development on the host before the transceiver integration exists
//!
//! ## Limitations
//!
//! - Single node only; an acknowledged message sees its own echo, which the
//!   link treats as the matching acknowledgement
//! - One-packet inbox: a second send before the first echo is read drops
//!   the new packet with a warning, emulating receiver backpressure

use super::RadioDeviceTrait;
use crate::messages::RadioPacket;
use crate::RadioConfiguration;
use log::{log, Level};

/// Signal strength reported for echoed packets, in dBm
const ECHO_RSSI: i16 = -30;

/// Loopback radio device
pub struct RadioDevice {
    inbox: Option<RadioPacket>,
    initialized: bool,
}

impl RadioDevice {
    /// Creates a new echo device; no configuration is needed
    pub const fn new() -> Self {
        RadioDevice {
            inbox: None,
            initialized: false,
        }
    }
}

impl Default for RadioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDeviceTrait for RadioDevice {
    fn initialize(&mut self, params: &RadioConfiguration) -> bool {
        log!(Level::Debug, "echo radio device initialized at {} Hz", params.frequency);
        self.initialized = true;
        true
    }

    fn send_packet(&mut self, data: &[u8]) -> bool {
        if !self.initialized {
            return false;
        }
        let packet = match RadioPacket::from_slice(data) {
            Ok(packet) => packet,
            Err(_) => return false,
        };
        if self.inbox.is_some() {
            // The transmission itself succeeded; the echo is what gets lost
            log!(Level::Warn, "echo inbox full, dropping echoed packet");
        } else {
            self.inbox = Some(packet);
        }
        true
    }

    fn packet_available(&mut self) -> usize {
        self.inbox.as_ref().map_or(0, |packet| packet.length)
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> usize {
        match self.inbox.take() {
            None => 0,
            Some(packet) => {
                let n = packet.length.min(buf.len());
                buf[..n].copy_from_slice(&packet.data[..n]);
                n
            }
        }
    }

    fn last_rssi(&self) -> i16 {
        ECHO_RSSI
    }
}
