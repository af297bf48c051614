//! # Radio Device Simulator - Host-Side Device Pair
//!
//! Simulated radio devices for testing multi-node scenarios without
//! hardware. Two devices are cross-linked over embassy-sync channels: what
//! one transmits, the other can receive.
//!
//! ## Architecture
//!
//! - **Outbound channel**: packets this node transmits into the air
//! - **Inbound channel**: packets arriving from the sibling node
//! - **Inbox slot**: one packet pulled from the inbound channel and held
//!   until the link reads it, mirroring a transceiver's receive FIFO
//!
//! Backpressure matches the other devices: when the sibling's channel is
//! full the packet is lost in the air with a warning, while the send itself
//! still succeeds.

use super::RadioDeviceTrait;
use crate::messages::RadioPacket;
use crate::RadioConfiguration;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender, TrySendError};
use log::{log, Level};

/// Packets buffered in the air per direction
const SIMULATOR_QUEUE_SIZE: usize = 8;

/// Channel carrying packets between two simulated devices
pub type PacketChannel = Channel<CriticalSectionRawMutex, RadioPacket, SIMULATOR_QUEUE_SIZE>;
pub type PacketChannelSender = Sender<'static, CriticalSectionRawMutex, RadioPacket, SIMULATOR_QUEUE_SIZE>;
pub type PacketChannelReceiver = Receiver<'static, CriticalSectionRawMutex, RadioPacket, SIMULATOR_QUEUE_SIZE>;

/// Baseline signal strength reported for simulated reception, in dBm
const SIMULATOR_RSSI: i16 = -70;

/// Simulated radio device, one half of a cross-linked pair
pub struct RadioDevice {
    outbound: PacketChannelSender,
    inbound: PacketChannelReceiver,
    inbox: Option<RadioPacket>,
    initialized: bool,
    received_count: u32,
}

impl RadioDevice {
    /// Creates a device from one end of a channel pair
    pub fn new(outbound: PacketChannelSender, inbound: PacketChannelReceiver) -> Self {
        RadioDevice {
            outbound,
            inbound,
            inbox: None,
            initialized: false,
            received_count: 0,
        }
    }

    /// Creates two cross-linked devices sharing a simulated channel
    #[cfg(feature = "std")]
    pub fn pair() -> (RadioDevice, RadioDevice) {
        let a_to_b: &'static PacketChannel = Box::leak(Box::new(Channel::new()));
        let b_to_a: &'static PacketChannel = Box::leak(Box::new(Channel::new()));
        (
            RadioDevice::new(a_to_b.sender(), b_to_a.receiver()),
            RadioDevice::new(b_to_a.sender(), a_to_b.receiver()),
        )
    }

    fn pull_inbound(&mut self) {
        if self.inbox.is_none() {
            if let Ok(packet) = self.inbound.try_receive() {
                self.received_count = self.received_count.wrapping_add(1);
                self.inbox = Some(packet);
            }
        }
    }
}

impl RadioDeviceTrait for RadioDevice {
    fn initialize(&mut self, params: &RadioConfiguration) -> bool {
        log!(
            Level::Debug,
            "simulated radio initialized at {} Hz, sf{}, {} Hz bandwidth",
            params.frequency,
            params.spreading_factor,
            params.bandwidth
        );
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
        match self.outbound.try_send(packet) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // The air has no memory: the sibling simply misses it
                log!(Level::Warn, "simulated channel full, packet lost in transit");
            }
        }
        true
    }

    fn packet_available(&mut self) -> usize {
        self.pull_inbound();
        self.inbox.as_ref().map_or(0, |packet| packet.length)
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> usize {
        self.pull_inbound();
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
        // A little per-packet wiggle keeps receive logs from looking frozen
        SIMULATOR_RSSI - (self.received_count % 7) as i16
    }
}
