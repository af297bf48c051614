//! Radio messaging subsystem for the ChimeNet appliance.
//!
//! Turns a half-duplex, single-outstanding-packet radio primitive into an
//! application-level reliable-delivery service: one pending message slot,
//! bounded retries, acknowledgement waiting, watchdog-driven recovery and
//! memory-pressure governance, all driven by a cooperative non-blocking
//! tick.

#![cfg_attr(not(feature = "std"), no_std)]

mod link_logger;
mod memory_monitor;
pub mod messages;
pub mod radio_devices;
mod rx_handler;

#[cfg(all(test, feature = "std"))]
mod test_support;

use embassy_time::{Duration, Instant};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;

use link_logger::LinkLogger;
use memory_monitor::MemoryMonitor;
use messages::wire;
use rx_handler::{GongPayload, GONG_DEVICE_NAME};

// Re-export the types callers interact with
pub use link_logger::LogLevel;
pub use memory_monitor::{MemoryStatus, CRITICAL_MEMORY_THRESHOLD, LOW_MEMORY_THRESHOLD, MEMORY_CHECK_INTERVAL, MIN_FREE_FOR_INIT};
pub use messages::{decode, encode, EncodeError, FormatError, Frame, MessageType, PacketError, RadioPacket, WIRE_OVERHEAD};
pub use radio_devices::RadioDeviceTrait;

/// Capacity of the wire buffer; one framed message must fit entirely
pub const RADIO_MAX_MESSAGE_SIZE: usize = 256;

/// Largest payload that still fits once framed
pub const RADIO_MAX_PAYLOAD_SIZE: usize = RADIO_MAX_MESSAGE_SIZE - messages::wire::WIRE_OVERHEAD;

/// Consecutive device bring-up attempts during initialization
const INIT_ATTEMPTS: u8 = 3;

/// Time spent in the error state before a recovery attempt
const RECOVERY_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound of the random addition to the retry delay; decorrelates two
/// siblings that failed simultaneously on the shared channel
const RETRY_JITTER_MAX_MS: u64 = 500;

/// Scratch space for serializing the outbound gong envelope
const GONG_PAYLOAD_BUFFER_SIZE: usize = 96;

/// Channel parameters handed to the radio device, fixed at construction
/// and reused by the recovery path
#[derive(Clone, Copy, Debug)]
pub struct RadioConfiguration {
    /// Carrier frequency in Hz
    pub frequency: u32,
    /// Network separation byte
    pub sync_word: u8,
    pub spreading_factor: u8,
    /// Signal bandwidth in Hz
    pub bandwidth: u32,
    /// Denominator of the 4/x coding rate
    pub coding_rate: u8,
    /// Transmit power in dBm
    pub tx_power: u8,
    pub crc_enabled: bool,
}

impl Default for RadioConfiguration {
    /// 433 MHz channel setup of the reference appliance
    fn default() -> Self {
        RadioConfiguration {
            frequency: 433_000_000,
            sync_word: 0x12,
            spreading_factor: 7,
            bandwidth: 125_000,
            coding_rate: 5,
            tx_power: 20,
            crc_enabled: true,
        }
    }
}

/// Reliability policy of the link, fixed at construction
#[derive(Clone, Copy, Debug)]
pub struct LinkConfig {
    /// Retry attempts after the initial send
    pub max_retries: u8,
    /// How long an acknowledgement is awaited before a retry
    pub ack_timeout: Duration,
    /// Pause before a failed send is attempted again (jitter is added)
    pub retry_delay: Duration,
    /// Watchdog bound on time spent in any non-idle state
    pub state_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            max_retries: 3,
            ack_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_secs(1),
            state_timeout: Duration::from_secs(10),
        }
    }
}

/// States of the reliability state machine
///
/// `Error` is recoverable, not terminal: after a fixed backoff the link
/// re-initializes the radio device and returns to `Idle`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LinkState {
    Idle,
    Sending,
    WaitingAck,
    Receiving,
    Error,
}

/// Why a submission was rejected; rejections leave all state untouched
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SendMessageError {
    /// The single message slot is occupied; the caller may poll for idle
    Busy,
    /// The payload would not fit in the wire buffer once framed
    TooLarge,
    /// The radio has not been brought up (or initialization failed)
    NotInited,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InitializeError {
    /// Free memory is below the floor required to run the radio at all
    InsufficientMemory,
    /// The transceiver did not come up after the configured attempts
    DeviceFailed,
}

/// Snapshot of the session counters
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct LinkStats {
    pub error_count: u32,
    pub success_count: u32,
    pub memory_error_count: u32,
    pub log_count: u32,
}

/// The single outstanding transmission unit
struct PendingMessage {
    packet: RadioPacket,
    message_type: MessageType,
    id: u32,
    retry_count: u8,
    requires_ack: bool,
    /// Time of the last (re)send attempt
    last_attempt_at: Instant,
    /// Earliest time of the next attempt after a failed send
    next_attempt_at: Instant,
}

/// Reliable-delivery radio link: session context, message governor and
/// reliability state machine in one owned object
///
/// Created once at startup and driven by an external periodic call to
/// [`tick`](RadioLink::tick). The link exclusively owns the radio device,
/// which keeps the half-duplex channel free of send/receive conflicts.
/// Submissions and administrative calls are synchronous and execute on the
/// same logical thread of control as the tick.
///
/// Injected capabilities:
/// - `on_gong`: invoked synchronously when a chime trigger arrives
/// - `free_memory`: returns currently available memory in bytes
pub struct RadioLink<D, G, M>
where
    D: RadioDeviceTrait,
    G: FnMut(),
    M: Fn() -> u32,
{
    device: D,
    params: RadioConfiguration,
    config: LinkConfig,
    state: LinkState,
    state_entered_at: Instant,
    pending: Option<PendingMessage>,
    next_message_id: u32,
    initialized: bool,
    error_count: u32,
    success_count: u32,
    memory_error_count: u32,
    logger: LinkLogger,
    memory: MemoryMonitor,
    rng: WyRand,
    on_gong: G,
    free_memory: M,
}

impl<D, G, M> RadioLink<D, G, M>
where
    D: RadioDeviceTrait,
    G: FnMut(),
    M: Fn() -> u32,
{
    /// Creates the link in its uninitialized state
    ///
    /// Nothing talks to the radio until [`initialize`](RadioLink::initialize)
    /// succeeds; until then every submission is rejected with `NotInited`.
    pub fn new(device: D, params: RadioConfiguration, config: LinkConfig, on_gong: G, free_memory: M, rng_seed: u64) -> Self {
        RadioLink {
            device,
            params,
            config,
            state: LinkState::Idle,
            state_entered_at: Instant::from_ticks(0),
            pending: None,
            next_message_id: 0,
            initialized: false,
            error_count: 0,
            success_count: 0,
            memory_error_count: 0,
            logger: LinkLogger::new(LogLevel::Info),
            memory: MemoryMonitor::new(),
            rng: WyRand::seed_from_u64(rng_seed),
            on_gong,
            free_memory,
        }
    }

    /// Brings the radio device up
    ///
    /// Refused outright when free memory is below the floor. The device
    /// gets `INIT_ATTEMPTS` consecutive tries; if none succeeds the link
    /// enters the error state, from which the tick-driven recovery path
    /// keeps retrying on its backoff.
    pub fn initialize(&mut self, now: Instant) -> Result<(), InitializeError> {
        self.logger.log(LogLevel::Info, format_args!("initializing radio module"));

        let free = (self.free_memory)();
        if !memory_monitor::sufficient_for_init(free) {
            self.memory_error_count += 1;
            self.logger
                .log(LogLevel::Error, format_args!("insufficient memory for radio initialization: {} bytes free", free));
            return Err(InitializeError::InsufficientMemory);
        }

        let mut attempt = 0;
        while attempt < INIT_ATTEMPTS {
            if self.device.initialize(&self.params) {
                self.initialized = true;
                self.memory.start(now);
                self.change_state(LinkState::Idle, now);
                self.logger
                    .log(LogLevel::Info, format_args!("radio module initialized at {} Hz", self.params.frequency));
                return Ok(());
            }
            attempt += 1;
            self.logger.log(LogLevel::Warn, format_args!("radio initialization attempt {} failed", attempt));
        }

        self.initialized = false;
        self.change_state(LinkState::Error, now);
        self.logger
            .log(LogLevel::Error, format_args!("radio initialization failed after {} attempts", INIT_ATTEMPTS));
        Err(InitializeError::DeviceFailed)
    }

    /// Submits a message for transmission
    ///
    /// Accepts only while the link is idle and the single slot is free:
    /// this is deliberate backpressure, not a queue. On acceptance the
    /// payload is framed, stored as the pending message and the state
    /// machine moves to `Sending`; the assigned message id is returned.
    /// Rejections leave the pending slot and every counter untouched.
    pub fn send_message(&mut self, payload: &[u8], message_type: MessageType, requires_ack: bool, now: Instant) -> Result<u32, SendMessageError> {
        if !self.initialized {
            self.logger.log(LogLevel::Error, format_args!("radio not initialized, cannot send message"));
            return Err(SendMessageError::NotInited);
        }
        if self.state != LinkState::Idle || self.pending.is_some() {
            self.logger
                .log(LogLevel::Warn, format_args!("link busy in state {:?}, rejecting message", self.state));
            return Err(SendMessageError::Busy);
        }
        if payload.len() > RADIO_MAX_PAYLOAD_SIZE {
            self.logger.log(
                LogLevel::Error,
                format_args!("message too large for radio buffer: {} bytes (max: {})", payload.len(), RADIO_MAX_PAYLOAD_SIZE),
            );
            return Err(SendMessageError::TooLarge);
        }

        // Ids are unique within a run only; they restart at zero on reboot
        self.next_message_id = self.next_message_id.wrapping_add(1);
        let id = self.next_message_id;

        let mut packet = RadioPacket::new();
        wire::encode(message_type, id, payload, &mut packet).map_err(|_| SendMessageError::TooLarge)?;

        self.pending = Some(PendingMessage {
            packet,
            message_type,
            id,
            retry_count: 0,
            requires_ack,
            last_attempt_at: now,
            next_attempt_at: now,
        });
        self.logger.log(
            LogLevel::Debug,
            format_args!("prepared message (type: {:?}, id: 0x{:08X}, ack: {})", message_type, id, requires_ack),
        );
        self.change_state(LinkState::Sending, now);
        Ok(id)
    }

    /// Builds the chime-trigger JSON envelope and submits it with an
    /// acknowledgement request
    pub fn send_gong_trigger(&mut self, now: Instant) -> Result<u32, SendMessageError> {
        self.logger.log(LogLevel::Info, format_args!("sending gong trigger"));
        let payload = GongPayload {
            kind: "gong",
            timestamp: now.as_millis(),
            device: GONG_DEVICE_NAME,
        };
        let mut buf = [0u8; GONG_PAYLOAD_BUFFER_SIZE];
        let len = serde_json_core::to_slice(&payload, &mut buf).map_err(|_| SendMessageError::TooLarge)?;
        self.send_message(&buf[..len], MessageType::Gong, true, now)
    }

    /// One non-blocking iteration of the state machine
    ///
    /// Samples memory pressure on its interval, advances the current state,
    /// and finally applies the watchdog: any state other than idle held
    /// longer than the configured timeout forces the error state, even when
    /// the state logic completed something this very tick.
    pub fn tick(&mut self, now: Instant) {
        if !self.initialized && self.state != LinkState::Error {
            return;
        }

        let free = (self.free_memory)();
        if let Some(status) = self.memory.poll(now, free) {
            match status {
                MemoryStatus::Ok => {}
                MemoryStatus::Warning => {
                    self.memory_error_count += 1;
                    self.logger.log(LogLevel::Warn, format_args!("low memory: {} bytes free", free));
                }
                MemoryStatus::Critical => {
                    self.memory_error_count += 1;
                    self.logger.log(LogLevel::Error, format_args!("critical memory pressure: {} bytes free", free));
                    self.cleanup_pending();
                }
            }
        }

        // Snapshot before the state logic runs; transitions made this tick
        // must not let the watchdog window start over.
        let entry_state = self.state;
        let state_expired = entry_state != LinkState::Idle && now.saturating_duration_since(self.state_entered_at) > self.config.state_timeout;

        match self.state {
            LinkState::Idle => self.tick_idle(now),
            LinkState::Sending => self.tick_sending(now),
            LinkState::WaitingAck => self.tick_waiting_ack(now),
            LinkState::Receiving => self.tick_receiving(now),
            LinkState::Error => self.tick_error(now),
        }

        if state_expired {
            self.error_count += 1;
            self.logger.log(LogLevel::Error, format_args!("state timeout in {:?}", entry_state));
            self.change_state(LinkState::Error, now);
        }
    }

    fn tick_idle(&mut self, now: Instant) {
        // Inbound traffic wins over a parked retry on the half-duplex channel
        if self.device.packet_available() > 0 {
            self.change_state(LinkState::Receiving, now);
            return;
        }
        if let Some(pending) = self.pending.as_ref() {
            if now >= pending.next_attempt_at {
                self.change_state(LinkState::Sending, now);
            }
        }
    }

    fn tick_sending(&mut self, now: Instant) {
        let Some(pending) = self.pending.as_mut() else {
            // The slot is only ever cleared while idle, so there is nothing
            // sane to transmit here
            self.change_state(LinkState::Idle, now);
            return;
        };

        pending.last_attempt_at = now;
        let sent = self.device.send_packet(pending.packet.as_slice());
        let id = pending.id;

        if sent {
            if pending.requires_ack {
                self.logger.log(LogLevel::Debug, format_args!("message sent, waiting for ack (id: 0x{:08X})", id));
                self.change_state(LinkState::WaitingAck, now);
            } else {
                let message_type = pending.message_type;
                self.pending = None;
                self.success_count += 1;
                self.logger
                    .log(LogLevel::Debug, format_args!("message sent (type: {:?}, id: 0x{:08X})", message_type, id));
                self.change_state(LinkState::Idle, now);
            }
            return;
        }

        if pending.retry_count < self.config.max_retries {
            pending.retry_count += 1;
            let jitter = Duration::from_millis(self.rng.next_u64() % RETRY_JITTER_MAX_MS);
            pending.next_attempt_at = pending.last_attempt_at + self.config.retry_delay + jitter;
            let attempt = pending.retry_count;
            self.logger.log(
                LogLevel::Warn,
                format_args!("send failed, retry {}/{} scheduled (id: 0x{:08X})", attempt, self.config.max_retries, id),
            );
            self.change_state(LinkState::Idle, now);
        } else {
            let message_type = pending.message_type;
            self.pending = None;
            self.error_count += 1;
            self.logger.log(
                LogLevel::Error,
                format_args!(
                    "message dropped after {} retries (type: {:?}, id: 0x{:08X})",
                    self.config.max_retries, message_type, id
                ),
            );
            self.change_state(LinkState::Idle, now);
        }
    }

    fn tick_waiting_ack(&mut self, now: Instant) {
        if self.device.packet_available() > 0 && self.try_take_ack(now) {
            return;
        }
        if now.saturating_duration_since(self.state_entered_at) <= self.config.ack_timeout {
            return;
        }

        let Some(pending) = self.pending.as_mut() else {
            self.change_state(LinkState::Idle, now);
            return;
        };
        if pending.retry_count < self.config.max_retries {
            pending.retry_count += 1;
            let attempt = pending.retry_count;
            let id = pending.id;
            self.logger.log(
                LogLevel::Warn,
                format_args!("ack timeout, retry {}/{} (id: 0x{:08X})", attempt, self.config.max_retries, id),
            );
            self.change_state(LinkState::Sending, now);
        } else {
            let id = pending.id;
            self.pending = None;
            self.error_count += 1;
            self.logger.log(
                LogLevel::Error,
                format_args!("ack timeout after {} retries (id: 0x{:08X})", self.config.max_retries, id),
            );
            self.change_state(LinkState::Idle, now);
        }
    }

    fn tick_error(&mut self, now: Instant) {
        if now.saturating_duration_since(self.state_entered_at) <= RECOVERY_BACKOFF {
            return;
        }
        self.logger.log(LogLevel::Info, format_args!("attempting radio recovery"));
        if self.device.initialize(&self.params) {
            self.initialized = true;
            self.change_state(LinkState::Idle, now);
            self.logger.log(LogLevel::Info, format_args!("radio recovery successful"));
        } else {
            self.logger.log(LogLevel::Error, format_args!("radio recovery failed"));
            // Re-entering restarts the backoff window
            self.change_state(LinkState::Error, now);
        }
    }

    /// Frees the pending slot under critical memory pressure; a no-op in
    /// any state but idle, since the buffer may be mid-flight otherwise
    fn cleanup_pending(&mut self) {
        if self.state != LinkState::Idle {
            return;
        }
        if self.pending.take().is_some() {
            self.logger.log(LogLevel::Warn, format_args!("cleared pending message to free memory"));
        }
    }

    pub(crate) fn change_state(&mut self, new_state: LinkState, now: Instant) {
        if self.state != new_state {
            self.logger
                .log(LogLevel::Debug, format_args!("state changed: {:?} -> {:?}", self.state, new_state));
        }
        self.state = new_state;
        self.state_entered_at = now;
    }

    /// Current state of the reliability state machine
    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Id of the in-flight message, if any
    pub fn pending_message_id(&self) -> Option<u32> {
        self.pending.as_ref().map(|pending| pending.id)
    }

    /// Snapshot of the session counters
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            error_count: self.error_count,
            success_count: self.success_count,
            memory_error_count: self.memory_error_count,
            log_count: self.logger.emitted(),
        }
    }

    /// Zeroes every session counter, including the emitted-log count
    pub fn reset_stats(&mut self) {
        self.error_count = 0;
        self.success_count = 0;
        self.memory_error_count = 0;
        self.logger.reset_count();
    }

    /// Sets the minimum severity the logger passes through
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.logger.set_level(level);
        self.logger.log(LogLevel::Info, format_args!("log level set to {:?}", level));
    }

    pub fn log_level(&self) -> LogLevel {
        self.logger.level()
    }
}
