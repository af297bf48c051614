//! Shared helpers for the state-machine tests: a scripted radio device and
//! link constructors with observable callbacks.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embassy_time::Instant;

use crate::radio_devices::RadioDeviceTrait;
use crate::{LinkConfig, RadioConfiguration, RadioLink};

/// Millisecond shorthand for synthetic clock values
pub(crate) fn t(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

/// Scripted radio device
///
/// All state sits behind `Rc`, so a clone kept by the test keeps observing
/// and steering the device after the link has taken ownership of the other
/// clone. Sends and initializations succeed unless a failure was queued.
#[derive(Clone, Default)]
pub(crate) struct TestDevice {
    inbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
    send_results: Rc<RefCell<VecDeque<bool>>>,
    init_results: Rc<RefCell<VecDeque<bool>>>,
    init_calls: Rc<Cell<u32>>,
}

impl TestDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues an inbound packet for the link to receive
    pub(crate) fn queue_inbound(&self, bytes: &[u8]) {
        self.inbox.borrow_mut().push_back(bytes.to_vec());
    }

    /// Makes the next `count` send attempts fail
    pub(crate) fn fail_next_sends(&self, count: usize) {
        for _ in 0..count {
            self.send_results.borrow_mut().push_back(false);
        }
    }

    /// Makes the next `count` initialization attempts fail
    pub(crate) fn fail_next_inits(&self, count: usize) {
        for _ in 0..count {
            self.init_results.borrow_mut().push_back(false);
        }
    }

    /// Packets the transport accepted, in order
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().clone()
    }

    pub(crate) fn init_calls(&self) -> u32 {
        self.init_calls.get()
    }
}

impl RadioDeviceTrait for TestDevice {
    fn initialize(&mut self, _params: &RadioConfiguration) -> bool {
        self.init_calls.set(self.init_calls.get() + 1);
        self.init_results.borrow_mut().pop_front().unwrap_or(true)
    }

    fn send_packet(&mut self, data: &[u8]) -> bool {
        let ok = self.send_results.borrow_mut().pop_front().unwrap_or(true);
        if ok {
            self.sent.borrow_mut().push(data.to_vec());
        }
        ok
    }

    fn packet_available(&mut self) -> usize {
        self.inbox.borrow().front().map_or(0, |bytes| bytes.len())
    }

    fn read_packet(&mut self, buf: &mut [u8]) -> usize {
        match self.inbox.borrow_mut().pop_front() {
            None => 0,
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                n
            }
        }
    }

    fn last_rssi(&self) -> i16 {
        -60
    }
}

pub(crate) type TestLink = RadioLink<TestDevice, Box<dyn FnMut()>, Box<dyn Fn() -> u32>>;

/// Builds a link over `device` with the default policy
///
/// Returns the link plus shared counters: gong callback invocations and the
/// value the injected memory query reports (64 KiB unless the test lowers
/// it).
pub(crate) fn new_link(device: TestDevice) -> (TestLink, Rc<Cell<u32>>, Rc<Cell<u32>>) {
    new_link_with(device, LinkConfig::default())
}

pub(crate) fn new_link_with(device: TestDevice, config: LinkConfig) -> (TestLink, Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let gongs = Rc::new(Cell::new(0u32));
    let free = Rc::new(Cell::new(64 * 1024u32));
    let gong_counter = gongs.clone();
    let free_memory = free.clone();
    let link = RadioLink::new(
        device,
        RadioConfiguration::default(),
        config,
        Box::new(move || gong_counter.set(gong_counter.get() + 1)) as Box<dyn FnMut()>,
        Box::new(move || free_memory.get()) as Box<dyn Fn() -> u32>,
        0x5EED,
    );
    (link, gongs, free)
}
