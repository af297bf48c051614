use chimenet_radio_lib::radio_devices::echo::RadioDevice;
use chimenet_radio_lib::{LinkConfig, LinkState, RadioConfiguration, RadioLink};
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use env_logger::Builder;
use log::LevelFilter;
use log::{info, log};

/// Free-memory query for the host demo; a real firmware build wires this to
/// the allocator or heap watermark of the target.
fn free_memory() -> u32 {
    64 * 1024
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Debug).init();

    log!(log::Level::Debug, "Starting up");
    let radio_device = RadioDevice::new();
    let mut link = RadioLink::new(
        radio_device,
        RadioConfiguration::default(),
        LinkConfig::default(),
        || info!("gong callback fired, playback would start here"),
        free_memory,
        42,
    );

    if link.initialize(Instant::now()).is_err() {
        log!(log::Level::Error, "radio initialization failed, recovery will retry");
    }

    // With the echo device every unacked gong we transmit comes right back
    // and fires the callback above.
    let mut last_trigger = Instant::now();
    loop {
        link.tick(Instant::now());

        if last_trigger.elapsed() > Duration::from_secs(5) && link.state() == LinkState::Idle {
            let _ = link.send_message(b"{\"type\":\"gong\"}", chimenet_radio_lib::MessageType::Gong, false, Instant::now());
            last_trigger = Instant::now();
            let stats = link.stats();
            log!(
                log::Level::Info,
                "stats: {} sent, {} errors, {} memory errors, {} log lines",
                stats.success_count,
                stats.error_count,
                stats.memory_error_count,
                stats.log_count
            );
        }

        Timer::after(Duration::from_millis(50)).await;
    }
}
