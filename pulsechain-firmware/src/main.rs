//! Pulsechain - Chained Exposure Schedule Firmware
//!
//! Main firmware binary for RP2040-based exposure controllers. A remote
//! operator stages a timing and an ON/OFF sequence over the command link;
//! the firmware splits it into engine-sized segments and plays them back to
//! back on a PIO state machine, one double-buffered waveform at a time.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{PIO0, UART0};
use embassy_rp::pio::Pio;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Delay;
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use pulsechain_core::config::{parse_config, DeviceConfig};
use pulsechain_core::scheduler::{Scheduler, SharedScheduler};
use pulsechain_core::traits::PulseEngine;
use pulsechain_display::{Hd44780, StatusBoard};
use pulsechain_hal_rp2040::PioPulseEngine;

use crate::clock::EmbassyClock;
use crate::tasks::PulseScheduler;

// Heap for staged/committed sequences and compiled waveforms
#[global_allocator]
static HEAP: Heap = Heap::empty();

// Heap size: 160KB
const HEAP_SIZE: usize = 160 * 1024;

/// Embedded configuration (compiled into firmware)
/// Edit device.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../device.toml");

/// Board wiring
const OUTPUT_PIN: u8 = 14;
const LINK_TX_PIN: u8 = 0;
const LINK_RX_PIN: u8 = 1;

mod channels;
mod clock;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 512]> = StaticCell::new();

static SCHEDULER: StaticCell<PulseScheduler> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Pulsechain firmware starting...");

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = load_config();
    check_wiring(&config);

    // Exposure output on PIO0 SM0, held at the OFF level until playback
    let Pio {
        mut common, sm0, ..
    } = Pio::new(p.PIO0, Irqs);
    let playback = config.playback();
    let engine = PioPulseEngine::new(
        &mut common,
        sm0,
        p.PIN_14,
        playback.polarity.off_level(),
        config.engine.max_pulses,
    )
    .with_max_micros(config.engine.max_micros);
    info!(
        "PIO pulse engine initialized: {:?}, idle {:?}",
        engine.limits(),
        playback.polarity.off_level()
    );

    let scheduler: &'static PulseScheduler = SCHEDULER.init(SharedScheduler::new(Scheduler::new(
        engine,
        EmbassyClock,
        playback,
    )));

    // Command link UART
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = config.link.baud_rate;

    let tx_buf = TX_BUF.init([0u8; 512]);
    let rx_buf = RX_BUF.init([0u8; 512]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();
    info!("Command link initialized at {} baud", config.link.baud_rate);

    // HD44780 in 4-bit mode: RS=GPIO15, E=GPIO16, D4-D7=GPIO21-24, RW tied low
    let rw = Output::new(p.PIN_18, Level::Low);
    let lcd = Hd44780::new(
        Output::new(p.PIN_15, Level::Low),
        Output::new(p.PIN_16, Level::Low),
        [
            Output::new(p.PIN_21, Level::Low),
            Output::new(p.PIN_22, Level::Low),
            Output::new(p.PIN_23, Level::Low),
            Output::new(p.PIN_24, Level::Low),
        ],
        Delay,
    );
    let board = StatusBoard::new(lcd);

    spawner.spawn(tasks::playback_task(scheduler)).unwrap();
    spawner.spawn(tasks::command_task(scheduler, rx, tx)).unwrap();
    spawner
        .spawn(tasks::status_task(scheduler, board, rw, config.status))
        .unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Parse the embedded device.toml
///
/// build.rs already rejects a bad file, so the fallback only guards
/// against the two parsers disagreeing.
fn load_config() -> DeviceConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Configuration loaded: {:?}", config);
            config
        }
        Err(e) => {
            error!("Embedded config invalid ({:?}), using defaults", e);
            DeviceConfig::default()
        }
    }
}

/// Report configured pins the board does not actually use
fn check_wiring(config: &DeviceConfig) {
    if config.output.pin.pin != OUTPUT_PIN {
        warn!(
            "Output configured on GPIO{}, board drives GPIO{}",
            config.output.pin.pin, OUTPUT_PIN
        );
    }
    if config.link.tx_pin != LINK_TX_PIN || config.link.rx_pin != LINK_RX_PIN {
        warn!(
            "Link configured on GPIO{}/GPIO{}, board uses GPIO{}/GPIO{}",
            config.link.tx_pin, config.link.rx_pin, LINK_TX_PIN, LINK_RX_PIN
        );
    }
}
