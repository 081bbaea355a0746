//! Status display task
//!
//! Rebuilds the progress row at the configured refresh period (or at once
//! when playback starts or stops) and drives the LCD row rotation.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::Output;
use embassy_time::{Delay, Duration, Instant, Ticker};

use pulsechain_core::config::StatusConfig;
use pulsechain_core::status::StatusReporter;
use pulsechain_display::{Hd44780, StatusBoard};

use super::PulseScheduler;
use crate::channels::STATUS_DIRTY;

/// Rotation and redraw granularity
const TICK_INTERVAL_MS: u64 = 100;

/// Banner row
const BANNER_ROW: u8 = 0;
const BANNER: [&str; 2] = ["Pulsechain", concat!("v", env!("CARGO_PKG_VERSION"))];

pub type Lcd = StatusBoard<Hd44780<Output<'static>, Delay>>;

/// Status task - owns the LCD
///
/// `_rw` keeps the LCD's RW line driven low for as long as the task runs.
#[embassy_executor::task]
pub async fn status_task(
    scheduler: &'static PulseScheduler,
    mut board: Lcd,
    _rw: Output<'static>,
    config: StatusConfig,
) {
    info!("Status task started");

    let mut healthy = match init_display(&mut board) {
        Ok(()) => true,
        Err(e) => {
            warn!("LCD init failed: {:?}", e);
            false
        }
    };

    let mut reporter = StatusReporter::new(config.refresh_ms, config.rotation_ms);
    board.set_lines(BANNER_ROW, &BANNER, config.rotation_ms);

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));

    loop {
        if let Either::Second(()) = select(ticker.next(), STATUS_DIRTY.wait()).await {
            reporter.invalidate();
        }

        let now = Instant::now();
        reporter.update(now.as_micros(), &scheduler.progress(), &mut board);

        match board.tick(now.as_millis()) {
            Ok(_) => {
                if !healthy {
                    info!("LCD recovered");
                    healthy = true;
                }
            }
            Err(e) => {
                if healthy {
                    warn!("LCD write failed: {:?}", e);
                    healthy = false;
                }
            }
        }
    }
}

fn init_display(board: &mut Lcd) -> Result<(), pulsechain_display::DisplayError> {
    board.backend_mut().init()?;
    board.init()
}
