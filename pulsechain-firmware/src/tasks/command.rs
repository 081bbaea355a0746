//! Command link task
//!
//! Reads request frames from the UART, runs them against the scheduler and
//! writes back exactly one response frame per request.

use defmt::*;
use embassy_rp::clocks::RoscRng;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use pulsechain_protocol::{Frame, FrameParser, Request, MAX_FRAME_SIZE};

use super::PulseScheduler;
use crate::channels::{PLAYBACK_STARTED, STATUS_DIRTY};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

/// Command task - serves the command link
#[embassy_executor::task]
pub async fn command_task(
    scheduler: &'static PulseScheduler,
    mut rx: BufferedUartRx,
    mut tx: BufferedUartTx,
) {
    info!("Command task started");

    let mut parser = FrameParser::new();
    let mut buf = [0u8; RX_BUF_SIZE];
    let mut rng = seed_rng();

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) => {
                warn!("UART read error: {:?}", e);
                continue;
            }
        };
        trace!("RX: {} bytes", n);

        for &byte in &buf[..n] {
            match parser.feed(byte) {
                Ok(Some(frame)) => {
                    if let Some(response) = execute(scheduler, &frame, &mut rng) {
                        send(&mut tx, &response).await;
                    }
                }
                Ok(None) => {
                    // Need more bytes
                }
                Err(e) => {
                    warn!("Frame parse error: {:?}", e);
                }
            }
        }
    }
}

/// Run one request frame, returning the response frame to send
fn execute(scheduler: &PulseScheduler, frame: &Frame, rng: &mut ChaCha8Rng) -> Option<Frame> {
    let (request, response) = match scheduler.handle_frame(frame, rng) {
        Ok(handled) => handled,
        Err(e) => {
            error!("Failed to encode response: {:?}", e);
            return None;
        }
    };

    match request {
        Some(request) => {
            debug!("Request: {:?}", request);
            match request {
                Request::Start => {
                    // A rejected start leaves an earlier run going
                    if scheduler.is_running() {
                        PLAYBACK_STARTED.signal(());
                    }
                    STATUS_DIRTY.signal(());
                }
                Request::Stop => STATUS_DIRTY.signal(()),
                _ => {}
            }
        }
        None => warn!("Malformed request frame (type 0x{:02x})", frame.msg_type),
    }
    Some(response)
}

/// Sequence RNG, seeded once from ring oscillator jitter
fn seed_rng() -> ChaCha8Rng {
    let mut seed = <ChaCha8Rng as SeedableRng>::Seed::default();
    RoscRng.fill_bytes(&mut seed);
    ChaCha8Rng::from_seed(seed)
}

async fn send(tx: &mut BufferedUartTx, frame: &Frame) {
    let mut out = [0u8; MAX_FRAME_SIZE];
    let len = match frame.encode(&mut out) {
        Ok(len) => len,
        Err(e) => {
            error!("Failed to encode frame: {:?}", e);
            return;
        }
    };

    if let Err(e) = tx.write_all(&out[..len]).await {
        warn!("UART write error: {:?}", e);
    }
}
