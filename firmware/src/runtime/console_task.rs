use core::fmt::Write as _;

use dimmer_core::console::commands::{CommandError, CommandExecutor, CommandResult};
use dimmer_core::console::grammar;
use dimmer_core::console::status::{write_error, write_outcome};
use dimmer_core::dimmer::Paused;
use dimmer_core::{DEFAULT_CHANNEL_CAPACITY, DimmerHandle};
use embassy_time::Timer;
use heapless::String;

use super::{CONSOLE_RX_QUEUE, CONSOLE_TX_QUEUE, FirmwarePins};
use crate::console::{FrameEncoder, Ingest, LineSession};
use crate::hw::{self, BankError};
use crate::status;
use crate::telemetry::{self, ConfigEvent};

/// Room for the longest response (`help`, or `list` with every channel).
const RESPONSE_CAPACITY: usize = 1024;

/// How long to wait between checks while the control loop parks.
const PAUSE_POLL_US: u64 = 20;

type Handle = DimmerHandle<'static, DEFAULT_CHANNEL_CAPACITY>;

#[embassy_executor::task]
pub async fn run(mut handle: Handle, pins: FirmwarePins) -> ! {
    let rx_queue = CONSOLE_RX_QUEUE.receiver();
    let mut executor = CommandExecutor::new(pins, hw::PIN_LIMIT);
    let mut session = LineSession::new();
    let mut response: String<RESPONSE_CAPACITY> = String::new();

    loop {
        if !status::console_attached() {
            session.reset();
        }

        let frame = rx_queue.receive().await;
        for &byte in &frame {
            response.clear();
            match session.ingest(byte) {
                Ok(Ingest::Pending) => continue,
                Ok(Ingest::Complete) => match session.line() {
                    Ok(line) => respond(&mut executor, &mut handle, line, &mut response).await,
                    Err(err) => render_failure(&mut response, &err),
                },
                Err(err) => render_failure(&mut response, &err),
            }
            send(&response).await;
        }
    }
}

async fn respond(
    executor: &mut CommandExecutor<FirmwarePins>,
    handle: &mut Handle,
    line: &str,
    response: &mut String<RESPONSE_CAPACITY>,
) {
    let result: CommandResult<'_, BankError, DEFAULT_CHANNEL_CAPACITY> =
        match grammar::parse(line) {
            Ok(command) if command.requires_quiesce() => {
                let mut paused = pause(handle).await;
                executor.execute_quiesced(&mut paused, command)
            }
            Ok(command) => executor.execute_unquiesced(handle, command),
            Err(err) => Err(CommandError::Parse(err)),
        };

    let written = match &result {
        Ok(outcome) => {
            if let Some(event) = ConfigEvent::from_outcome(outcome) {
                telemetry::record(event);
            }
            write_outcome(response, outcome)
        }
        Err(error) => {
            telemetry::log_rejected(error);
            write_error(response, error)
        }
    };

    if written.is_err() {
        defmt::warn!("console: response truncated at {} bytes", response.len());
    }
}

/// Parks the control loop without blocking this executor.
async fn pause(handle: &mut Handle) -> Paused<'_, 'static, DEFAULT_CHANNEL_CAPACITY> {
    let mut pending = handle.request_pause();
    loop {
        match pending.try_complete() {
            Ok(paused) => return paused,
            Err(still_pending) => {
                pending = still_pending;
                Timer::after_micros(PAUSE_POLL_US).await;
            }
        }
    }
}

fn render_failure<E: core::fmt::Display>(response: &mut String<RESPONSE_CAPACITY>, error: &E) {
    telemetry::log_rejected(error);
    let _ = write!(response, "ERR {error}");
}

async fn send(text: &str) {
    let tx_queue = CONSOLE_TX_QUEUE.sender();
    for frame in FrameEncoder::new(text).chain(FrameEncoder::new("\n")) {
        if status::console_attached() {
            tx_queue.send(frame).await;
        } else {
            let dropped = status::record_dropped_frame();
            defmt::debug!("console: host detached, {} frames dropped", dropped);
        }
    }
}
