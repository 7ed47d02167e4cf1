use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant as HostInstant};

use dimmer_core::console::commands::CommandExecutor;
use dimmer_core::console::status::{write_error, write_outcome};
use dimmer_core::{Dimmer, DimmerHandle};

use crate::board::{Board, PIN_LIMIT, SimPins};

/// Highest mains frequency the simulated source accepts.
const MAX_MAINS_HZ: u32 = 400;

pub const EMULATOR_TOPICS: &[(&str, &str)] = &[
    (
        "mains",
        "mains [<hz>|off]              - show or change the simulated mains source",
    ),
    (
        "pins",
        "pins                          - show every configured simulated pin",
    ),
    (
        "exit",
        "exit                          - close the session",
    ),
];

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub mains_hz: u32,
    pub transcript: Option<PathBuf>,
}

pub struct Session {
    board: Arc<Board>,
    handle: DimmerHandle<'static>,
    executor: CommandExecutor<SimPins>,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
    stop: Arc<AtomicBool>,
    control_thread: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        let board = Arc::new(Board::new(options.mains_hz));
        let dimmer: &'static mut Dimmer = Box::leak(Box::default());
        let (handle, mut control) = dimmer.split();

        let stop = Arc::new(AtomicBool::new(false));
        let control_thread = {
            let stop = Arc::clone(&stop);
            let mut io = SimPins::new(Arc::clone(&board));
            thread::Builder::new()
                .name("control-loop".into())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        control.poll(&mut io);
                        thread::yield_now();
                    }
                })?
        };

        Ok(Self {
            executor: CommandExecutor::new(SimPins::new(Arc::clone(&board)), PIN_LIMIT),
            board,
            handle,
            transcript,
            started_at: HostInstant::now(),
            stop,
            control_thread: Some(control_thread),
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(elapsed, TranscriptRole::Host, trimmed)?;
        }

        let mut words = trimmed.split_whitespace();
        let keyword = words.next().unwrap_or_default();
        let argument = words.next();
        let single_argument = words.next().is_none();
        let lines = if keyword.eq_ignore_ascii_case("mains") && single_argument {
            self.handle_mains(argument)
        } else if keyword.eq_ignore_ascii_case("pins") && argument.is_none() {
            self.handle_pins()
        } else if keyword.eq_ignore_ascii_case("help") && single_argument {
            match argument {
                None => {
                    let mut lines = self.execute_core(trimmed);
                    lines.push("Emulator commands:".to_string());
                    lines.extend(EMULATOR_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
                    lines
                }
                Some(topic) => match emulator_topic(topic) {
                    Some(detail) => vec![detail.to_string()],
                    None => self.execute_core(trimmed),
                },
            }
        } else {
            self.execute_core(trimmed)
        };

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    /// Most recent frequency estimate published by the control loop.
    #[must_use]
    pub fn mains_frequency(&self) -> u32 {
        self.handle.mains_frequency()
    }

    fn execute_core(&mut self, line: &str) -> Vec<String> {
        let mut response = String::new();
        let written = match self.executor.execute(&mut self.handle, line) {
            Ok(outcome) => write_outcome(&mut response, &outcome),
            Err(error) => write_error(&mut response, &error),
        };
        if written.is_err() {
            response = "ERR response could not be rendered".to_string();
        }
        response.lines().map(str::to_string).collect()
    }

    fn handle_mains(&mut self, argument: Option<&str>) -> Vec<String> {
        let message = match argument {
            None => match self.board.mains_hz() {
                0 => "mains source off".to_string(),
                hz => format!("mains source hz={hz}"),
            },
            Some(value) if value.eq_ignore_ascii_case("off") => {
                self.board.set_mains(0);
                "OK mains off".to_string()
            }
            Some(value) => match value.parse::<u32>() {
                Ok(hz) if (1..=MAX_MAINS_HZ).contains(&hz) => {
                    self.board.set_mains(hz);
                    format!("OK mains hz={hz}")
                }
                _ => format!("ERR invalid mains frequency `{value}` (expected 1-{MAX_MAINS_HZ} or off)"),
            },
        };
        vec![message]
    }

    fn handle_pins(&self) -> Vec<String> {
        let states = self.board.pin_states();
        if states.is_empty() {
            return vec!["no pins configured".to_string()];
        }
        states.iter().map(ToString::to_string).collect()
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(elapsed, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.control_thread.take() {
            let _ = thread.join();
        }
    }
}

fn emulator_topic(topic: &str) -> Option<&'static str> {
    EMULATOR_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, detail)| *detail)
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# AC dimmer emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        let mut entry = String::new();
        let _ = write!(entry, "[+{:>6} ms] {} {line}", elapsed.as_millis(), role.prefix());
        writeln!(self.writer, "{entry}")?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
