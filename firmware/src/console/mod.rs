//! Operator console plumbing for the USB CDC port.
//!
//! Bytes arrive from the USB task as [`ConsoleFrame`]s, are assembled into
//! lines by [`LineSession`], and responses travel back through
//! [`FrameEncoder`], which turns `\n` into `\r\n` and splits text into
//! packet-sized frames.

use core::str;

#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

/// Maximum number of bytes accepted on a single console line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Bytes carried by one USB full-speed bulk packet.
pub const FRAME_LEN: usize = 64;

/// Frames buffered in each direction.
pub const QUEUE_DEPTH: usize = 8;

pub type ConsoleFrame = Vec<u8, FRAME_LEN>;

#[cfg(target_os = "none")]
type ConsoleMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

/// Frame queue between the USB task and the console task.
pub type ConsoleQueue = Channel<ConsoleMutex, ConsoleFrame, QUEUE_DEPTH>;

/// Errors surfaced while assembling a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Input exceeded [`MAX_LINE_LEN`]; the rest of the line is discarded.
    LineOverflow,
    /// The assembled line is not UTF-8.
    InvalidUtf8,
}

impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::LineOverflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
            SessionError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Result of feeding one byte to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ingest {
    Pending,
    /// A line is ready in [`LineSession::line`] until the next byte arrives.
    Complete,
}

/// Line assembly state for the console.
#[derive(Debug, Default)]
pub struct LineSession {
    buffer: Vec<u8, MAX_LINE_LEN>,
    complete: bool,
    discarding: bool,
}

impl LineSession {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            complete: false,
            discarding: false,
        }
    }

    /// Drops any partial line, e.g. after the host disconnects.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.complete = false;
        self.discarding = false;
    }

    /// Feeds a single byte. `\r` or `\n` completes a non-empty line.
    pub fn ingest(&mut self, byte: u8) -> Result<Ingest, SessionError> {
        if self.complete {
            self.buffer.clear();
            self.complete = false;
        }

        match byte {
            b'\r' | b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    self.buffer.clear();
                    return Ok(Ingest::Pending);
                }
                if self.buffer.is_empty() {
                    return Ok(Ingest::Pending);
                }
                self.complete = true;
                Ok(Ingest::Complete)
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(Ingest::Pending)
            }
            _ if self.discarding => Ok(Ingest::Pending),
            value => {
                if self.buffer.push(value).is_err() {
                    self.discarding = true;
                    self.buffer.clear();
                    return Err(SessionError::LineOverflow);
                }
                Ok(Ingest::Pending)
            }
        }
    }

    /// The most recently completed line.
    pub fn line(&self) -> Result<&str, SessionError> {
        str::from_utf8(self.buffer.as_slice()).map_err(|_| SessionError::InvalidUtf8)
    }
}

/// Splits response text into frames, translating `\n` to `\r\n`.
#[derive(Debug)]
pub struct FrameEncoder<'a> {
    bytes: &'a [u8],
    position: usize,
    pending_newline: bool,
}

impl<'a> FrameEncoder<'a> {
    pub const fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            position: 0,
            pending_newline: false,
        }
    }
}

impl Iterator for FrameEncoder<'_> {
    type Item = ConsoleFrame;

    fn next(&mut self) -> Option<ConsoleFrame> {
        let mut frame = ConsoleFrame::new();
        while !frame.is_full() {
            if self.pending_newline {
                self.pending_newline = false;
                let _ = frame.push(b'\n');
                continue;
            }

            let Some(&byte) = self.bytes.get(self.position) else {
                break;
            };
            self.position += 1;

            if byte == b'\n' {
                let _ = frame.push(b'\r');
                self.pending_newline = true;
            } else {
                let _ = frame.push(byte);
            }
        }

        if frame.is_empty() { None } else { Some(frame) }
    }
}
