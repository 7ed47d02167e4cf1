//! Console grammar.
//!
//! A line is `<keyword> [argument ...]` separated by ASCII whitespace. The
//! keyword is resolved through the [`catalog`](super::catalog); arguments are
//! decoded per command.

use core::fmt;
use core::num::IntErrorKind;

use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{opt, preceded};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::channel::EdgeMode;
use crate::pins::PinId;

use super::catalog::{self, CommandTag};

/// Structured commands produced by the parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Setup { sense_pin: PinId },
    Add { pin: PinId, mode: EdgeMode },
    Remove { pin: PinId },
    Level { pin: PinId, command: i32 },
    List,
    Freq,
    Help(Option<&'a str>),
}

impl Command<'_> {
    /// `true` for commands that must run with the control loop parked.
    #[must_use]
    pub const fn requires_quiesce(&self) -> bool {
        matches!(
            self,
            Command::Setup { .. } | Command::Add { .. } | Command::Remove { .. } | Command::List
        )
    }
}

/// Reasons a line was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Empty,
    UnknownCommand(&'a str),
    MissingArgument(&'static str),
    InvalidInteger(&'a str),
    UnknownMode(&'a str),
    UnexpectedInput(&'a str),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => f.write_str("empty command"),
            ParseError::UnknownCommand(word) => write!(f, "unknown command `{word}`"),
            ParseError::MissingArgument(expected) => write!(f, "missing {expected}"),
            ParseError::InvalidInteger(token) => write!(f, "invalid integer `{token}`"),
            ParseError::UnknownMode(token) => {
                write!(f, "unknown edge mode `{token}` (expected leading|trailing)")
            }
            ParseError::UnexpectedInput(rest) => write!(f, "unexpected input `{rest}`"),
        }
    }
}

/// Parses one console line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let mut input = line;
    let Some(word) = token(&mut input) else {
        return Err(ParseError::Empty);
    };
    let spec = catalog::find(word).ok_or(ParseError::UnknownCommand(word))?;

    let command = match spec.tag {
        CommandTag::Setup => Command::Setup {
            sense_pin: pin_argument(&mut input, "sense pin")?,
        },
        CommandTag::Add => {
            let pin = pin_argument(&mut input, "pin")?;
            let mode = match token(&mut input) {
                Some(word) => EdgeMode::from_keyword(word).ok_or(ParseError::UnknownMode(word))?,
                None => EdgeMode::default(),
            };
            Command::Add { pin, mode }
        }
        CommandTag::Remove => Command::Remove {
            pin: pin_argument(&mut input, "pin")?,
        },
        CommandTag::Level => {
            let pin = pin_argument(&mut input, "pin")?;
            let raw = token(&mut input).ok_or(ParseError::MissingArgument("level"))?;
            let command = level_argument(raw).ok_or(ParseError::InvalidInteger(raw))?;
            Command::Level { pin, command }
        }
        CommandTag::List => Command::List,
        CommandTag::Freq => Command::Freq,
        CommandTag::Help => Command::Help(token(&mut input)),
    };

    let rest = input.trim();
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::UnexpectedInput(rest))
    }
}

/// Next whitespace-delimited token, or `None` at end of line.
fn token<'a>(input: &mut &'a str) -> Option<&'a str> {
    word.parse_next(input).ok().flatten()
}

fn word<'a>(input: &mut &'a str) -> Result<Option<&'a str>, ContextError> {
    preceded(
        multispace0,
        opt(take_while(1.., |c: char| !c.is_ascii_whitespace())),
    )
    .parse_next(input)
}

// Out-of-range numbers saturate; the dimmer clamps them to 0..=1000 later.
fn level_argument(raw: &str) -> Option<i32> {
    match raw.parse::<i32>() {
        Ok(command) => Some(command),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i32::MAX),
            IntErrorKind::NegOverflow => Some(i32::MIN),
            _ => None,
        },
    }
}

fn pin_argument<'a>(
    input: &mut &'a str,
    expected: &'static str,
) -> Result<PinId, ParseError<'a>> {
    let raw = separated_token(input).ok_or(ParseError::MissingArgument(expected))?;
    raw.parse::<u8>()
        .map(PinId::new)
        .map_err(|_| ParseError::InvalidInteger(raw))
}

// Arguments must be separated from the keyword, so `add5` is not `add 5`.
fn separated_token<'a>(input: &mut &'a str) -> Option<&'a str> {
    let mut separated =
        preceded(multispace1, take_while(1.., |c: char| !c.is_ascii_whitespace()));
    let parsed: Result<&'a str, ContextError> = separated.parse_next(input);
    parsed.ok()
}
