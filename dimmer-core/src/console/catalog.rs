//! Command catalog: one entry per console keyword.
//!
//! The parser resolves keywords here and `help` renders the same entries, so
//! usage text cannot drift from what the grammar accepts.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Setup,
    Add,
    Remove,
    Level,
    List,
    Freq,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub usage: &'static str,
    pub summary: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "setup",
        tag: CommandTag::Setup,
        usage: "setup <sense-pin>",
        summary: "configure the zero-crossing input and restart detection",
    },
    CommandSpec {
        name: "add",
        tag: CommandTag::Add,
        usage: "add <pin> [leading|trailing]",
        summary: "dim a pin (trailing edge by default), starting off",
    },
    CommandSpec {
        name: "remove",
        tag: CommandTag::Remove,
        usage: "remove <pin>",
        summary: "stop dimming a pin",
    },
    CommandSpec {
        name: "level",
        tag: CommandTag::Level,
        usage: "level <pin> <0-1000>",
        summary: "set brightness; out-of-range values are clamped",
    },
    CommandSpec {
        name: "list",
        tag: CommandTag::List,
        usage: "list",
        summary: "show mains timing and every dimmed pin",
    },
    CommandSpec {
        name: "freq",
        tag: CommandTag::Freq,
        usage: "freq",
        summary: "show the measured mains frequency (0 = no mains)",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        usage: "help [command]",
        summary: "show help for a command",
    },
];

/// Case-insensitive keyword lookup.
#[must_use]
pub fn find(keyword: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(keyword))
}
