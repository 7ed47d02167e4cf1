mod board;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{Session, SessionOptions};

const DEFAULT_MAINS_HZ: u32 = 50;

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: dimmer-emulator [--mains <hz>] [--transcript <path>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "AC Dimmer Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<SessionOptions, String> {
    let mut options = SessionOptions {
        mains_hz: DEFAULT_MAINS_HZ,
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--mains" => {
                let raw = value()?;
                options.mains_hz = if raw.eq_ignore_ascii_case("off") {
                    0
                } else {
                    raw.parse()
                        .map_err(|_| format!("Invalid mains frequency `{raw}`"))?
                };
            }
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    Ok(options)
}
