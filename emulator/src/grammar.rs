//! Command grammar for the emulator console.
//!
//! One command per line, whitespace separated, parsed with `winnow`:
//!
//! ```text
//! attach <handle> <pin> [<min-us> <max-us> [<value>]]
//! detach <handle>
//! write <handle> <value>
//! write-us <handle> <micros>
//! read <handle>
//! status
//! run <millis>
//! help
//! ```

use winnow::ascii::{dec_int, dec_uint, space0, space1};
use winnow::combinator::{dispatch, empty, fail, opt, preceded};
use winnow::prelude::*;
use winnow::token::take_while;

/// Parsed console command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    Attach {
        handle: usize,
        pin: u8,
        bounds: Option<(u16, u16)>,
        value: Option<i32>,
    },
    Detach {
        handle: usize,
    },
    Write {
        handle: usize,
        value: i32,
    },
    WriteMicroseconds {
        handle: usize,
        micros: i32,
    },
    Read {
        handle: usize,
    },
    Status,
    Run {
        millis: u32,
    },
    Help,
}

/// Parses a full line into a command.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    command.parse(line).map_err(|err| {
        let offset = err.offset();
        if offset >= line.len() {
            "unexpected end of input".to_string()
        } else {
            format!("unexpected input at column {}: `{}`", offset + 1, &line[offset..])
        }
    })
}

fn command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    space0.parse_next(input)?;
    let parsed = dispatch! {keyword;
        "attach" => attach_args,
        "detach" => handle_arg.map(|handle| ConsoleCommand::Detach { handle }),
        "write" => (handle_arg, value_arg)
            .map(|(handle, value)| ConsoleCommand::Write { handle, value }),
        "write-us" => (handle_arg, value_arg)
            .map(|(handle, micros)| ConsoleCommand::WriteMicroseconds { handle, micros }),
        "read" => handle_arg.map(|handle| ConsoleCommand::Read { handle }),
        "status" => empty.value(ConsoleCommand::Status),
        "run" => preceded(space1, dec_uint).map(|millis| ConsoleCommand::Run { millis }),
        "help" => empty.value(ConsoleCommand::Help),
        _ => fail,
    }
    .parse_next(input)?;
    space0.parse_next(input)?;
    Ok(parsed)
}

fn keyword<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-').parse_next(input)
}

fn attach_args(input: &mut &str) -> ModalResult<ConsoleCommand> {
    let handle = handle_arg.parse_next(input)?;
    let pin = preceded(space1, dec_uint::<_, u8, _>).parse_next(input)?;
    let bounds = opt((
        preceded(space1, dec_uint::<_, u16, _>),
        preceded(space1, dec_uint::<_, u16, _>),
    ))
    .parse_next(input)?;
    let value = match bounds {
        Some(_) => opt(value_arg).parse_next(input)?,
        None => None,
    };

    Ok(ConsoleCommand::Attach {
        handle,
        pin,
        bounds,
        value,
    })
}

fn handle_arg(input: &mut &str) -> ModalResult<usize> {
    preceded(space1, dec_uint).parse_next(input)
}

fn value_arg(input: &mut &str) -> ModalResult<i32> {
    preceded(space1, dec_int).parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attach_variants() {
        assert_eq!(
            parse_command("attach 0 3"),
            Ok(ConsoleCommand::Attach {
                handle: 0,
                pin: 3,
                bounds: None,
                value: None,
            })
        );
        assert_eq!(
            parse_command("  attach 1 4 544 2400  "),
            Ok(ConsoleCommand::Attach {
                handle: 1,
                pin: 4,
                bounds: Some((544, 2_400)),
                value: None,
            })
        );
        assert_eq!(
            parse_command("attach 2 5 1000 2000 -10"),
            Ok(ConsoleCommand::Attach {
                handle: 2,
                pin: 5,
                bounds: Some((1_000, 2_000)),
                value: Some(-10),
            })
        );
    }

    #[test]
    fn distinguishes_write_from_write_us() {
        assert_eq!(
            parse_command("write 0 90"),
            Ok(ConsoleCommand::Write {
                handle: 0,
                value: 90
            })
        );
        assert_eq!(
            parse_command("write-us 0 2500"),
            Ok(ConsoleCommand::WriteMicroseconds {
                handle: 0,
                micros: 2_500
            })
        );
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse_command("status"), Ok(ConsoleCommand::Status));
        assert_eq!(parse_command("help"), Ok(ConsoleCommand::Help));
        assert_eq!(
            parse_command("run 100"),
            Ok(ConsoleCommand::Run { millis: 100 })
        );
        assert_eq!(
            parse_command("read 4"),
            Ok(ConsoleCommand::Read { handle: 4 })
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_command("").is_err());
        assert!(parse_command("spin 0").is_err());
        assert!(parse_command("attach 0").is_err());
        assert!(parse_command("attach 0 3 1000").is_err());
        assert!(parse_command("write 0 ninety").is_err());
        assert!(parse_command("run -5").is_err());
    }
}
