//! Line-oriented command grammar read from standard input.

use std::{error::Error, fmt};

use ghost_defence_core::{DefenderKind, GridLocation, UnknownDefenderKind};

/// Usage summary printed by `help`.
pub(crate) const HELP: &str = "\
commands:
  buy <basic|slowing|splash> <row> <column>
  sell <row> <column>
  upgrade <row> <column>
  wave        start the next wave
  wait        block until the running wave ends
  cancel      abandon the running wave
  state       print the current snapshot
  map         draw the grid (B/S/P defenders, g mobiles, = road)
  route       list the route from entry to exit
  help
  quit";

/// One parsed shell line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    Buy {
        kind: DefenderKind,
        location: GridLocation,
    },
    Sell {
        location: GridLocation,
    },
    Upgrade {
        location: GridLocation,
    },
    StartWave,
    Cancel,
    Wait,
    State,
    Map,
    Route,
    Help,
    Quit,
}

/// Errors produced while parsing a shell line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ShellParseError {
    /// The first word is not a known command.
    UnknownCommand(String),
    /// A required argument was not supplied.
    MissingArgument(&'static str),
    /// A row or column was not a non-negative integer.
    InvalidCoordinate(String),
    /// The defender kind name was not recognised.
    UnknownKind(UnknownDefenderKind),
    /// Extra words followed a complete command.
    TrailingInput(String),
}

impl fmt::Display for ShellParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(word) => {
                write!(f, "unknown command '{word}', try 'help'")
            }
            Self::MissingArgument(name) => write!(f, "missing {name}"),
            Self::InvalidCoordinate(value) => write!(f, "'{value}' is not a valid coordinate"),
            Self::UnknownKind(error) => write!(f, "{error}"),
            Self::TrailingInput(rest) => write!(f, "unexpected input '{rest}'"),
        }
    }
}

impl Error for ShellParseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownKind(error) => Some(error),
            _ => None,
        }
    }
}

/// Parses a single line. Blank lines and `#` comments yield `None`.
pub(crate) fn parse_line(line: &str) -> Result<Option<ShellCommand>, ShellParseError> {
    let line = line.split('#').next().unwrap_or_default();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "buy" => {
            let kind = words
                .next()
                .ok_or(ShellParseError::MissingArgument("defender kind"))?
                .parse::<DefenderKind>()
                .map_err(ShellParseError::UnknownKind)?;
            let location = parse_location(&mut words)?;
            ShellCommand::Buy { kind, location }
        }
        "sell" => ShellCommand::Sell {
            location: parse_location(&mut words)?,
        },
        "upgrade" => ShellCommand::Upgrade {
            location: parse_location(&mut words)?,
        },
        "wave" | "start" => ShellCommand::StartWave,
        "cancel" => ShellCommand::Cancel,
        "wait" => ShellCommand::Wait,
        "state" => ShellCommand::State,
        "map" => ShellCommand::Map,
        "route" => ShellCommand::Route,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => return Err(ShellParseError::UnknownCommand(other.to_owned())),
    };

    let rest: Vec<&str> = words.collect();
    if !rest.is_empty() {
        return Err(ShellParseError::TrailingInput(rest.join(" ")));
    }
    Ok(Some(command))
}

fn parse_location<'a, I>(words: &mut I) -> Result<GridLocation, ShellParseError>
where
    I: Iterator<Item = &'a str>,
{
    let row = parse_coordinate(words.next(), "row")?;
    let column = parse_coordinate(words.next(), "column")?;
    Ok(GridLocation::new(row, column))
}

fn parse_coordinate(word: Option<&str>, name: &'static str) -> Result<u32, ShellParseError> {
    let word = word.ok_or(ShellParseError::MissingArgument(name))?;
    word.parse::<u32>()
        .map_err(|_| ShellParseError::InvalidCoordinate(word.to_owned()))
}
