//! Line protocol between an engine and whatever drives it.
//!
//! ## Commands (to the engine)
//!
//! - `move <move>` - a move was played
//! - `go` - search with the configured budget and report
//! - `expand <n>` - run `n` more expansions and report
//! - `new` - start a new game
//! - `quit` - exit
//!
//! ## Events (from the engine)
//!
//! - `best-move move=<move>; terminal=<true|false>; score=<int>`
//! - `info key=value; key=value; ...`
//! - `error <message>`
//!
//! Scores above +1000 favour the first player, below -1000 the second.

use std::fmt;
use std::str::FromStr;

use crate::connect6::Move;
use crate::error::ProtocolParseError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Move(Move),
    Go,
    Expand(usize),
    New,
    Quit,
}

impl FromStr for Command {
    type Err = ProtocolParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let text = line.trim();
        let (name, arg) = match text.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (text, None),
        };
        match (name, arg) {
            ("move", Some(arg)) => arg
                .parse()
                .map(Command::Move)
                .map_err(|e| ProtocolParseError::new(text, e.to_string())),
            ("expand", Some(arg)) => arg
                .parse()
                .map(Command::Expand)
                .map_err(|_| ProtocolParseError::new(text, "expansion count must be a number")),
            ("move" | "expand", None) => Err(ProtocolParseError::new(text, "missing argument")),
            ("go", None) => Ok(Command::Go),
            ("new", None) => Ok(Command::New),
            ("quit", None) => Ok(Command::Quit),
            ("go" | "new" | "quit", Some(_)) => Err(ProtocolParseError::new(text, "unexpected argument")),
            _ => Err(ProtocolParseError::new(text, "unknown command")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Move(mv) => write!(f, "move {mv}"),
            Command::Go => f.write_str("go"),
            Command::Expand(n) => write!(f, "expand {n}"),
            Command::New => f.write_str("new"),
            Command::Quit => f.write_str("quit"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BestMove {
    pub mv: Option<Move>,
    pub terminal: bool,
    pub score: i32,
}

/// Diagnostic key/value pairs. Keeps insertion order; setting an existing
/// key replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Info {
    fields: Vec<(String, String)>,
}

impl Info {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    BestMove(BestMove),
    Info(Info),
    Error(String),
}

/// Split `key=value; key=value` parameters.
fn params<'a>(line: &str, text: &'a str) -> Result<Vec<(&'a str, &'a str)>, ProtocolParseError> {
    text.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .ok_or_else(|| ProtocolParseError::new(line, format!("missing '=' in {p:?}")))
        })
        .collect()
}

impl FromStr for Event {
    type Err = ProtocolParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let text = line.trim();
        let Some((name, rest)) = text.split_once(char::is_whitespace) else {
            return match text {
                "info" => Ok(Event::Info(Info::new())),
                _ => Err(ProtocolParseError::new(text, "missing parameters")),
            };
        };

        match name {
            "best-move" => {
                let mut event = BestMove::default();
                for (key, value) in params(text, rest)? {
                    match key {
                        "move" => {
                            let mv = value
                                .parse()
                                .map_err(|e: crate::error::MoveFormatError| ProtocolParseError::new(text, e.to_string()))?;
                            event.mv = Some(mv);
                        }
                        "terminal" => {
                            event.terminal = match value {
                                "true" => true,
                                "false" => false,
                                _ => return Err(ProtocolParseError::new(text, "terminal must be true or false")),
                            };
                        }
                        "score" => {
                            event.score = value
                                .parse()
                                .map_err(|_| ProtocolParseError::new(text, format!("invalid score {value:?}")))?;
                        }
                        _ => return Err(ProtocolParseError::new(text, format!("unknown best-move field {key:?}"))),
                    }
                }
                Ok(Event::BestMove(event))
            }
            "info" => {
                let mut info = Info::new();
                for (key, value) in params(text, rest)? {
                    info.set(key, value);
                }
                Ok(Event::Info(info))
            }
            "error" => Ok(Event::Error(rest.trim().to_string())),
            _ => Err(ProtocolParseError::new(text, "unknown event")),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BestMove(best) => {
                f.write_str("best-move ")?;
                if let Some(mv) = best.mv {
                    write!(f, "move={mv}; ")?;
                }
                write!(f, "terminal={}; score={}", best.terminal, best.score)
            }
            Event::Info(info) => {
                f.write_str("info")?;
                for (i, (key, value)) in info.iter().enumerate() {
                    let sep = if i == 0 { " " } else { "; " };
                    write!(f, "{sep}{key}={value}")?;
                }
                Ok(())
            }
            Event::Error(message) => write!(f, "error {message}"),
        }
    }
}
