//! Interactive commands read from stdin

use duckrun_core::{ItemKind, WorldItemId};
use glam::Vec3;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Host,
    Join { address: String, port: Option<String> },
    Start,
    Leave,
    /// Pick up a specific item, or the nearest one in reach
    Pickup(Option<WorldItemId>),
    Drop,
    Select(usize),
    Scroll(f32),
    Swap(usize, usize),
    Place(ItemKind, Vec3),
    Move(Vec3),
    Face(Vec3),
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

fn number<T: std::str::FromStr>(word: Option<&str>, usage: &'static str) -> Result<T, ParseError> {
    word.and_then(|w| w.parse().ok())
        .ok_or(ParseError::Usage(usage))
}

fn vector<'a>(words: &mut impl Iterator<Item = &'a str>, usage: &'static str) -> Result<Vec3, ParseError> {
    let x = number(words.next(), usage)?;
    let y = number(words.next(), usage)?;
    let z = number(words.next(), usage)?;
    let v = Vec3::new(x, y, z);
    if !v.is_finite() {
        return Err(ParseError::Usage(usage));
    }
    Ok(v)
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
        let mut words = line.split_whitespace();
        let head = words.next()?;
        Some(Self::parse_words(head, &mut words))
    }

    fn parse_words<'a>(
        head: &str,
        words: &mut impl Iterator<Item = &'a str>,
    ) -> Result<Command, ParseError> {
        let command = match head.to_ascii_lowercase().as_str() {
            "status" | "s" => Command::Status,
            "host" => Command::Host,
            "join" => {
                let address = words
                    .next()
                    .ok_or(ParseError::Usage("join <address> [port]"))?;
                Command::Join {
                    address: address.to_string(),
                    port: words.next().map(str::to_string),
                }
            }
            "start" => Command::Start,
            "leave" => Command::Leave,
            "pickup" | "e" => match words.next() {
                Some(id) => {
                    let id = id.trim_start_matches('#');
                    Command::Pickup(Some(WorldItemId(number(Some(id), "pickup [id]")?)))
                }
                None => Command::Pickup(None),
            },
            "drop" | "q" => Command::Drop,
            "select" => {
                let n: usize = number(words.next(), "select <1..>")?;
                if n == 0 {
                    return Err(ParseError::Usage("select <1..>"));
                }
                Command::Select(n - 1)
            }
            "scroll" => Command::Scroll(number(words.next(), "scroll <delta>")?),
            "swap" => {
                let usage = "swap <slot> <slot>";
                Command::Swap(number(words.next(), usage)?, number(words.next(), usage)?)
            }
            "place" => {
                let usage = "place <key|duck> x y z";
                let kind = words
                    .next()
                    .and_then(ItemKind::parse)
                    .ok_or(ParseError::Usage(usage))?;
                Command::Place(kind, vector(words, usage)?)
            }
            "move" => Command::Move(vector(words, "move x y z")?),
            "face" => Command::Face(vector(words, "face x y z")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

pub const HELP: &str = "\
commands:
  status                 show session, scene and inventory
  host                   host a LAN game
  join <address> [port]  join a LAN game
  start                  (host, lobby) start the game
  leave                  leave the session
  pickup [id]            pick up an item (nearest in reach without id)
  drop                   drop the item in hand
  select <n>             select hotbar slot n
  scroll <delta>         cycle the hotbar selection
  swap <a> <b>           swap two inventory slots
  place <kind> x y z     (server) place an item
  move x y z             move the player
  face x y z             turn the player
  quit                   leave and exit";
