//! Line-oriented terminal front-end: command parsing and view rendering.

use std::fmt::Write as _;

use crate::model::{CardIndex, ConnectionStatus};
use crate::orchestrator::{CardFace, ClientView, Intent};

pub const HELP: &str = "commands: pick N | clear | name NAME | call | reset | cards | help | quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Cards,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a card number")]
    InvalidCard(String),
}

/// Parse one line of user input.
///
/// # Errors
///
/// Returns a [`ParseError`] for blank lines, unknown commands and bad
/// arguments.
pub fn parse_line(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match word.to_ascii_lowercase().as_str() {
        "" => Err(ParseError::Empty),
        "pick" | "p" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("pick"));
            }
            let card = rest
                .parse::<CardIndex>()
                .map_err(|_| ParseError::InvalidCard(rest.to_owned()))?;
            Ok(Command::Intent(Intent::SelectCard(card)))
        }
        "clear" => Ok(Command::Intent(Intent::ClearCard)),
        "name" => {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument("name"));
            }
            Ok(Command::Intent(Intent::SetName(rest.to_owned())))
        }
        "call" | "resume" => Ok(Command::Intent(Intent::ToggleCall)),
        "reset" => Ok(Command::Intent(Intent::Reset)),
        "cards" => Ok(Command::Cards),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_owned())),
    }
}

/// Numbered card list, e.g. `[0] 0  [1] 1  [2] 2`.
#[must_use]
pub fn render_cards(cards: &[String]) -> String {
    cards
        .iter()
        .enumerate()
        .map(|(i, label)| format!("[{i}] {label}"))
        .collect::<Vec<_>>()
        .join("  ")
}

#[must_use]
pub fn render_view(view: &ClientView) -> String {
    let ClientView::Ready(ready) = view else {
        return "loading...".to_owned();
    };

    let mut out = String::new();
    let round = if ready.is_calling { "called" } else { "open" };
    let _ = write!(out, "round {round}");
    if ready.is_admin {
        out.push_str(" (admin)");
    }
    match ready.connection {
        ConnectionStatus::Connected => {}
        ConnectionStatus::Connecting => out.push_str(" [connecting]"),
        ConnectionStatus::Disconnected => out.push_str(" [offline, showing last known state]"),
    }
    out.push('\n');

    for player in &ready.players {
        let marker = if player.is_me { '*' } else { ' ' };
        let card = match &player.card {
            CardFace::Undecided => "...",
            CardFace::Hidden => "[?]",
            CardFace::Shown(label) => label.as_str(),
        };
        let _ = writeln!(out, "{marker} {:<16} {card}", player.name);
    }

    if !ready.is_calling {
        let _ = write!(out, "{}, pick a card: {}", ready.me.name, render_cards(&ready.cards));
    }
    out.trim_end().to_owned()
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
