//! Slash-command parsing for the prompt.

use thiserror::Error;

use crate::{state::AppState, store::Action};

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Plain text: send as a chat message
    Chat(String),
    Name(String),
    Join(String),
    Create,
    Leave,
    /// Toggle the star of a room (the current one when no id is given)
    Star(Option<String>),
    Rooms,
    Play,
    Pause,
    Next,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '/{0}' (try /help)")]
    UnknownCommand(String),

    #[error("/{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
}

pub const HELP: &str = "\
Commands:
  /name <name>   set your display name
  /join <id>     join a room
  /create        create a new room
  /leave         leave the current room
  /star [id]     star or unstar a room
  /rooms         list known rooms
  /play          resume playback
  /pause         pause playback
  /next          load the next item
  /quit          exit
Anything else is sent as a chat message.";

/// Parse a trimmed, non-empty input line
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat(line.to_string()));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, Some(argument.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };

    let required = |command: &'static str, argument_name: &'static str| {
        argument
            .map(str::to_string)
            .ok_or(ParseError::MissingArgument {
                command,
                argument: argument_name,
            })
    };

    match name {
        "name" => Ok(Command::Name(required("name", "a name")?)),
        "join" => Ok(Command::Join(required("join", "a room id")?)),
        "create" => Ok(Command::Create),
        "leave" => Ok(Command::Leave),
        "star" => Ok(Command::Star(argument.map(str::to_string))),
        "rooms" => Ok(Command::Rooms),
        "play" => Ok(Command::Play),
        "pause" => Ok(Command::Pause),
        "next" => Ok(Command::Next),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

impl Command {
    /// The store action for this command, `None` for purely local commands
    pub fn into_action(self, state: &AppState) -> Option<Action> {
        match self {
            Self::Chat(text) => Some(Action::RoomMessageSend(text)),
            Self::Name(name) => Some(Action::ClientName(name)),
            Self::Join(room_id) => Some(Action::ClientJoin(room_id)),
            Self::Create => Some(Action::RoomCreate),
            Self::Leave => Some(Action::ClientLeave),
            Self::Star(room_id) => room_id
                .or_else(|| state.current_room_id().map(str::to_string))
                .map(Action::KnownRoomsStarToggle),
            Self::Play => Some(Action::MediaPlayResume),
            Self::Pause => Some(Action::MediaPauseNow),
            Self::Next => Some(Action::MediaNext),
            Self::Rooms | Self::Help | Self::Quit => None,
        }
    }
}
