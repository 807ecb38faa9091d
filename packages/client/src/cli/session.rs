//! Interactive terminal session.

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    error::ClientError,
    store::{Action, StoreHandle},
};

use super::{
    commands::{Command, HELP, parse_command},
    formatter::MessageFormatter,
    ui::{PROMPT, redisplay_prompt},
    view::ScreenTracker,
};

/// Run the prompt until the user quits or the dispatcher stops.
///
/// Joins `room_id` if given, otherwise creates a new room.
pub async fn run_session(handle: StoreHandle, room_id: Option<String>) -> Result<(), ClientError> {
    let entry = match room_id {
        Some(room_id) => Action::ClientJoin(room_id),
        None => Action::RoomCreate,
    };
    handle.dispatch(entry).await?;

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                tracing::error!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    let mut state = handle.subscribe();
    let mut screen = ScreenTracker::default();

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match command {
                    Command::Quit => break,
                    Command::Help => println!("{}", HELP),
                    Command::Rooms => {
                        let rooms = handle.snapshot().known_rooms_sorted();
                        print!("{}", MessageFormatter::format_known_rooms(&rooms));
                    }
                    command => {
                        let Some(action) = command.into_action(&handle.snapshot()) else {
                            println!("Not in a room");
                            continue;
                        };
                        match handle.dispatch(action).await {
                            Ok(()) => {}
                            Err(ClientError::StoreClosed) => return Err(ClientError::StoreClosed),
                            Err(e) => println!("{}", e),
                        }
                    }
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    return Err(ClientError::StoreClosed);
                }
                let snapshot = state.borrow_and_update().clone();
                let lines = screen.update(&snapshot);
                if !lines.is_empty() {
                    for line in lines {
                        print!("{}", line);
                    }
                    redisplay_prompt();
                }
            }
        }
    }

    Ok(())
}
