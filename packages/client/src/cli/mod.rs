//! Terminal front end for the sync core.
//!
//! Only talks to the core through a [`StoreHandle`](crate::store::StoreHandle).

mod commands;
mod formatter;
mod session;
mod ui;
mod view;

pub use commands::{Command, ParseError, parse_command};
pub use formatter::MessageFormatter;
pub use session::run_session;
pub use view::ScreenTracker;
