//! Durable storage of preferences and the known rooms roster.
//!
//! ## Layout
//!
//! - [`value`]: the closed set of values a preference row may hold
//! - [`sqlite`]: the SQLite-backed tables (`dict`, `known_rooms`)
//! - [`writer`]: the background queue that makes writes fire-and-forget

mod sqlite;
mod value;
mod writer;

pub use sqlite::{Database, SCHEMA_VERSION};
pub use value::DbValue;
pub use writer::{DurableWriter, Persistence, WriteJob};

#[cfg(test)]
pub use writer::MockPersistence;

/// Separator used to join a state path into a `dict` key
pub const KEY_SEPARATOR: &str = "$";

/// Join path segments into a `dict` key
pub fn dict_key(path: &[&str]) -> String {
    path.join(KEY_SEPARATOR)
}
