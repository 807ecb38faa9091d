//! Utilities shared by the Selah client packages.

pub mod logger;
pub mod time;
