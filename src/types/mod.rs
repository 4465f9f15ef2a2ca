//! Shared data structures for the kill ingestion pipeline
//!
//! - `rank`: combat rank name → ordinal table
//! - `events`: typed journal events (the raw input)
//! - `kill`: canonical `KillRecord` and its wire payloads (the output)

mod events;
mod kill;
mod rank;

pub use events::*;
pub use kill::*;
pub use rank::*;
