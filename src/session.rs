//! Running session state reconstructed from the journal
//!
//! Shared by the historic scanner and the live tracker: both replay
//! state-change events in order and hand the current view to the
//! normalizer whenever a kill event appears.

use crate::normalizer::KillContext;
use crate::types::{JournalEvent, ON_FOOT_SHIP, UNKNOWN_SHIP};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    commander: Option<String>,
    ship: Option<String>,
    rank: Option<i32>,
    location: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// What changed after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// A commander identity was (re)declared.
    Commander,
    Other,
    None,
}

impl SessionState {
    /// Fresh state: no commander, no rank, ship placeholder `"unknown"`.
    pub fn new() -> Self {
        Self {
            commander: None,
            ship: Some(UNKNOWN_SHIP.to_string()),
            rank: None,
            location: None,
        }
    }

    pub fn commander(&self) -> Option<&str> {
        self.commander.as_deref()
    }

    pub fn ship(&self) -> Option<&str> {
        self.ship.as_deref()
    }

    pub fn rank(&self) -> Option<i32> {
        self.rank
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Apply a state-change event. Kill events and unknown events leave the
    /// state untouched.
    pub fn apply(&mut self, event: &JournalEvent) -> StateChange {
        match event {
            JournalEvent::Commander { name } | JournalEvent::LoadGame { commander: name } => {
                self.commander = Some(name.clone());
                StateChange::Commander
            }
            JournalEvent::Rank { combat } => {
                self.rank = Some(*combat);
                StateChange::Other
            }
            JournalEvent::Loadout { ship } => {
                self.ship = Some(ship.clone());
                StateChange::Other
            }
            // Suit names are not reported; every on-foot loadout is one value.
            JournalEvent::SuitLoadout { .. } => {
                self.ship = Some(ON_FOOT_SHIP.to_string());
                StateChange::Other
            }
            JournalEvent::Location { star_system }
            | JournalEvent::FsdJump { star_system }
            | JournalEvent::CarrierJump { star_system } => {
                self.location = Some(star_system.clone());
                StateChange::Other
            }
            JournalEvent::Died(_) | JournalEvent::PvpKill(_) | JournalEvent::Other => {
                StateChange::None
            }
        }
    }

    pub fn kill_context(&self) -> KillContext<'_> {
        KillContext {
            commander: self.commander(),
            ship: self.ship(),
            rank: self.rank,
            location: self.location(),
        }
    }
}

/// Case-insensitive commander allow-list. Empty matches everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommanderFilter {
    allowed: Vec<String>,
}

impl CommanderFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowed.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        !self.is_enabled() || self.allowed.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}
