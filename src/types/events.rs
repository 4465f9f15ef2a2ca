//! Typed journal events
//!
//! The journal is newline-delimited JSON with an `event` discriminator.
//! Only the events that drive session state or describe a kill are
//! modelled; everything else decodes to [`JournalEvent::Other`].

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event")]
pub enum JournalEvent {
    /// Commander identity, written once near the top of every journal.
    Commander {
        #[serde(rename = "Name")]
        name: String,
    },
    LoadGame {
        #[serde(rename = "Commander")]
        commander: String,
    },
    Rank {
        #[serde(rename = "Combat")]
        combat: i32,
    },
    Loadout {
        #[serde(rename = "Ship")]
        ship: String,
    },
    SuitLoadout {
        #[serde(rename = "SuitName", default)]
        suit_name: Option<String>,
    },
    Location {
        #[serde(rename = "StarSystem")]
        star_system: String,
    },
    #[serde(rename = "FSDJump")]
    FsdJump {
        #[serde(rename = "StarSystem")]
        star_system: String,
    },
    CarrierJump {
        #[serde(rename = "StarSystem")]
        star_system: String,
    },
    Died(DiedEvent),
    #[serde(rename = "PVPKill")]
    PvpKill(PvpKillEvent),
    #[serde(other)]
    Other,
}

impl JournalEvent {
    /// Decode one journal line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn is_kill_event(&self) -> bool {
        matches!(self, Self::Died(_) | Self::PvpKill(_))
    }

    /// Whether an undecoded mapping claims to be a kill event.
    pub fn names_kill_event(raw: &serde_json::Value) -> bool {
        matches!(
            raw.get("event").and_then(serde_json::Value::as_str),
            Some("Died" | "PVPKill")
        )
    }
}

/// The local commander died.
///
/// Two shapes exist: a single `KillerName`/`KillerShip`/`KillerRank` triple,
/// or a `Killers` list for wing kills. Neither is present for environmental
/// or self-inflicted deaths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiedEvent {
    pub timestamp: String,
    #[serde(rename = "KillerName", default)]
    pub killer_name: Option<String>,
    #[serde(rename = "KillerShip", default)]
    pub killer_ship: Option<String>,
    #[serde(rename = "KillerRank", default)]
    pub killer_rank: Option<String>,
    #[serde(rename = "Killers", default)]
    pub killers: Option<Vec<WingKiller>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WingKiller {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Ship", default)]
    pub ship: Option<String>,
    #[serde(rename = "Rank", default)]
    pub rank: Option<String>,
}

/// The local commander killed another player.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PvpKillEvent {
    pub timestamp: String,
    #[serde(rename = "Victim")]
    pub victim: String,
    /// Already an ordinal, not a rank name.
    #[serde(rename = "CombatRank")]
    pub combat_rank: i32,
}
