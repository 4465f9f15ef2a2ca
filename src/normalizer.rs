//! Event normalizer
//!
//! Turns `Died` and `PVPKill` journal events into canonical [`KillRecord`]s,
//! given what is known about the local commander at the time of the event.
//!
//! Outcomes are three-way:
//! - `Ok(Some(record))`: a player kill worth recording
//! - `Ok(None)`: a normal drop (self-inflicted death, NPC killers, missing
//!   identity context)
//! - `Err(_)`: malformed input; the caller decides whether to skip the line
//!   or report it

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::types::{
    rank_of, CommanderEntry, DiedEvent, JournalEvent, KillRecord, PvpKillEvent, UNKNOWN_RANK,
    UNKNOWN_SHIP,
};

/// Prefix the journal puts in front of player names.
pub const CMDR_PREFIX: &str = "CMDR ";

/// Journal timestamp layout, always UTC.
pub const JOURNAL_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("malformed event: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What is known about the local commander when an event is seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KillContext<'a> {
    pub commander: Option<&'a str>,
    pub ship: Option<&'a str>,
    pub rank: Option<i32>,
    pub location: Option<&'a str>,
}

/// Parse a journal timestamp (`2020-03-12T12:49:54Z`) to unix seconds.
pub fn parse_timestamp(value: &str) -> Result<i64, NormalizeError> {
    NaiveDateTime::parse_from_str(value, JOURNAL_TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|source| NormalizeError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// Strip a case-insensitive `CMDR ` prefix, or `None` if the name is not a player.
pub fn strip_cmdr_prefix(name: &str) -> Option<&str> {
    let prefix = name.get(..CMDR_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(CMDR_PREFIX) {
        name.get(CMDR_PREFIX.len()..)
    } else {
        None
    }
}

/// Normalize any journal event. Non-kill events always yield `Ok(None)`.
pub fn normalize(event: &JournalEvent, ctx: &KillContext<'_>) -> Result<Option<KillRecord>, NormalizeError> {
    match event {
        JournalEvent::Died(died) => from_death_event(died, ctx),
        JournalEvent::PvpKill(kill) => from_kill_event(kill, ctx),
        _ => Ok(None),
    }
}

/// Decode a raw event mapping and normalize it.
pub fn normalize_value(
    raw: serde_json::Value,
    ctx: &KillContext<'_>,
) -> Result<Option<KillRecord>, NormalizeError> {
    let event = JournalEvent::from_value(raw)?;
    normalize(&event, ctx)
}

/// The local commander was killed.
///
/// Only player killers count. For wing kills the first player in list
/// order becomes the killer; the rest are not recorded.
pub fn from_death_event(
    event: &DiedEvent,
    ctx: &KillContext<'_>,
) -> Result<Option<KillRecord>, NormalizeError> {
    let Some(self_name) = ctx.commander else {
        return Ok(None);
    };

    let mut killers: Vec<CommanderEntry> = Vec::new();

    if let Some(name) = event.killer_name.as_deref() {
        let Some(stripped) = strip_cmdr_prefix(name) else {
            return Ok(None);
        };
        let rank = event
            .killer_rank
            .as_deref()
            .ok_or(NormalizeError::MissingField("KillerRank"))?;
        killers.push(CommanderEntry::new(
            stripped,
            event.killer_ship.clone(),
            rank_of(rank),
        ));
    } else if let Some(wing) = event.killers.as_deref() {
        for member in wing {
            let Some(stripped) = strip_cmdr_prefix(&member.name) else {
                continue;
            };
            let rank = member
                .rank
                .as_deref()
                .ok_or(NormalizeError::MissingField("Rank"))?;
            killers.push(CommanderEntry::new(stripped, member.ship.clone(), rank_of(rank)));
        }
    } else {
        // Environmental or self-inflicted.
        return Ok(None);
    }

    if killers.is_empty() {
        return Ok(None);
    }

    let timestamp = parse_timestamp(&event.timestamp)?;
    let victim = CommanderEntry::new(
        self_name,
        Some(ctx.ship.unwrap_or(UNKNOWN_SHIP).to_string()),
        ctx.rank.unwrap_or(UNKNOWN_RANK),
    );
    let killer = killers.swap_remove(0);

    Ok(Some(KillRecord::new(
        timestamp,
        victim,
        killer,
        ctx.location.map(str::to_string),
    )))
}

/// The local commander killed another player.
///
/// Requires the full local identity; the victim's ship is never reported
/// by the journal for this event.
pub fn from_kill_event(
    event: &PvpKillEvent,
    ctx: &KillContext<'_>,
) -> Result<Option<KillRecord>, NormalizeError> {
    let (Some(name), Some(ship), Some(rank)) = (ctx.commander, ctx.ship, ctx.rank) else {
        return Ok(None);
    };

    let timestamp = parse_timestamp(&event.timestamp)?;
    let victim = CommanderEntry::new(event.victim.as_str(), None, event.combat_rank);
    let killer = CommanderEntry::new(name, Some(ship.to_string()), rank);

    Ok(Some(KillRecord::new(
        timestamp,
        victim,
        killer,
        ctx.location.map(str::to_string),
    )))
}
