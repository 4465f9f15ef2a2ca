//! Combat rank lookup
//!
//! Died events report the killer's rank as a display name ("Elite",
//! "Mostly Harmless"); the killboard wants the ordinal. PVPKill events
//! already carry the ordinal and never go through this table.

/// Ordinal used when a rank name is not in the table.
pub const UNKNOWN_RANK: i32 = -1;

/// Combat rank names in ordinal order (index == ordinal).
pub const COMBAT_RANKS: [&str; 9] = [
    "harmless",
    "mostly harmless",
    "novice",
    "competent",
    "expert",
    "master",
    "dangerous",
    "deadly",
    "elite",
];

/// Resolve a rank name to its ordinal (0..=8).
///
/// Matching is case-insensitive and exact; anything else yields
/// [`UNKNOWN_RANK`]. Never fails.
pub fn rank_of(name: &str) -> i32 {
    COMBAT_RANKS
        .iter()
        .position(|rank| rank.eq_ignore_ascii_case(name))
        .and_then(|idx| i32::try_from(idx).ok())
        .unwrap_or(UNKNOWN_RANK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_table_entry() {
        for (ordinal, name) in COMBAT_RANKS.iter().enumerate() {
            assert_eq!(rank_of(name), ordinal as i32, "rank {name}");
        }
    }

    #[test]
    fn matching_ignores_case() {
        assert_eq!(rank_of("Elite"), 8);
        assert_eq!(rank_of("ELITE"), 8);
        assert_eq!(rank_of("Mostly Harmless"), 1);
        assert_eq!(rank_of("mOsTlY hArMlEsS"), 1);
    }

    #[test]
    fn unknown_names_map_to_minus_one() {
        assert_eq!(rank_of(""), UNKNOWN_RANK);
        assert_eq!(rank_of("Elite I"), UNKNOWN_RANK);
        assert_eq!(rank_of(" elite"), UNKNOWN_RANK);
        assert_eq!(rank_of("mostly  harmless"), UNKNOWN_RANK);
        assert_eq!(rank_of("Triple Elite"), UNKNOWN_RANK);
    }

    #[test]
    fn lookup_is_idempotent() {
        for name in ["Deadly", "nope", "novice"] {
            assert_eq!(rank_of(name), rank_of(name));
        }
    }
}
