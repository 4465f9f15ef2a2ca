//! Normalizer Scenario Tests
//!
//! Raw journal mappings in, kill records out, through the public API only.

use serde_json::json;

use killboard_relay::normalizer::{normalize_value, KillContext, NormalizeError};
use killboard_relay::types::UNKNOWN_RANK;
use killboard_relay::PayloadSchema;

fn victim1() -> KillContext<'static> {
    KillContext {
        commander: Some("Victim1"),
        ship: Some("cobra"),
        rank: Some(3),
        location: Some("Deciat"),
    }
}

#[test]
fn cmdr_killer_produces_record() {
    let raw = json!({
        "event": "Died",
        "timestamp": "2020-03-12T12:49:54Z",
        "KillerName": "CMDR WDX",
        "KillerShip": "anaconda",
        "KillerRank": "Elite"
    });
    let record = normalize_value(raw, &victim1()).unwrap().expect("record");

    assert_eq!(record.timestamp(), 1_584_017_394);
    assert_eq!(record.victim().name(), "Victim1");
    assert_eq!(record.victim().ship(), Some("cobra"));
    assert_eq!(record.victim().rank(), 3);
    assert_eq!(record.killer().name(), "WDX");
    assert_eq!(record.killer().ship(), Some("anaconda"));
    assert_eq!(record.killer().rank(), 8);
}

#[test]
fn station_killer_produces_nothing() {
    let raw = json!({
        "event": "Died",
        "timestamp": "2020-03-12T12:49:54Z",
        "KillerName": "Some Station",
        "KillerShip": "anaconda",
        "KillerRank": "Elite"
    });
    assert!(normalize_value(raw, &victim1()).unwrap().is_none());
}

#[test]
fn self_inflicted_death_produces_nothing() {
    let raw = json!({"event": "Died", "timestamp": "2020-03-12T12:49:54Z"});
    assert!(normalize_value(raw, &victim1()).unwrap().is_none());
}

#[test]
fn wing_kill_keeps_first_player_in_order() {
    let raw = json!({
        "event": "Died",
        "timestamp": "2020-03-12T12:49:54Z",
        "Killers": [
            {"Name": "Federal Navy", "Ship": "vulture", "Rank": "Elite"},
            {"Name": "cmdr Second", "Ship": "mamba", "Rank": "Novice"},
            {"Name": "CMDR Third", "Ship": "krait", "Rank": "Deadly"}
        ]
    });
    let record = normalize_value(raw, &victim1()).unwrap().expect("record");
    assert_eq!(record.killer().name(), "Second");
    assert_eq!(record.killer().rank(), 2);
}

#[test]
fn unknown_rank_name_maps_to_minus_one() {
    let raw = json!({
        "event": "Died",
        "timestamp": "2020-03-12T12:49:54Z",
        "KillerName": "CMDR WDX",
        "KillerRank": "Grand Admiral"
    });
    let record = normalize_value(raw, &victim1()).unwrap().expect("record");
    assert_eq!(record.killer().rank(), UNKNOWN_RANK);
    assert_eq!(record.killer().ship(), None);

    let body = serde_json::to_value(record.to_payload(PayloadSchema::Current, false)).unwrap();
    assert_eq!(body["killer"]["ship"], "unknown");
}

#[test]
fn pvp_kill_uses_local_identity_as_killer() {
    let raw = json!({
        "event": "PVPKill",
        "timestamp": "2020-03-12T12:49:54Z",
        "Victim": "Bob",
        "CombatRank": 4
    });
    let record = normalize_value(raw, &victim1()).unwrap().expect("record");
    assert_eq!(record.killer().name(), "Victim1");
    assert_eq!(record.killer().ship(), Some("cobra"));
    assert_eq!(record.victim().name(), "Bob");
    assert_eq!(record.victim().rank(), 4);
    assert_eq!(record.location(), Some("Deciat"));
}

#[test]
fn pvp_kill_without_rank_produces_nothing() {
    let raw = json!({
        "event": "PVPKill",
        "timestamp": "2020-03-12T12:49:54Z",
        "Victim": "Bob",
        "CombatRank": 4
    });
    let ctx = KillContext {
        rank: None,
        ..victim1()
    };
    assert!(normalize_value(raw, &ctx).unwrap().is_none());
}

#[test]
fn malformed_input_is_an_error_not_a_drop() {
    let bad_timestamp = json!({
        "event": "PVPKill",
        "timestamp": "12 March 2020",
        "Victim": "Bob",
        "CombatRank": 4
    });
    assert!(matches!(
        normalize_value(bad_timestamp, &victim1()),
        Err(NormalizeError::Timestamp { .. })
    ));

    let missing_victim = json!({"event": "PVPKill", "timestamp": "2020-03-12T12:49:54Z"});
    assert!(matches!(
        normalize_value(missing_victim, &victim1()),
        Err(NormalizeError::Decode(_))
    ));
}

#[test]
fn non_kill_events_are_ignored() {
    let raw = json!({"event": "FSDJump", "StarSystem": "Sol"});
    assert!(normalize_value(raw, &victim1()).unwrap().is_none());
    let raw = json!({"event": "Music", "MusicTrack": "Combat"});
    assert!(normalize_value(raw, &victim1()).unwrap().is_none());
}
