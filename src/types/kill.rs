//! Canonical kill records and their wire representation

use serde::{Deserialize, Serialize};

/// Placeholder ship name used when a ship is not known.
pub const UNKNOWN_SHIP: &str = "unknown";

/// Ship value recorded while the commander is on foot.
pub const ON_FOOT_SHIP: &str = "on_foot";

/// One participant of a kill, with the `CMDR ` prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommanderEntry {
    name: String,
    ship: Option<String>,
    rank: i32,
}

impl CommanderEntry {
    pub fn new(name: impl Into<String>, ship: Option<String>, rank: i32) -> Self {
        Self {
            name: name.into(),
            ship,
            rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ship as recorded. `None` is distinct from the `"unknown"` placeholder
    /// until the entry is serialized.
    pub fn ship(&self) -> Option<&str> {
        self.ship.as_deref()
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    fn to_payload(&self, schema: PayloadSchema) -> CommanderPayload {
        let ship = match schema {
            PayloadSchema::Current => Some(
                self.ship
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(UNKNOWN_SHIP)
                    .to_string(),
            ),
            PayloadSchema::Legacy => self.ship.clone(),
        };
        CommanderPayload {
            name: self.name.clone(),
            ship,
            rank: self.rank,
        }
    }
}

/// A single player-vs-player kill, from either side of the fight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRecord {
    timestamp: i64,
    victim: CommanderEntry,
    killer: CommanderEntry,
    location: Option<String>,
    origin: Option<String>,
}

impl KillRecord {
    pub fn new(
        timestamp: i64,
        victim: CommanderEntry,
        killer: CommanderEntry,
        location: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            victim,
            killer,
            location,
            origin: None,
        }
    }

    /// Unix seconds (UTC).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn victim(&self) -> &CommanderEntry {
        &self.victim
    }

    pub fn killer(&self) -> &CommanderEntry {
        &self.killer
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Journal file the record was reconstructed from (diagnostic only).
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn set_origin(&mut self, origin: impl Into<String>) {
        self.origin = Some(origin.into());
    }

    /// Build the request body for this record.
    ///
    /// `location` is only included when known and `send_location` is set.
    /// The origin never leaves the process.
    pub fn to_payload(&self, schema: PayloadSchema, send_location: bool) -> KillPayload {
        let victim = self.victim.to_payload(schema);
        let killer = self.killer.to_payload(schema);
        match schema {
            PayloadSchema::Current => KillPayload::Current {
                timestamp: self.timestamp,
                victim,
                killer,
                location: if send_location {
                    self.location.clone()
                } else {
                    None
                },
            },
            PayloadSchema::Legacy => KillPayload::Legacy {
                timestamp: self.timestamp,
                victim,
                killers: vec![killer],
            },
        }
    }
}

/// Which body layout the killboard expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadSchema {
    /// `{timestamp, victim, killer, location?}`, ship always present.
    #[default]
    Current,
    /// `{timestamp, victim, killers: [killer]}`, ship omitted when null.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommanderPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship: Option<String>,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KillPayload {
    Current {
        timestamp: i64,
        victim: CommanderPayload,
        killer: CommanderPayload,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    Legacy {
        timestamp: i64,
        victim: CommanderPayload,
        killers: Vec<CommanderPayload>,
    },
}

/// Body of the bulk ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkPayload {
    pub kills: Vec<KillPayload>,
}

impl BulkPayload {
    pub fn from_records(records: &[KillRecord], schema: PayloadSchema, send_location: bool) -> Self {
        Self {
            kills: records
                .iter()
                .map(|r| r.to_payload(schema, send_location))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(victim_ship: Option<&str>, location: Option<&str>) -> KillRecord {
        KillRecord::new(
            1_584_017_394,
            CommanderEntry::new("Victim1", victim_ship.map(str::to_string), 3),
            CommanderEntry::new("WDX", Some("anaconda".to_string()), 8),
            location.map(str::to_string),
        )
    }

    #[test]
    fn current_schema_substitutes_unknown_ship() {
        let value = serde_json::to_value(record(None, None).to_payload(PayloadSchema::Current, false))
            .expect("serialize");
        assert_eq!(
            value,
            json!({
                "timestamp": 1_584_017_394,
                "victim": {"name": "Victim1", "ship": "unknown", "rank": 3},
                "killer": {"name": "WDX", "ship": "anaconda", "rank": 8},
            })
        );
    }

    #[test]
    fn empty_ship_is_also_unknown() {
        let payload = record(Some(""), None).to_payload(PayloadSchema::Current, false);
        let value = serde_json::to_value(payload).expect("serialize");
        assert_eq!(value["victim"]["ship"], "unknown");
    }

    #[test]
    fn null_ship_survives_in_memory() {
        let rec = record(None, None);
        assert_eq!(rec.victim().ship(), None);
    }

    #[test]
    fn legacy_schema_omits_null_ship_and_wraps_killer() {
        let value = serde_json::to_value(record(None, Some("Shinrarta Dezhra")).to_payload(PayloadSchema::Legacy, true))
            .expect("serialize");
        assert_eq!(
            value,
            json!({
                "timestamp": 1_584_017_394,
                "victim": {"name": "Victim1", "rank": 3},
                "killers": [{"name": "WDX", "ship": "anaconda", "rank": 8}],
            })
        );
    }

    #[test]
    fn location_requires_flag() {
        let rec = record(Some("cobra"), Some("Deciat"));
        let hidden = serde_json::to_value(rec.to_payload(PayloadSchema::Current, false)).expect("serialize");
        assert!(hidden.get("location").is_none());
        let shown = serde_json::to_value(rec.to_payload(PayloadSchema::Current, true)).expect("serialize");
        assert_eq!(shown["location"], "Deciat");
    }

    #[test]
    fn origin_is_never_serialized() {
        let mut rec = record(Some("cobra"), None);
        rec.set_origin("Journal.2020-03-12T120000.01.log");
        let value = serde_json::to_value(rec.to_payload(PayloadSchema::Current, true)).expect("serialize");
        assert!(!value.to_string().contains("Journal"));
        assert_eq!(rec.origin(), Some("Journal.2020-03-12T120000.01.log"));
    }

    #[test]
    fn payload_reads_back_as_its_variant() {
        let rec = record(Some("cobra"), None);
        for schema in [PayloadSchema::Current, PayloadSchema::Legacy] {
            let text = serde_json::to_string(&rec.to_payload(schema, false)).expect("serialize");
            let back: KillPayload = serde_json::from_str(&text).expect("deserialize");
            assert_eq!(back, rec.to_payload(schema, false));
        }
    }

    #[test]
    fn bulk_payload_wraps_kills() {
        let records = vec![record(Some("cobra"), None), record(None, None)];
        let value = serde_json::to_value(BulkPayload::from_records(&records, PayloadSchema::Current, false))
            .expect("serialize");
        assert_eq!(value["kills"].as_array().map(Vec::len), Some(2));
    }
}
