use serde::Deserialize;
use serde::Serialize;

use crate::error::VizError;
use crate::snapshot::CategoryKey;
use crate::snapshot::Entity;
use crate::snapshot::WorldBounds;

/// One inbound snapshot message. Every field is optional; absent fields leave the store untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMessage {
    pub current_tick: Option<i64>,
    pub max_ticks: Option<i64>,
    /// Category key for `entities`.
    #[serde(rename = "t")]
    pub category: Option<CategoryKey>,
    pub entities: Option<Vec<Entity>>,
    pub world_size: Option<WorldBounds>,
}

impl SnapshotMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, VizError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(VizError::MalformedMessage("empty payload".to_string()));
        }

        // `null` and other non-object payloads are rejected instead of committing nothing
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        if !value.is_object() {
            return Err(VizError::MalformedMessage(format!("expected a JSON object, got {value}")));
        }

        serde_json::from_value(value).map_err(|e| VizError::MalformedMessage(e.to_string()))
    }
}

/// Outbound playback-speed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    #[serde(rename = "timeToWaitInMilliseconds")]
    pub time_to_wait_ms: u64,
}

impl ControlMessage {
    pub fn to_json(&self) -> Result<String, VizError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_snapshot() {
        let message = SnapshotMessage::parse(
            br#"{"currentTick":5,"maxTicks":100,"t":19,"entities":[{"x":3,"y":4}],"worldSize":{"minX":0,"minY":0,"maxX":9,"maxY":9}}"#,
        )
        .unwrap();

        assert_eq!(message.current_tick, Some(5));
        assert_eq!(message.max_ticks, Some(100));
        assert_eq!(message.category, Some(19));
        assert_eq!(message.entities, Some(vec![Entity { x: 3.0, y: 4.0 }]));
        assert_eq!(message.world_size, Some(WorldBounds { min_x: 0, min_y: 0, max_x: 9, max_y: 9 }));
    }

    #[test]
    fn missing_fields_are_none() {
        let message = SnapshotMessage::parse(br#"{"currentTick":12}"#).unwrap();
        assert_eq!(message, SnapshotMessage { current_tick: Some(12), ..Default::default() });
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let message = SnapshotMessage::parse(br#"{"maxTicks":3,"pointFeatures":[1,2,3]}"#).unwrap();
        assert_eq!(message.max_ticks, Some(3));
    }

    #[test]
    fn fractional_entity_coordinates() {
        let message = SnapshotMessage::parse(br#"{"t":2,"entities":[{"x":1.5,"y":-0.25}]}"#).unwrap();
        assert_eq!(message.entities.unwrap()[0], Entity { x: 1.5, y: -0.25 });
    }

    #[test]
    fn rejects_empty_null_and_garbage() {
        assert!(matches!(SnapshotMessage::parse(b""), Err(VizError::MalformedMessage(_))));
        assert!(matches!(SnapshotMessage::parse(b"  \n"), Err(VizError::MalformedMessage(_))));
        assert!(matches!(SnapshotMessage::parse(b"null"), Err(VizError::MalformedMessage(_))));
        assert!(matches!(SnapshotMessage::parse(b"[1,2]"), Err(VizError::MalformedMessage(_))));
        assert!(matches!(SnapshotMessage::parse(b"{not json"), Err(VizError::Json(_))));
    }

    #[test]
    fn wrongly_typed_field_is_malformed() {
        assert!(matches!(SnapshotMessage::parse(br#"{"currentTick":"five"}"#), Err(VizError::MalformedMessage(_))));
    }

    #[test]
    fn control_message_wire_format() {
        let json = ControlMessage { time_to_wait_ms: 13 }.to_json().unwrap();
        assert_eq!(json, r#"{"timeToWaitInMilliseconds":13}"#);
    }
}
