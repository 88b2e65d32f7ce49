//! Lifecycle notification parsing and event-name canonicalization.

pub use contracts::event_names::canonicalize;
use contracts::{NormalizedEvent, RawNotification};
use serde_json::Value;

/// Parse a raw notification into a normalized event
///
/// Valid only for `{payload: {event: <non-empty string>, data?}}`. Everything else
/// is channel noise and yields `None`.
pub fn parse(raw: &RawNotification) -> Option<NormalizedEvent> {
    let payload = raw.as_object()?.get("payload")?.as_object()?;
    let event = payload.get("event")?.as_str()?;
    if event.trim().is_empty() {
        return None;
    }

    Some(NormalizedEvent {
        event: event.to_string(),
        data: payload.get("data").cloned().unwrap_or(Value::Null),
    })
}

/// Canonical name of a parsed event
pub fn canonical_name(event: &NormalizedEvent) -> &str {
    canonicalize(&event.event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_malformed_shapes() {
        let malformed = [
            Value::Null,
            json!("nope"),
            json!(42),
            json!([{"payload": {"event": "ready"}}]),
            json!({}),
            json!({ "payload": "bad" }),
            json!({ "payload": null }),
            json!({ "payload": {} }),
            json!({ "payload": { "event": 123 } }),
            json!({ "payload": { "event": null } }),
            json!({ "payload": { "event": "" } }),
            json!({ "payload": { "event": "   " } }),
        ];

        for raw in &malformed {
            assert_eq!(parse(raw), None, "should reject {raw}");
        }
    }

    #[test]
    fn test_parse_passes_data_through() {
        let raw = json!({ "payload": { "event": "ready", "data": { "ok": true } } });
        assert_eq!(
            parse(&raw),
            Some(NormalizedEvent::new("ready", json!({ "ok": true })))
        );
    }

    #[test]
    fn test_parse_missing_data_is_null() {
        let raw = json!({ "payload": { "event": "outboxStatus" }, "channel": "datastore" });
        let event = parse(&raw).unwrap();
        assert_eq!(event.event, "outboxStatus");
        assert_eq!(event.data, Value::Null);
    }

    #[test]
    fn test_canonical_name_of_event() {
        let event = NormalizedEvent::new("syncQueriesFailed", Value::Null);
        assert_eq!(canonical_name(&event), "syncQueriesError");
    }
}
