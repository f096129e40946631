use serde_json::Value;
use tracing::{debug, error, warn};

use crate::time::Millis;
use crate::timeline::RawEvent;

/// Filters malformed candidates out of an untrusted payload and returns the
/// survivors in dispatch order.
///
/// A candidate survives when it is an object with a finite, non-negative
/// numeric `t` and a non-empty string `event`. Every rejected candidate is
/// logged and skipped; the rest are still processed. The sort is stable, so
/// events sharing an offset keep their authored order. A payload that is not
/// an array yields an empty timeline.
///
/// # Example
/// ```
/// use replay_engine::validate::validate_timeline;
/// use serde_json::json;
///
/// let events = validate_timeline(&json!([
///     {"t": 100, "event": "narration", "text": "later"},
///     {"event": "narration", "text": "no offset"},
///     {"t": 0, "event": "narration", "text": "first"},
/// ]));
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0].t, 0);
/// assert_eq!(events[0].index, 2);
/// ```
pub fn validate_timeline(raw: &Value) -> Vec<RawEvent> {
    let Some(candidates) = raw.as_array() else {
        error!("timeline data must be an array; using an empty timeline");
        return Vec::new();
    };

    let mut events: Vec<RawEvent> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| validate_candidate(index, candidate))
        .collect();
    events.sort_by_key(|event| event.t);

    debug!(
        candidates = candidates.len(),
        accepted = events.len(),
        "timeline validated"
    );
    events
}

fn validate_candidate(index: usize, candidate: &Value) -> Option<RawEvent> {
    let Some(object) = candidate.as_object() else {
        warn!(index, "invalid event: not an object");
        return None;
    };

    let Some(t) = object.get("t").and_then(offset_ms) else {
        warn!(index, t = ?object.get("t"), "invalid event: missing or invalid time offset (t)");
        return None;
    };

    let kind = match object.get("event").and_then(Value::as_str) {
        Some(kind) if !kind.is_empty() => kind.to_owned(),
        _ => {
            warn!(index, t, "invalid event: missing or invalid event type");
            return None;
        }
    };

    Some(RawEvent {
        index,
        t,
        kind,
        body: candidate.clone(),
    })
}

fn offset_ms(value: &Value) -> Option<Millis> {
    if let Some(whole) = value.as_u64() {
        return Some(whole);
    }
    let fractional = value.as_f64()?;
    // Floats at or past 2^64 do not fit a millisecond offset.
    if !fractional.is_finite() || fractional < 0.0 || fractional >= u64::MAX as f64 {
        return None;
    }
    Some(fractional.floor() as Millis)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::validate_timeline;

    #[test]
    fn non_array_payload_is_an_empty_timeline() {
        assert!(validate_timeline(&json!({"t": 0, "event": "transcript"})).is_empty());
        assert!(validate_timeline(&json!(null)).is_empty());
    }

    #[test]
    fn drops_malformed_candidates_and_keeps_the_rest() {
        let events = validate_timeline(&json!([
            42,
            null,
            {"t": "soon", "event": "narration"},
            {"t": 5, "event": ""},
            {"t": 5, "event": 7},
            {"t": -1, "event": "narration"},
            {"t": 10, "event": "narration", "text": "kept"},
        ]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 6);
        assert_eq!(events[0].kind, "narration");
    }

    #[test]
    fn sort_is_stable_for_equal_offsets() {
        let events = validate_timeline(&json!([
            {"t": 50, "event": "panel_show", "panel": "a"},
            {"t": 0, "event": "transcript", "speaker": "customer", "text": "Hi"},
            {"t": 50, "event": "auto_populate", "panel": "a", "data": {}},
            {"t": 50, "event": "panel_hide", "panel": "a"},
        ]));

        let kinds: Vec<&str> = events.iter().map(|event| event.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["transcript", "panel_show", "auto_populate", "panel_hide"]
        );
    }

    #[test]
    fn fractional_offsets_are_floored() {
        let events = validate_timeline(&json!([{"t": 12.9, "event": "narration"}]));
        assert_eq!(events[0].t, 12);
    }

    #[test]
    fn unknown_kinds_pass_validation() {
        let events = validate_timeline(&json!([{"t": 1, "event": "bogus_kind"}]));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn offsets_beyond_the_millisecond_range_are_dropped() {
        let events = validate_timeline(&json!([
            {"t": 1e300, "event": "narration", "text": "never"},
            {"t": 18446744073709551616.0, "event": "narration", "text": "2^64"},
            {"t": 18446744073709551615u64, "event": "narration", "text": "max"},
            {"t": 7, "event": "narration", "text": "kept"},
        ]));

        let indices: Vec<usize> = events.iter().map(|event| event.index).collect();
        assert_eq!(indices, vec![3, 2]);
        assert_eq!(events[1].t, u64::MAX);
    }
}
