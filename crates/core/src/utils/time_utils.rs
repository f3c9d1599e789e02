use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use serde_json::Value;

/// Truncates an instant to millisecond resolution.
///
/// Goal epochs and aggregate stamps are compared at this resolution, so every
/// timestamp that enters the core goes through here.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .duration_trunc(Duration::milliseconds(1))
        .unwrap_or(instant)
}

/// Current instant at millisecond resolution.
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Returns an epoch start for a new goal that sorts strictly after `previous`.
pub fn next_epoch_after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = truncate_to_millis(now);
    match previous {
        Some(prev) if now <= prev => truncate_to_millis(prev) + Duration::milliseconds(1),
        _ => now,
    }
}

/// Normalizes a raw document timestamp into a canonical UTC instant.
///
/// Accepted shapes:
/// - integer epoch milliseconds
/// - `{ "seconds": i64, "nanoseconds": u32 }` (also `_seconds`/`_nanoseconds`)
/// - RFC 3339 strings
///
/// Anything else yields `None`, which callers treat as a missing timestamp.
pub fn normalize_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).ok()?;
            Utc.timestamp_opt(seconds, nanos).single()
        }
        _ => None,
    }
    .map(truncate_to_millis)
}

/// Serde adapter for optional timestamps in loosely typed documents.
///
/// Malformed values decode to `None` instead of failing the whole record.
pub mod lenient_timestamp {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(normalize_timestamp(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_epoch_millis() {
        let ts = normalize_timestamp(&json!(1_700_000_000_123_i64)).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_normalize_seconds_object() {
        let ts = normalize_timestamp(&json!({"seconds": 1_700_000_000, "nanoseconds": 5_500_000}))
            .unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_005);

        let ts = normalize_timestamp(&json!({"_seconds": 10, "_nanoseconds": 0})).unwrap();
        assert_eq!(ts.timestamp(), 10);
    }

    #[test]
    fn test_normalize_rfc3339() {
        let ts = normalize_timestamp(&json!("2024-03-01T10:00:00.250+01:00")).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::milliseconds(250));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_timestamp(&json!("yesterday")).is_none());
        assert!(normalize_timestamp(&json!(null)).is_none());
        assert!(normalize_timestamp(&json!(true)).is_none());
        assert!(normalize_timestamp(&json!({"nanoseconds": 1})).is_none());
        assert!(normalize_timestamp(&json!(1.5)).is_none());
    }

    #[test]
    fn test_next_epoch_is_strictly_increasing() {
        let prev = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(next_epoch_after(Some(prev), prev), prev + Duration::milliseconds(1));
        assert_eq!(
            next_epoch_after(Some(prev), prev - Duration::seconds(5)),
            prev + Duration::milliseconds(1)
        );
        let later = prev + Duration::seconds(1);
        assert_eq!(next_epoch_after(Some(prev), later), later);
        assert_eq!(next_epoch_after(None, later), later);
    }

    #[test]
    fn test_truncate_to_millis() {
        let ts = Utc.timestamp_opt(100, 1_234_567).unwrap();
        assert_eq!(truncate_to_millis(ts).timestamp_subsec_nanos(), 1_000_000);
    }
}
