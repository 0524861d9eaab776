//! Wall-clock helpers.
//!
//! Every timestamp the ledger stores or hashes is UTC truncated to
//! millisecond precision and rendered as RFC 3339 with a `Z` suffix
//! (`2024-05-01T10:00:00.000Z`), so the stored value, the wire value and the
//! hashed value are always the same string.

use chrono::{DateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub fn format_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|ts| ts.with_timezone(&Utc).trunc_subsecs(3))
}

/// Serde adapter for required timestamps.
pub mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_millis(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }
}

/// Serde adapter for client-supplied timestamps: accepts an RFC 3339 string
/// or epoch milliseconds.
pub mod lenient_option {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Text(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(
        ts: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => serializer.serialize_some(&format_millis(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<RawTimestamp>::deserialize(deserializer)? {
            None => Ok(None),
            Some(RawTimestamp::Text(raw)) => parse(&raw).map(Some).map_err(de::Error::custom),
            Some(RawTimestamp::Millis(ms)) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", ms))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_always_carries_milliseconds() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(format_millis(&ts), "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn test_parse_truncates_to_milliseconds() {
        let ts = parse("2024-05-01T12:00:00.123456+02:00").unwrap();
        assert_eq!(format_millis(&ts), "2024-05-01T10:00:00.123Z");
    }

    #[test]
    fn test_now_has_no_sub_millisecond_part() {
        let ts = now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
