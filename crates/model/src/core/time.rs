use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

/// `00:00:00.000` of the given calendar day (UTC).
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// `23:59:59.999` of the given calendar day (UTC).
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + one_day() - Duration::milliseconds(1)
}

pub fn one_day() -> Duration {
    Duration::days(1)
}

/// RFC 3339 with millisecond precision and a `Z` suffix, e.g. `2026-01-01T00:00:00.000Z`.
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Zero-padded `(year, month, day)` partition segments of a wall-clock instant.
pub fn date_partitions(ts: &DateTime<Utc>) -> (String, String, String) {
    (
        ts.year().to_string(),
        format!("{:02}", ts.month()),
        format!("{:02}", ts.day()),
    )
}

/// Accepts RFC 3339 timestamps, bare `YYYY-MM-DD` dates (midnight UTC) and
/// naive `YYYY-MM-DDTHH:MM:SS[.fff]` values (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(start_of_day(day));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Serde adapter for required timestamps: reads strings through
/// [`parse_timestamp`] or epoch milliseconds, writes [`iso_millis`].
pub mod flexible {
    use super::{iso_millis, parse_timestamp};
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&iso_millis(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(d)? {
            Raw::Text(text) => parse_timestamp(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{text}'"))),
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("invalid epoch millis {ms}"))),
        }
    }
}

/// Optional counterpart of [`flexible`]; pair with `#[serde(default)]`.
pub mod flexible_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::flexible")] DateTime<Utc>);

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => super::flexible::serialize(ts, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(ts)| ts))
    }
}
