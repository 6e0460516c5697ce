//! Epoch-millisecond timestamps and their display form.

use std::fmt;

use chrono::DateTime;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Display format of converted timestamps (UTC).
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A timestamp field as found on registry and tracking entities.
///
/// The upstream API sends epoch milliseconds, as a number or a decimal
/// string. Once converted the field holds the formatted text, and
/// converting again leaves it as it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Millis(i64),
    Display(String),
}

impl Timestamp {
    pub fn to_display(&self) -> Timestamp {
        match self {
            Timestamp::Millis(millis) => match format_millis(*millis) {
                Some(text) => Timestamp::Display(text),
                None => {
                    tracing::debug!(millis, "timestamp out of range, left unconverted");
                    self.clone()
                }
            },
            Timestamp::Display(_) => self.clone(),
        }
    }

    pub fn is_display(&self) -> bool {
        matches!(self, Timestamp::Display(_))
    }
}

pub fn format_millis(millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(millis).map(|time| time.format(TS_FORMAT).to_string())
}

/// Display form of an optional timestamp field.
pub(crate) fn to_display(field: &Option<Timestamp>) -> Option<Timestamp> {
    field.as_ref().map(Timestamp::to_display)
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Millis(millis) => write!(f, "{}", millis),
            Timestamp::Display(text) => f.write_str(text),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Timestamp::Millis(millis)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::Millis(millis) => serializer.serialize_i64(*millis),
            Timestamp::Display(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl<'de> de::Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("epoch milliseconds or a formatted timestamp")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Timestamp, E> {
                Ok(Timestamp::Millis(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Timestamp, E> {
                i64::try_from(v)
                    .map(Timestamp::Millis)
                    .map_err(|_| E::custom(format!("timestamp {} out of range", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                Ok(match v.parse::<i64>() {
                    Ok(millis) => Timestamp::Millis(millis),
                    Err(_) => Timestamp::Display(v.to_owned()),
                })
            }
        }

        deserializer.deserialize_any(TimestampVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn converts_epoch_millis() {
        let ts = Timestamp::Millis(1_700_000_000_123);
        assert_eq!(ts.to_display(), Timestamp::Display("2023-11-14 22:13:20".to_string()));
    }

    #[test]
    fn converting_twice_is_a_no_op() {
        let once = Timestamp::Millis(0).to_display();
        let twice = once.to_display();
        assert_eq!(once, twice);
        assert_eq!(twice.to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn parses_numbers_strings_and_display_text() {
        let parsed: Vec<Timestamp> =
            serde_json::from_str(r#"[1000, "2000", "2023-11-14 22:13:20"]"#).unwrap();
        assert_eq!(parsed[0], Timestamp::Millis(1000));
        assert_eq!(parsed[1], Timestamp::Millis(2000));
        assert!(parsed[2].is_display());
    }
}
