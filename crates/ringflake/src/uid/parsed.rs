use core::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

/// The fields recovered from an id by `parse_uid`.
///
/// Serializes (with the `serde` feature) and displays as
/// `{"uid":"..","timestamp":"..","workerId":"..","sequence":".."}`, with the
/// timestamp in ISO-8601 / RFC 3339 form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ParsedUid {
    /// The original id.
    pub uid: u64,
    /// Wall-clock instant of the id's tick (`epoch + delta`).
    pub timestamp: DateTime<Utc>,
    pub worker_id: u64,
    pub sequence: u64,
}

impl ParsedUid {
    /// The timestamp as an ISO-8601 string with millisecond precision.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl fmt::Display for ParsedUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"{{"uid":"{}","timestamp":"{}","workerId":"{}","sequence":"{}"}}"#,
            self.uid,
            self.timestamp_iso(),
            self.worker_id,
            self.sequence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParsedUid {
        ParsedUid {
            uid: 123,
            timestamp: DateTime::from_timestamp_millis(1_541_894_400_123).unwrap(),
            worker_id: 4,
            sequence: 9,
        }
    }

    #[test]
    fn displays_as_json_object() {
        assert_eq!(
            sample().to_string(),
            r#"{"uid":"123","timestamp":"2018-11-11T00:00:00.123Z","workerId":"4","sequence":"9"}"#
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["workerId"], 4);
        assert_eq!(json["sequence"], 9);
        assert_eq!(json["timestamp"], "2018-11-11T00:00:00.123Z");
        let back: ParsedUid = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample());
    }
}
