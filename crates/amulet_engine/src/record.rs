//! On-disk form of an [`Entry`]: one JSON object per line with the stable
//! field names `Text`, `Rarity` and `Time`.
use amulet_core::{Entry, Rarity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PersistedEntry {
    #[serde(rename = "Text")]
    text: String,
    #[serde(rename = "Rarity")]
    rarity: i64,
    #[serde(rename = "Time")]
    time: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rarity {0} outside 1..=7")]
    Rarity(i64),
}

/// Serialize one entry as a single line, without the trailing newline.
pub fn encode_entry(entry: &Entry) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PersistedEntry {
        text: entry.text.clone(),
        rarity: i64::from(entry.rarity.get()),
        time: entry.observed_at,
    })
}

/// Parse one log line. Leading and trailing whitespace is ignored.
pub fn decode_entry(line: &[u8]) -> Result<Entry, RecordError> {
    let record: PersistedEntry = serde_json::from_slice(line.trim_ascii())?;
    let rarity = Rarity::try_from(record.rarity).map_err(RecordError::Rarity)?;
    Ok(Entry::new(record.text, rarity, record.time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn field_names_are_stable() {
        let entry = Entry::new(
            "a poem",
            Rarity::RARE,
            Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap(),
        );
        let line = encode_entry(&entry).unwrap();
        assert_eq!(
            line,
            r#"{"Text":"a poem","Rarity":3,"Time":"2024-11-20T12:00:00Z"}"#
        );
        assert_eq!(decode_entry(line.as_bytes()).unwrap(), entry);
    }

    #[test]
    fn offsets_are_normalised_to_utc() {
        let line = br#"{"Text":"x","Rarity":2,"Time":"2024-11-20T07:00:00.5-05:00"}"#;
        let entry = decode_entry(line).unwrap();
        assert_eq!(
            entry.observed_at,
            Utc.with_ymd_and_hms(2024, 11, 20, 12, 0, 0).unwrap()
                + chrono::Duration::milliseconds(500)
        );
    }

    #[test]
    fn out_of_range_rarity_is_rejected() {
        let line = br#"{"Text":"x","Rarity":9,"Time":"2024-11-20T12:00:00Z"}"#;
        assert!(matches!(decode_entry(line), Err(RecordError::Rarity(9))));
    }
}
