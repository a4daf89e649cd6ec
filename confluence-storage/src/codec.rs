//! Persisted record format.
//!
//! Format: `[persisted_at: 8 bytes, i64 LE unix millis][json state]`

use chrono::{DateTime, Utc};
use confluence_core::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};

/// Length of the timestamp prefix.
pub const TIMESTAMP_LEN: usize = 8;

/// A decoded record.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord<S> {
    /// When the state was written.
    pub persisted_at: DateTime<Utc>,
    pub state: S,
}

/// Encode `state` with its write timestamp.
pub fn encode_record<S: Serialize>(
    state: &S,
    persisted_at: DateTime<Utc>,
) -> Result<Vec<u8>, PersistenceError> {
    let timestamp_bytes = persisted_at.timestamp_millis().to_le_bytes();
    let value_bytes = serde_json::to_vec(state).map_err(|e| PersistenceError::Serialization {
        reason: e.to_string(),
    })?;

    let mut full_bytes = Vec::with_capacity(TIMESTAMP_LEN + value_bytes.len());
    full_bytes.extend_from_slice(&timestamp_bytes);
    full_bytes.extend_from_slice(&value_bytes);
    Ok(full_bytes)
}

/// Decode a record written by [`encode_record`].
///
/// Never panics, whatever the input.
pub fn decode_record<S: DeserializeOwned>(
    bytes: &[u8],
) -> Result<PersistedRecord<S>, PersistenceError> {
    if bytes.len() < TIMESTAMP_LEN {
        return Err(PersistenceError::Deserialization {
            reason: format!("record too short: {} bytes", bytes.len()),
        });
    }

    let (timestamp_bytes, value_bytes) = bytes.split_at(TIMESTAMP_LEN);
    let timestamp_bytes: [u8; TIMESTAMP_LEN] =
        timestamp_bytes
            .try_into()
            .map_err(|_| PersistenceError::Deserialization {
                reason: "invalid timestamp".to_string(),
            })?;
    let timestamp_millis = i64::from_le_bytes(timestamp_bytes);
    let persisted_at = DateTime::from_timestamp_millis(timestamp_millis).ok_or_else(|| {
        PersistenceError::Deserialization {
            reason: format!("timestamp out of range: {timestamp_millis}"),
        }
    })?;

    let state = serde_json::from_slice(value_bytes).map_err(|e| {
        PersistenceError::Deserialization {
            reason: e.to_string(),
        }
    })?;

    Ok(PersistedRecord {
        persisted_at,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use confluence_core::{DatasourceErrorType, DefaultLoadImpulseType, LoadImpulse, State};

    type StoredState = State<Vec<String>, String, DefaultLoadImpulseType, StoredError>;

    #[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Serialize, serde::Deserialize)]
    #[error("{0}")]
    struct StoredError(DatasourceErrorType);

    #[test]
    fn test_record_keeps_timestamp_and_state() {
        let persisted_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let state = StoredState::success(
            vec!["a".into(), "b".into()],
            LoadImpulse::initial("feed".to_string()),
        );

        let bytes = encode_record(&state, persisted_at).unwrap();
        assert_eq!(
            &bytes[..TIMESTAMP_LEN],
            &persisted_at.timestamp_millis().to_le_bytes()
        );

        let record: PersistedRecord<StoredState> = decode_record(&bytes).unwrap();
        assert_eq!(record.persisted_at, persisted_at);
        assert_eq!(record.state, state);
    }

    #[test]
    fn test_short_record_is_rejected() {
        let result = decode_record::<StoredState>(&[1, 2, 3]);
        assert!(matches!(
            result,
            Err(PersistenceError::Deserialization { .. })
        ));
    }

    #[test]
    fn test_corrupt_body_is_rejected() {
        let mut bytes = 0i64.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{not json");
        assert!(decode_record::<StoredState>(&bytes).is_err());
    }

    #[test]
    fn test_out_of_range_timestamp_is_rejected() {
        let mut bytes = i64::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(br#"{"case":"not_ready"}"#);
        assert!(decode_record::<StoredState>(&bytes).is_err());
    }
}
