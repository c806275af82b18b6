//! Record envelopes and record identifiers.

use crate::value::Fields;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Prefix shared by every record id.
pub const RECORD_ID_PREFIX: &str = "rec";

/// Number of random characters after the prefix.
pub const RECORD_ID_SUFFIX_LEN: usize = 14;

/// Generate a fresh record id: `rec` followed by 14 random alphanumerics.
pub fn generate_record_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECORD_ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", RECORD_ID_PREFIX, suffix)
}

/// Whether `value` has the shape of a record id.
pub fn is_record_id(value: &str) -> bool {
    match value.strip_prefix(RECORD_ID_PREFIX) {
        Some(suffix) => {
            suffix.len() == RECORD_ID_SUFFIX_LEN && suffix.bytes().all(|b| b.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// A record in external form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub fields: Fields,
}

/// Acknowledgement for a deleted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    pub deleted: bool,
}

impl DeletedRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deleted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generated_ids_have_record_shape() {
        for _ in 0..100 {
            let id = generate_record_id();
            assert_eq!(id.len(), 17);
            assert!(is_record_id(&id), "{id}");
        }
    }

    #[test]
    fn test_is_record_id() {
        assert!(is_record_id("recABCDEFGHIJ1234"));
        assert!(!is_record_id("recABC"));
        assert!(!is_record_id("R-001"));
        assert!(!is_record_id("usrABCDEFGHIJ1234"));
        assert!(!is_record_id("recABCDEFGHIJ12-4"));
    }

    #[test]
    fn test_record_envelope_shape() {
        let record = Record {
            id: "recABCDEFGHIJ1234".into(),
            created_time: Some("2024-01-01T00:00:00.000Z".into()),
            fields: Fields::new().with("Name", "x"),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": "recABCDEFGHIJ1234",
                "createdTime": "2024-01-01T00:00:00.000Z",
                "fields": {"Name": "x"}
            })
        );
    }
}
