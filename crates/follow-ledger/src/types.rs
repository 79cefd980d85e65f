//! Ledger value types: user identifiers and follow records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Remote account identifier, used as the ledger key.
///
/// Owned and ordered so the ledger never depends on the identity contract of
/// whatever type the social API hands back.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One tracked follow relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// When the account was followed (naive local time, ISO-8601 on disk).
    pub followed_at: NaiveDateTime,
    /// When the follow was reversed. Omitted from text formats while unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unfollowed_at: Option<NaiveDateTime>,
}

impl Record {
    pub fn followed(at: NaiveDateTime) -> Self {
        Self {
            followed_at: at,
            unfollowed_at: None,
        }
    }

    /// A record without `unfollowed_at` is still being followed.
    pub fn is_active(&self) -> bool {
        self.unfollowed_at.is_none()
    }
}

/// The full in-memory mapping held by a store.
pub type Records = BTreeMap<UserId, Record>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn active_until_unfollowed() {
        let mut record = Record::followed(ts(2024, 1, 1));
        assert!(record.is_active());
        record.unfollowed_at = Some(ts(2024, 2, 1));
        assert!(!record.is_active());
    }

    #[test]
    fn unset_unfollowed_at_is_omitted() {
        let json = serde_json::to_string(&Record::followed(ts(2024, 1, 1))).unwrap();
        assert_eq!(json, r#"{"followed_at":"2024-01-01T00:00:00"}"#);
    }

    #[test]
    fn parses_isoformat_with_microseconds() {
        let record: Record =
            serde_json::from_str(r#"{"followed_at":"2020-05-17T14:03:22.123456"}"#).unwrap();
        assert_eq!(
            record.followed_at.format("%H:%M:%S%.6f").to_string(),
            "14:03:22.123456"
        );
        assert!(record.is_active());
    }

    #[test]
    fn user_id_is_transparent_and_borrowable() {
        let mut records = Records::new();
        records.insert(UserId::from("42"), Record::followed(ts(2024, 1, 1)));
        assert!(records.contains_key("42"));
        assert_eq!(serde_json::to_string(&UserId::from("42")).unwrap(), "\"42\"");
    }
}
