//! Record translator - maps raw TzKT responses into the stored shape.

use chrono::{DateTime, Datelike};

use crate::error::{Result, ServiceError};
use crate::model::Delegation;
use crate::transport::RawDelegation;

/// Derive the calendar-year partition key from an ISO-8601 timestamp.
/// Strict RFC 3339 parsing; a malformed timestamp is a `Parse` error.
pub fn partition_year(timestamp: &str) -> Result<i32> {
    let parsed = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| ServiceError::Parse(format!("Invalid timestamp {:?}: {}", timestamp, e)))?;
    Ok(parsed.year())
}

/// Translate a single raw record. Pure function, no side effects.
pub fn translate(raw: &RawDelegation) -> Result<Delegation> {
    let year = partition_year(&raw.timestamp)?;
    Ok(Delegation {
        id: raw.id,
        timestamp: raw.timestamp.clone(),
        amount: raw.amount,
        delegator: raw.sender.address.clone(),
        level: raw.level,
        year,
    })
}

/// Translate a whole batch, aborting on the first malformed record.
/// A batch with an unparseable timestamp is never partially applied.
pub fn translate_batch(raw: &[RawDelegation]) -> Result<Vec<Delegation>> {
    raw.iter().map(translate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Sender;

    fn raw(id: i64, timestamp: &str) -> RawDelegation {
        RawDelegation {
            id,
            timestamp: timestamp.to_string(),
            amount: 1000,
            sender: Sender {
                address: "tz1abc".to_string(),
            },
            level: 100,
        }
    }

    #[test]
    fn test_partition_year() {
        assert_eq!(partition_year("2023-01-01T00:00:00Z").unwrap(), 2023);
        assert_eq!(partition_year("2018-12-31T23:59:59Z").unwrap(), 2018);
        // Offset timestamps parse too; the year is taken as written
        assert_eq!(partition_year("2021-06-15T10:30:00+02:00").unwrap(), 2021);
    }

    #[test]
    fn test_partition_year_rejects_malformed() {
        assert!(partition_year("not-a-timestamp").is_err());
        assert!(partition_year("2023-01-01").is_err());
        assert!(partition_year("").is_err());
    }

    #[test]
    fn test_translate_copies_fields_verbatim() {
        let delegation = translate(&raw(42, "2023-05-01T12:00:00Z")).unwrap();
        assert_eq!(delegation.id, 42);
        assert_eq!(delegation.timestamp, "2023-05-01T12:00:00Z");
        assert_eq!(delegation.amount, 1000);
        assert_eq!(delegation.delegator, "tz1abc");
        assert_eq!(delegation.level, 100);
        assert_eq!(delegation.year, 2023);
    }

    #[test]
    fn test_translate_batch_aborts_on_first_parse_error() {
        let batch = vec![
            raw(1, "2023-01-01T00:00:00Z"),
            raw(2, "garbage"),
            raw(3, "2023-01-01T02:00:00Z"),
        ];
        let result = translate_batch(&batch);
        assert!(matches!(result, Err(ServiceError::Parse(_))));
    }

    #[test]
    fn test_translate_batch_preserves_order() {
        let batch = vec![raw(1, "2023-01-01T00:00:00Z"), raw(2, "2023-01-01T01:00:00Z")];
        let translated = translate_batch(&batch).unwrap();
        assert_eq!(translated.len(), 2);
        assert_eq!(translated[0].id, 1);
        assert_eq!(translated[1].id, 2);
    }
}
