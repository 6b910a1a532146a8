//! Canonical stored shape for a delegation operation.

use serde::{Deserialize, Serialize};

/// A delegation as persisted in the store and served by the read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Globally unique id assigned by TzKT; primary identity for dedup.
    pub id: i64,

    /// ISO-8601 timestamp as delivered by the source. Doubles as the
    /// incremental fetch cursor.
    pub timestamp: String,

    /// Delegated amount in mutez, copied verbatim.
    pub amount: i64,

    /// Address of the delegating account.
    pub delegator: String,

    /// Block level of the operation, copied verbatim.
    pub level: i64,

    /// Calendar year derived from `timestamp` at translation time.
    /// Scopes reads and latest-record lookups.
    pub year: i32,
}
