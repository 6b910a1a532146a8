//! Delegation repository - SQLite persistence for delegation records.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, ServiceError};
use crate::model::Delegation;

/// Fixed page size for read-side queries.
pub const PAGE_LIMIT: u32 = 50;

/// Capability interface over the durable delegation store.
pub trait DelegationRepository: Send + Sync {
    /// Insert a batch in one transaction. Records whose `id` already
    /// exists are silently skipped; the first write wins.
    fn insert_batch(&self, delegations: &[Delegation]) -> Result<()>;

    /// Most recent delegation for the given year, or None.
    fn latest_delegation(&self, year: i32) -> Result<Option<Delegation>>;

    /// One page of delegations for the given year, newest first.
    fn delegations_page(&self, year: i32, offset: u32) -> Result<Vec<Delegation>>;
}

/// SQLite-backed repository. The connection is serialized behind a
/// mutex; the poller and the API handlers share it.
pub struct SqliteRepository {
    db: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Connection::open(path.as_ref())
            .map_err(|e| ServiceError::Database(format!("Failed to open database: {}", e)))?;
        let repo = Self { db: Mutex::new(db) };
        repo.init_schema()?;
        Ok(repo)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| ServiceError::Database(format!("Failed to open database: {}", e)))?;
        let repo = Self { db: Mutex::new(db) };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().unwrap();

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS delegations (
                id INTEGER PRIMARY KEY,
                timestamp TEXT NOT NULL,
                amount INTEGER NOT NULL,
                delegator TEXT NOT NULL,
                level INTEGER NOT NULL,
                year INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| ServiceError::Database(format!("Failed to create table: {}", e)))?;

        // Serves both the newest-first page query and the latest-record lookup
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_year_timestamp_desc \
             ON delegations (year, timestamp DESC)",
            [],
        )
        .map_err(|e| ServiceError::Database(format!("Failed to create index: {}", e)))?;

        Ok(())
    }
}

fn row_to_delegation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Delegation> {
    Ok(Delegation {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        amount: row.get(2)?,
        delegator: row.get(3)?,
        level: row.get(4)?,
        year: row.get(5)?,
    })
}

impl DelegationRepository for SqliteRepository {
    fn insert_batch(&self, delegations: &[Delegation]) -> Result<()> {
        if delegations.is_empty() {
            return Ok(());
        }

        let mut db = self.db.lock().unwrap();
        let tx = db
            .transaction()
            .map_err(|e| ServiceError::Database(format!("Failed to start transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO delegations \
                     (id, timestamp, amount, delegator, level, year) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(|e| ServiceError::Database(format!("Failed to prepare insert: {}", e)))?;

            for d in delegations {
                stmt.execute(params![
                    d.id,
                    d.timestamp,
                    d.amount,
                    d.delegator,
                    d.level,
                    d.year
                ])
                .map_err(|e| {
                    ServiceError::Database(format!("Failed to insert delegation {}: {}", d.id, e))
                })?;
            }
        }

        tx.commit()
            .map_err(|e| ServiceError::Database(format!("Failed to commit batch: {}", e)))
    }

    fn latest_delegation(&self, year: i32) -> Result<Option<Delegation>> {
        let db = self.db.lock().unwrap();

        db.query_row(
            "SELECT id, timestamp, amount, delegator, level, year \
             FROM delegations WHERE year = ?1 \
             ORDER BY timestamp DESC LIMIT 1",
            params![year],
            row_to_delegation,
        )
        .optional()
        .map_err(|e| ServiceError::Database(format!("Failed to load latest delegation: {}", e)))
    }

    fn delegations_page(&self, year: i32, offset: u32) -> Result<Vec<Delegation>> {
        let db = self.db.lock().unwrap();

        let mut stmt = db
            .prepare(
                "SELECT id, timestamp, amount, delegator, level, year \
                 FROM delegations WHERE year = ?1 \
                 ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| ServiceError::Database(format!("Failed to prepare page query: {}", e)))?;

        let rows = stmt
            .query_map(params![year, PAGE_LIMIT, offset], row_to_delegation)
            .map_err(|e| ServiceError::Database(format!("Failed to load delegations: {}", e)))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| ServiceError::Database(format!("Failed to read delegation row: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegation(id: i64, timestamp: &str, amount: i64, year: i32) -> Delegation {
        Delegation {
            id,
            timestamp: timestamp.to_string(),
            amount,
            delegator: format!("tz1delegator{}", id),
            level: id * 10,
            year,
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.insert_batch(&[
            delegation(1, "2023-01-01T00:00:00Z", 100, 2023),
            delegation(2, "2023-01-01T01:00:00Z", 200, 2023),
        ])
        .unwrap();

        let page = repo.delegations_page(2023, 0).unwrap();
        assert_eq!(page.len(), 2);
        // Newest first
        assert_eq!(page[0].id, 2);
        assert_eq!(page[1].id, 1);
    }

    #[test]
    fn test_insert_duplicate_id_first_write_wins() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.insert_batch(&[delegation(1, "2023-01-01T00:00:00Z", 100, 2023)])
            .unwrap();

        // Same id, contradictory payload: must be a no-op, not an error
        repo.insert_batch(&[delegation(1, "2023-06-01T00:00:00Z", 999, 2023)])
            .unwrap();

        let page = repo.delegations_page(2023, 0).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].amount, 100);
        assert_eq!(page[0].timestamp, "2023-01-01T00:00:00Z");
    }

    #[test]
    fn test_duplicate_inside_one_batch() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.insert_batch(&[
            delegation(1, "2023-01-01T00:00:00Z", 100, 2023),
            delegation(1, "2023-01-01T00:00:00Z", 500, 2023),
        ])
        .unwrap();

        let page = repo.delegations_page(2023, 0).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].amount, 100);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.insert_batch(&[]).unwrap();
        assert!(repo.delegations_page(2023, 0).unwrap().is_empty());
    }

    #[test]
    fn test_latest_delegation_scoped_by_year() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.insert_batch(&[
            delegation(1, "2022-12-31T23:00:00Z", 100, 2022),
            delegation(2, "2023-01-01T00:00:00Z", 200, 2023),
            delegation(3, "2023-03-01T00:00:00Z", 300, 2023),
        ])
        .unwrap();

        let latest_2023 = repo.latest_delegation(2023).unwrap().unwrap();
        assert_eq!(latest_2023.id, 3);

        let latest_2022 = repo.latest_delegation(2022).unwrap().unwrap();
        assert_eq!(latest_2022.id, 1);

        assert!(repo.latest_delegation(2019).unwrap().is_none());
    }

    #[test]
    fn test_page_limit_and_offset() {
        let repo = SqliteRepository::in_memory().unwrap();
        let batch: Vec<Delegation> = (0..60)
            .map(|i| {
                delegation(
                    i + 1,
                    &format!("2023-01-01T{:02}:{:02}:00Z", i / 60, i % 60),
                    100,
                    2023,
                )
            })
            .collect();
        repo.insert_batch(&batch).unwrap();

        let first = repo.delegations_page(2023, 0).unwrap();
        assert_eq!(first.len(), PAGE_LIMIT as usize);
        // Newest first: highest timestamp leads
        assert_eq!(first[0].id, 60);

        let second = repo.delegations_page(2023, PAGE_LIMIT).unwrap();
        assert_eq!(second.len(), 10);
        assert_eq!(second[9].id, 1);
    }
}
