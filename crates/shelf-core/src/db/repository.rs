//! Record repository implementation

use crate::error::{Error, Result};
use crate::models::{Fields, Record, SyncStatus};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

const RECORD_COLUMNS: &str = "id, owner_id, fields, sync_status";

/// Trait for record storage operations
pub trait RecordRepository {
    /// List every record, ordered by id
    fn list_all(&self) -> Result<Vec<Record>>;

    /// Get a record by id
    fn get(&self, id: &str) -> Result<Option<Record>>;

    /// Insert a record, replacing any existing row with the same id
    fn upsert(&self, record: &Record) -> Result<()>;

    /// Replace an existing record; fails with `NotFound` when absent
    fn update(&self, record: &Record) -> Result<()>;

    /// Set the status of a record only if its stored row still matches
    /// `record` exactly. Returns whether the row was changed.
    fn set_status_if_unchanged(&self, record: &Record, status: SyncStatus) -> Result<bool>;

    /// Delete a record by id, returning whether a row was removed
    fn delete(&self, id: &str) -> Result<bool>;

    /// List records with exactly the given status
    fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Record>>;

    /// List records whose status differs from the given one
    fn list_by_status_not(&self, status: SyncStatus) -> Result<Vec<Record>>;

    /// List records belonging to an owner
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Record>>;

    /// Count records per status, omitting statuses with no records
    fn count_by_status(&self) -> Result<Vec<(SyncStatus, usize)>>;

    /// Ids starting with `prefix`, ordered, at most `limit` of them
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;
}

/// `SQLite` implementation of `RecordRepository`
pub struct SqliteRecordRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_records(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Parse a record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let raw_fields: String = row.get(2)?;
        let fields: Fields = serde_json::from_str(&raw_fields).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
        })?;

        let raw_status: i64 = row.get(3)?;
        let sync_status = SyncStatus::from_i64(raw_status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Integer,
                format!("unknown sync status {raw_status}").into(),
            )
        })?;

        Ok(Record {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            fields,
            sync_status,
        })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn list_all(&self) -> Result<Vec<Record>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM records ORDER BY id"),
            [],
        )
    }

    fn get(&self, id: &str) -> Result<Option<Record>> {
        let result = self.conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?"),
            params![id],
            Self::parse_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, record: &Record) -> Result<()> {
        record.validate()?;
        let fields = serde_json::to_string(&record.fields)?;

        self.conn.execute(
            "INSERT INTO records (id, owner_id, fields, sync_status) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                fields = excluded.fields,
                sync_status = excluded.sync_status",
            params![
                record.id,
                record.owner_id,
                fields,
                record.sync_status.as_i64()
            ],
        )?;

        Ok(())
    }

    fn update(&self, record: &Record) -> Result<()> {
        record.validate()?;
        let fields = serde_json::to_string(&record.fields)?;

        let rows = self.conn.execute(
            "UPDATE records SET owner_id = ?, fields = ?, sync_status = ? WHERE id = ?",
            params![
                record.owner_id,
                fields,
                record.sync_status.as_i64(),
                record.id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(record.id.clone()));
        }

        Ok(())
    }

    fn set_status_if_unchanged(&self, record: &Record, status: SyncStatus) -> Result<bool> {
        let fields = serde_json::to_string(&record.fields)?;

        let rows = self.conn.execute(
            "UPDATE records SET sync_status = ?
             WHERE id = ? AND owner_id = ? AND fields = ? AND sync_status = ?",
            params![
                status.as_i64(),
                record.id,
                record.owner_id,
                fields,
                record.sync_status.as_i64()
            ],
        )?;

        Ok(rows > 0)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM records WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }

    fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Record>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE sync_status = ? ORDER BY id"),
            params![status.as_i64()],
        )
    }

    fn list_by_status_not(&self, status: SyncStatus) -> Result<Vec<Record>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE sync_status != ? ORDER BY id"),
            params![status.as_i64()],
        )
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Record>> {
        self.query_records(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE owner_id = ? ORDER BY id"),
            params![owner_id],
        )
    }

    fn count_by_status(&self) -> Result<Vec<(SyncStatus, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT sync_status, COUNT(*) FROM records GROUP BY sync_status ORDER BY sync_status",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, usize>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(counts
            .into_iter()
            .filter_map(|(status, count)| SyncStatus::from_i64(status).map(|s| (s, count)))
            .collect())
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id FROM records WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![prefix, limit], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
