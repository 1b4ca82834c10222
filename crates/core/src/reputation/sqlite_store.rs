//! SQLite-backed reputation store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::store::ReputationStore;
use super::types::{
    ReputationError, ReputationRecord, UserFilter, UserPage, UserStats, UserStatus,
};

const COLUMNS: &str = "id, username, status, success_count, failure_count, average_speed, \
                       total_bytes, quality_score, notes, last_seen_at, created_at, updated_at";

/// SQLite-backed reputation store.
pub struct SqliteReputationStore {
    conn: Mutex<Connection>,
}

impl SqliteReputationStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, ReputationError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, ReputationError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ReputationError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS uploaders (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'neutral',
                success_count INTEGER NOT NULL DEFAULT 0,
                failure_count INTEGER NOT NULL DEFAULT 0,
                average_speed INTEGER NOT NULL DEFAULT 0,
                total_bytes INTEGER NOT NULL DEFAULT 0,
                quality_score INTEGER NOT NULL DEFAULT 0,
                notes TEXT,
                last_seen_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_uploaders_status ON uploaders(status);
            CREATE INDEX IF NOT EXISTS idx_uploaders_last_seen ON uploaders(last_seen_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ReputationError> {
        self.conn
            .lock()
            .map_err(|_| ReputationError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &UserFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref search) = filter.search {
            conditions.push("username LIKE ?");
            params.push(Box::new(format!("%{}%", search.to_lowercase())));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ReputationRecord> {
        let status: String = row.get(2)?;
        let last_seen_at: String = row.get(9)?;
        let created_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;

        Ok(ReputationRecord {
            id: row.get(0)?,
            username: row.get(1)?,
            // Unknown values can only come from manual edits; treat as neutral.
            status: status.parse().unwrap_or(UserStatus::Neutral),
            success_count: row.get::<_, i64>(3)?.max(0) as u32,
            failure_count: row.get::<_, i64>(4)?.max(0) as u32,
            average_speed: row.get::<_, i64>(5)?.max(0) as u64,
            total_bytes: row.get::<_, i64>(6)?.max(0) as u64,
            quality_score: row.get::<_, i64>(7)?.clamp(0, 100) as u32,
            notes: row.get(8)?,
            last_seen_at: parse_timestamp(&last_seen_at),
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn query_by_username(
        conn: &Connection,
        username: &str,
    ) -> Result<Option<ReputationRecord>, ReputationError> {
        let sql = format!("SELECT {} FROM uploaders WHERE username = ?", COLUMNS);
        Ok(conn
            .query_row(&sql, params![username], Self::row_to_record)
            .optional()?)
    }

    fn query_by_id(conn: &Connection, id: &str) -> Result<Option<ReputationRecord>, ReputationError> {
        let sql = format!("SELECT {} FROM uploaders WHERE id = ?", COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_record)
            .optional()?)
    }

    fn write_record(conn: &Connection, r: &ReputationRecord) -> Result<(), ReputationError> {
        conn.execute(
            r#"
            INSERT INTO uploaders (id, username, status, success_count, failure_count,
                average_speed, total_bytes, quality_score, notes, last_seen_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                success_count = excluded.success_count,
                failure_count = excluded.failure_count,
                average_speed = excluded.average_speed,
                total_bytes = excluded.total_bytes,
                quality_score = excluded.quality_score,
                notes = excluded.notes,
                last_seen_at = excluded.last_seen_at,
                updated_at = excluded.updated_at
            "#,
            params![
                r.id,
                r.username,
                r.status.as_str(),
                r.success_count as i64,
                r.failure_count as i64,
                r.average_speed.min(i64::MAX as u64) as i64,
                r.total_bytes.min(i64::MAX as u64) as i64,
                r.quality_score as i64,
                r.notes,
                format_timestamp(&r.last_seen_at),
                format_timestamp(&r.created_at),
                format_timestamp(&r.updated_at),
            ],
        )?;
        Ok(())
    }
}

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ReputationStore for SqliteReputationStore {
    fn get(&self, id: &str) -> Result<Option<ReputationRecord>, ReputationError> {
        let conn = self.lock()?;
        Self::query_by_id(&conn, id)
    }

    fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ReputationRecord>, ReputationError> {
        let conn = self.lock()?;
        Self::query_by_username(&conn, username)
    }

    fn find_or_create(&self, username: &str) -> Result<ReputationRecord, ReputationError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(existing) = Self::query_by_username(&tx, username)? {
            return Ok(existing);
        }

        let record = ReputationRecord::new(username);
        Self::write_record(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    fn upsert_with(
        &self,
        username: &str,
        update: &mut dyn FnMut(&mut ReputationRecord),
    ) -> Result<ReputationRecord, ReputationError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut record = Self::query_by_username(&tx, username)?
            .unwrap_or_else(|| ReputationRecord::new(username));
        update(&mut record);
        record.updated_at = Utc::now();

        Self::write_record(&tx, &record)?;
        tx.commit()?;
        Ok(record)
    }

    fn update_status(
        &self,
        id: &str,
        status: UserStatus,
        notes: Option<&str>,
    ) -> Result<Option<ReputationRecord>, ReputationError> {
        let conn = self.lock()?;
        let now = format_timestamp(&Utc::now());

        let changed = match notes {
            Some(notes) => conn.execute(
                "UPDATE uploaders SET status = ?, notes = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), notes, now, id],
            )?,
            None => conn.execute(
                "UPDATE uploaders SET status = ?, updated_at = ? WHERE id = ?",
                params![status.as_str(), now, id],
            )?,
        };

        if changed == 0 {
            return Ok(None);
        }
        Self::query_by_id(&conn, id)
    }

    fn bulk_update_status(
        &self,
        ids: &[String],
        status: UserStatus,
    ) -> Result<usize, ReputationError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE uploaders SET status = ?, updated_at = ? WHERE id IN ({})",
            placeholders
        );

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(status.as_str()),
            Box::new(format_timestamp(&Utc::now())),
        ];
        for id in ids {
            all_params.push(Box::new(id.clone()));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        Ok(conn.execute(&sql, param_refs.as_slice())?)
    }

    fn delete(&self, id: &str) -> Result<bool, ReputationError> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM uploaders WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    fn usernames_with_status(&self, status: UserStatus) -> Result<Vec<String>, ReputationError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT username FROM uploaders WHERE status = ? ORDER BY username")?;
        let rows = stmt.query_map(params![status.as_str()], |row| row.get::<_, String>(0))?;

        let mut usernames = Vec::new();
        for row in rows {
            usernames.push(row?);
        }
        Ok(usernames)
    }

    fn list(&self, filter: &UserFilter) -> Result<UserPage, ReputationError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM uploaders {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = conn.query_row(&count_sql, param_refs.as_slice(), |row| row.get(0))?;

        let sql = format!(
            "SELECT {} FROM uploaders {} ORDER BY last_seen_at DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        // Build parameter slice with limit and offset
        let mut all_params = params;
        all_params.push(Box::new(filter.limit as i64));
        all_params.push(Box::new(filter.offset as i64));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_record)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }

        Ok(UserPage {
            items,
            total: total.max(0) as u64,
        })
    }

    fn stats(&self) -> Result<UserStats, ReputationError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM uploaders GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = UserStats::default();
        for row in rows {
            let (status, count) = row?;
            let count = count.max(0) as u64;
            stats.total += count;
            match status.parse::<UserStatus>() {
                Ok(UserStatus::Trusted) => stats.trusted += count,
                Ok(UserStatus::Flagged) => stats.flagged += count,
                Ok(UserStatus::Blocked) => stats.blocked += count,
                _ => stats.neutral += count,
            }
        }
        Ok(stats)
    }
}
