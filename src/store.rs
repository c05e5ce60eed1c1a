use crate::pipeline::NewUser;
use crate::report::AgeDistribution;
use crate::IngestResult;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        name            TEXT    NOT NULL,
        age             INTEGER NOT NULL,
        address         TEXT,
        additional_info TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_users_age ON users (age);
"#;

/// SQLite-backed `users` table.
///
/// Clones share one connection, so a clone can be moved onto the blocking
/// pool while the caller keeps reading from the original.
#[derive(Clone)]
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
}

impl UserStore {
    /// Open (creating if needed) a database file and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> IngestResult<Self> {
        let path = path.as_ref();
        info!("opening database {}", path.display());
        let store = Self::from_connection(Connection::open(path)?);
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> IngestResult<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.ensure_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ensure_schema(&self) -> IngestResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert all users in one transaction.
    pub fn insert_users(&self, users: &[NewUser]) -> IngestResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO users (name, age, address, additional_info) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for user in users {
                stmt.execute(params![
                    user.name,
                    user.age,
                    user.address.as_ref().map(|v| v.to_string()),
                    user.additional_info.as_ref().map(|v| v.to_string()),
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = users.len(), "committed users batch");
        Ok(users.len())
    }

    pub fn count(&self) -> IngestResult<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Rows per age band, indexed by [`AgeBand::index`](crate::report::AgeBand::index).
    pub fn age_band_counts(&self) -> IngestResult<[u64; 4]> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT CASE
                 WHEN age < 20 THEN 0
                 WHEN age <= 40 THEN 1
                 WHEN age <= 60 THEN 2
                 ELSE 3
             END AS band,
             COUNT(*)
             FROM users
             GROUP BY band",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = [0u64; 4];
        for row in rows {
            let (band, count) = row?;
            if let Some(slot) = counts.get_mut(band as usize) {
                *slot = count as u64;
            }
        }
        Ok(counts)
    }

    pub fn age_distribution(&self) -> IngestResult<AgeDistribution> {
        let dist = AgeDistribution::from_counts(self.age_band_counts()?);
        if dist.total == 0 {
            info!("No user data to report.");
        }
        Ok(dist)
    }

    /// Stored `(name, age, address, additional_info)` rows in insertion order.
    pub fn users(&self) -> IngestResult<Vec<NewUser>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT name, age, address, additional_info FROM users ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut users = Vec::new();
        for row in rows {
            let (name, age, address, additional_info) = row?;
            users.push(NewUser {
                name,
                age,
                address: address.map(|s| serde_json::from_str(&s)).transpose()?,
                additional_info: additional_info
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?,
            });
        }
        Ok(users)
    }
}
