use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tokio::sync::watch;

use crate::config::Config;
use crate::model::FavoriteRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS searchable (
    item_key TEXT PRIMARY KEY NOT NULL,
    item_type TEXT NOT NULL,
    searchable TEXT NOT NULL,
    launch_count INTEGER NOT NULL DEFAULT 0 CHECK (launch_count >= 0),
    pin_position INTEGER NOT NULL DEFAULT 0 CHECK (pin_position >= 0),
    hidden INTEGER NOT NULL DEFAULT 0 CHECK (hidden IN (0, 1)),
    weight REAL NOT NULL DEFAULT 0.0,
    CHECK (hidden = 0 OR pin_position = 0)
);
CREATE INDEX IF NOT EXISTS searchable_rank
    ON searchable (hidden, pin_position DESC, launch_count DESC, item_key);
";

const COLUMNS: &str =
    "item_key, item_type, searchable, launch_count, pin_position, hidden, weight";

/// Weights below this are not decayed any further.
const WEIGHT_FLOOR: f64 = 0.001;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create store directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Restricts a query to, or away from, a set of type tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeFilter {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoritesQuery {
    pub manually_sorted: bool,
    pub automatically_sorted: bool,
    pub frequently_used: bool,
    pub types: TypeFilter,
    pub limit: usize,
}

impl FavoritesQuery {
    pub fn pinned(types: TypeFilter, limit: usize) -> Self {
        Self {
            manually_sorted: true,
            automatically_sorted: true,
            frequently_used: false,
            types,
            limit,
        }
    }

    pub fn frequent(types: TypeFilter, limit: usize) -> Self {
        Self {
            manually_sorted: false,
            automatically_sorted: false,
            frequently_used: true,
            types,
            limit,
        }
    }
}

/// Persisted favorites table.
///
/// Every committed write that touches at least one row bumps a revision
/// counter; subscribers of [`FavoritesStore::subscribe`] use it as the
/// "pinned favorites changed" signal.
pub struct FavoritesStore {
    conn: Mutex<Connection>,
    revision: watch::Sender<u64>,
}

impl FavoritesStore {
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, StoreError> {
        Self::open_file(&cfg.index_db_path)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        let (revision, _) = watch::channel(0);
        Ok(Self {
            conn: Mutex::new(conn),
            revision,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.revision.receiver_count()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn get(&self, key: &str) -> Result<Option<FavoriteRecord>, StoreError> {
        let db = self.lock()?;
        let record = db
            .query_row(
                &format!("SELECT {COLUMNS} FROM searchable WHERE item_key = ?1"),
                params![key],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_many(&self, keys: &[String]) -> Result<Vec<FavoriteRecord>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {COLUMNS} FROM searchable WHERE item_key IN ({})",
            placeholders(keys.len())
        );
        self.select_records(&sql, keys.iter().cloned().map(Value::Text).collect())
    }

    /// Visible records matching any of the requested pin classes, ordered by
    /// pin position, then launch count, then key.
    pub fn query(&self, query: &FavoritesQuery) -> Result<Vec<FavoriteRecord>, StoreError> {
        let mut classes = Vec::with_capacity(3);
        if query.manually_sorted {
            classes.push("pin_position > 1");
        }
        if query.automatically_sorted {
            classes.push("pin_position = 1");
        }
        if query.frequently_used {
            classes.push("(pin_position = 0 AND launch_count > 0)");
        }
        if classes.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {COLUMNS} FROM searchable WHERE hidden = 0 AND ({})",
            classes.join(" OR ")
        );
        let mut values = Vec::new();
        push_type_filter(&mut sql, &mut values, &query.types);
        sql.push_str(" ORDER BY pin_position DESC, launch_count DESC, item_key ASC LIMIT ?");
        values.push(Value::Integer(query.limit as i64));

        self.select_records(&sql, values)
    }

    pub fn hidden_records(&self) -> Result<Vec<FavoriteRecord>, StoreError> {
        self.select_records(
            &format!("SELECT {COLUMNS} FROM searchable WHERE hidden = 1 ORDER BY item_key"),
            Vec::new(),
        )
    }

    pub fn hidden_keys(&self, types: &TypeFilter) -> Result<Vec<String>, StoreError> {
        let mut sql = "SELECT item_key FROM searchable WHERE hidden = 1".to_string();
        let mut values = Vec::new();
        push_type_filter(&mut sql, &mut values, types);
        sql.push_str(" ORDER BY item_key");
        self.select_keys(&sql, values)
    }

    pub fn is_pinned(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some_and(|record| record.is_pinned()))
    }

    pub fn is_hidden(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some_and(|record| record.hidden))
    }

    pub fn sort_by_relevance(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT item_key FROM searchable WHERE item_key IN ({}) AND launch_count > 0
             ORDER BY launch_count DESC, pin_position DESC, item_key ASC",
            placeholders(keys.len())
        );
        self.select_keys(&sql, keys.iter().cloned().map(Value::Text).collect())
    }

    pub fn sort_by_weight(&self, keys: &[String]) -> Result<Vec<String>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT item_key FROM searchable WHERE item_key IN ({})
             ORDER BY weight DESC, pin_position DESC, item_key ASC",
            placeholders(keys.len())
        );
        self.select_keys(&sql, keys.iter().cloned().map(Value::Text).collect())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let db = self.lock()?;
        let count: i64 = db.query_row("SELECT COUNT(*) FROM searchable", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn page(&self, limit: usize, offset: usize) -> Result<Vec<FavoriteRecord>, StoreError> {
        self.select_records(
            &format!("SELECT {COLUMNS} FROM searchable ORDER BY item_key LIMIT ?1 OFFSET ?2"),
            vec![Value::Integer(limit as i64), Value::Integer(offset as i64)],
        )
    }

    /// Inserts `record` unless its key already exists.
    pub fn insert_skip_existing(&self, record: &FavoriteRecord) -> Result<(), StoreError> {
        self.write(|tx| insert_or_ignore(tx, record))
    }

    /// Inserts or fully replaces `record`.
    pub fn upsert(&self, record: &FavoriteRecord) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                &format!(
                    "INSERT INTO searchable ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(item_key) DO UPDATE SET
                        item_type = excluded.item_type,
                        searchable = excluded.searchable,
                        launch_count = excluded.launch_count,
                        pin_position = excluded.pin_position,
                        hidden = excluded.hidden,
                        weight = excluded.weight"
                ),
                params_from_iter(record_params(record)),
            )
        })
    }

    /// Pins the item, keeping an existing manual position and launch count.
    pub fn pin(&self, record: &FavoriteRecord) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO searchable (item_key, item_type, searchable, pin_position, hidden)
                 VALUES (?1, ?2, ?3, 1, 0)
                 ON CONFLICT(item_key) DO UPDATE SET
                    item_type = excluded.item_type,
                    searchable = excluded.searchable,
                    pin_position = MAX(pin_position, 1),
                    hidden = 0",
                params![record.key, record.item_type, record.serialized],
            )
        })
    }

    pub fn unpin(&self, key: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "UPDATE searchable SET pin_position = 0 WHERE item_key = ?1 AND pin_position != 0",
                params![key],
            )
        })
    }

    pub fn hide(&self, record: &FavoriteRecord) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO searchable (item_key, item_type, searchable, pin_position, hidden)
                 VALUES (?1, ?2, ?3, 0, 1)
                 ON CONFLICT(item_key) DO UPDATE SET
                    item_type = excluded.item_type,
                    searchable = excluded.searchable,
                    pin_position = 0,
                    hidden = 1",
                params![record.key, record.item_type, record.serialized],
            )
        })
    }

    pub fn unhide(&self, key: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "UPDATE searchable SET hidden = 0 WHERE item_key = ?1 AND hidden = 1",
                params![key],
            )
        })
    }

    /// Records one launch: inserts the item if needed, bumps its launch count,
    /// pulls its weight toward 1 by `alpha` and decays every other weight.
    pub fn touch(&self, record: &FavoriteRecord, alpha: f64) -> Result<(), StoreError> {
        let alpha = alpha.clamp(0.0, 1.0);
        self.write(|tx| {
            tx.execute(
                "INSERT INTO searchable (item_key, item_type, searchable) VALUES (?1, ?2, ?3)
                 ON CONFLICT(item_key) DO UPDATE SET
                    item_type = excluded.item_type,
                    searchable = excluded.searchable",
                params![record.key, record.item_type, record.serialized],
            )?;
            tx.execute(
                "UPDATE searchable
                 SET launch_count = launch_count + 1, weight = weight + ?2 * (1.0 - weight)
                 WHERE item_key = ?1",
                params![record.key, alpha],
            )?;
            tx.execute(
                "UPDATE searchable SET weight = weight * (1.0 - ?2)
                 WHERE item_key != ?1 AND weight > ?3",
                params![record.key, alpha, WEIGHT_FLOOR],
            )?;
            Ok(1)
        })
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.write(|tx| tx.execute("DELETE FROM searchable WHERE item_key = ?1", params![key]))
    }

    pub fn reset_pin_and_launch_count(&self, key: &str) -> Result<(), StoreError> {
        self.write(|tx| {
            tx.execute(
                "UPDATE searchable SET pin_position = 0, launch_count = 0 WHERE item_key = ?1",
                params![key],
            )
        })
    }

    /// Replaces the whole pin layout in one transaction.
    ///
    /// Manual items get descending positions `len - index + 1` (all > 1),
    /// automatic items get position 1, everything else is unpinned. Launch
    /// counts and weights of existing rows survive.
    pub fn replace_pins(
        &self,
        manually_sorted: &[FavoriteRecord],
        automatically_sorted: &[FavoriteRecord],
    ) -> Result<(), StoreError> {
        self.write(|tx| {
            let mut changed = tx.execute("UPDATE searchable SET pin_position = 0", [])?;
            let total = manually_sorted.len();
            let layout = manually_sorted
                .iter()
                .enumerate()
                .map(|(index, record)| (record, (total - index + 1) as u32))
                .chain(automatically_sorted.iter().map(|record| (record, 1)));
            for (record, position) in layout {
                changed += tx.execute(
                    "INSERT INTO searchable (item_key, item_type, searchable, pin_position, hidden)
                     VALUES (?1, ?2, ?3, ?4, 0)
                     ON CONFLICT(item_key) DO UPDATE SET
                        item_type = excluded.item_type,
                        searchable = excluded.searchable,
                        pin_position = excluded.pin_position,
                        hidden = 0",
                    params![record.key, record.item_type, record.serialized, position],
                )?;
            }
            Ok(changed)
        })
    }

    /// Wipes the table and inserts `records`; duplicate keys keep the first.
    pub fn replace_all(&self, records: &[FavoriteRecord]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        self.write(|tx| {
            let wiped = tx.execute("DELETE FROM searchable", [])?;
            for record in records {
                inserted += insert_or_ignore(tx, record)?;
            }
            Ok(wiped + inserted)
        })?;
        Ok(inserted)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Runs `apply` in a transaction and bumps the revision when it reports
    /// at least one affected row.
    fn write<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let changed = {
            let mut db = self.lock()?;
            let tx = db.transaction()?;
            let changed = apply(&tx)?;
            tx.commit()?;
            changed
        };
        if changed > 0 {
            self.revision.send_modify(|revision| *revision += 1);
        }
        Ok(())
    }

    fn select_records(
        &self,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<Vec<FavoriteRecord>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn select_keys(&self, sql: &str, values: Vec<Value>) -> Result<Vec<String>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn insert_or_ignore(tx: &Transaction<'_>, record: &FavoriteRecord) -> rusqlite::Result<usize> {
    tx.execute(
        &format!(
            "INSERT INTO searchable ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(item_key) DO NOTHING"
        ),
        params_from_iter(record_params(record)),
    )
}

fn record_params(record: &FavoriteRecord) -> [Value; 7] {
    // A hidden row can never carry a pin position.
    let pin_position = if record.hidden { 0 } else { record.pin_position };
    [
        Value::Text(record.key.clone()),
        Value::Text(record.item_type.clone()),
        Value::Text(record.serialized.clone()),
        Value::Integer(record.launch_count as i64),
        Value::Integer(pin_position as i64),
        Value::Integer(record.hidden as i64),
        Value::Real(record.weight),
    ]
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FavoriteRecord> {
    Ok(FavoriteRecord {
        key: row.get(0)?,
        item_type: row.get(1)?,
        serialized: row.get(2)?,
        launch_count: row.get(3)?,
        pin_position: row.get(4)?,
        hidden: row.get(5)?,
        weight: row.get(6)?,
    })
}

fn push_type_filter(sql: &mut String, values: &mut Vec<Value>, filter: &TypeFilter) {
    match filter {
        TypeFilter::All => {}
        TypeFilter::Include(types) if types.is_empty() => sql.push_str(" AND 0"),
        TypeFilter::Include(types) => {
            sql.push_str(&format!(" AND item_type IN ({})", placeholders(types.len())));
            values.extend(types.iter().cloned().map(Value::Text));
        }
        TypeFilter::Exclude(types) if types.is_empty() => {}
        TypeFilter::Exclude(types) => {
            sql.push_str(&format!(" AND item_type NOT IN ({})", placeholders(types.len())));
            values.extend(types.iter().cloned().map(Value::Text));
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
