use crate::error::NestError;
use crate::record::{Record, RecordDoc};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeMap;
use std::path::Path;

/// A keyed table of node records. `insert` must fail with
/// [`NestError::Conflict`] when the key is already present.
pub trait Table {
    fn insert(&mut self, record: Record) -> Result<(), NestError>;
    fn update(&mut self, record: Record) -> Result<(), NestError>;
    fn get(&self, k: &str) -> Result<Option<Record>, NestError>;
    fn len(&self) -> Result<usize, NestError>;
    fn commit(&mut self) -> Result<(), NestError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Insert by identity, falling back to an update on a duplicate key.
pub fn upsert<T: Table + ?Sized>(table: &mut T, record: Record) -> Result<Upsert, NestError> {
    match table.insert(record.clone()) {
        Ok(()) => Ok(Upsert::Inserted),
        Err(NestError::Conflict(_)) => {
            table.update(record)?;
            Ok(Upsert::Updated)
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: BTreeMap<String, Record>,
    pub commits: usize,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Table for MemoryTable {
    fn insert(&mut self, record: Record) -> Result<(), NestError> {
        if self.rows.contains_key(&record.k) {
            return Err(NestError::Conflict(record.k));
        }
        self.rows.insert(record.k.clone(), record);
        Ok(())
    }

    fn update(&mut self, record: Record) -> Result<(), NestError> {
        match self.rows.get_mut(&record.k) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(NestError::RecordNotFound(record.k)),
        }
    }

    fn get(&self, k: &str) -> Result<Option<Record>, NestError> {
        Ok(self.rows.get(k).cloned())
    }

    fn len(&self) -> Result<usize, NestError> {
        Ok(self.rows.len())
    }

    fn commit(&mut self) -> Result<(), NestError> {
        self.commits += 1;
        Ok(())
    }
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

type RawRow = (String, String, String, i64, String);

/// SQLite-backed table named after the module: `k` is the primary key,
/// `type`, `val` and `ref` carry secondary indexes. Writes run inside one
/// open transaction until `commit`.
#[derive(Debug)]
pub struct SqlTable {
    conn: Connection,
    name: String,
    in_transaction: bool,
}

impl SqlTable {
    pub fn open(path: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open datastore: {}", path.display()))?;
        Self::with_connection(conn, name)
    }

    pub fn in_memory(name: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, name)
    }

    fn with_connection(conn: Connection, name: &str) -> Result<Self> {
        if !valid_table_name(name) {
            anyhow::bail!("Invalid table name: {:?}", name);
        }
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (
                k CHAR(8) PRIMARY KEY,
                type VARCHAR(32),
                val TEXT,
                ref INT,
                v JSON
            );
            CREATE INDEX IF NOT EXISTS idx_{name}_type ON {name}(type);
            CREATE INDEX IF NOT EXISTS idx_{name}_val ON {name}(val);
            CREATE INDEX IF NOT EXISTS idx_{name}_ref ON {name}(ref);"
        ))
        .with_context(|| format!("Failed to create table {}", name))?;

        Ok(Self {
            conn,
            name: name.to_string(),
            in_transaction: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn begin(&mut self) -> Result<(), NestError> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn decode(raw: RawRow) -> Result<Record, NestError> {
        let (k, ty, val, refs, v) = raw;
        let v: RecordDoc = serde_json::from_str(&v)?;
        Ok(Record {
            k,
            ty,
            val,
            refs: u64::try_from(refs).unwrap_or_default(),
            v,
        })
    }

    fn select(&self, filter: &str, arg: &str) -> Result<Vec<Record>, NestError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT k, type, val, ref, v FROM {} WHERE {} ORDER BY k",
            self.name, filter
        ))?;
        let rows = stmt
            .query_map(params![arg], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<Result<Vec<RawRow>, _>>()?;
        rows.into_iter().map(Self::decode).collect()
    }

    pub fn by_type(&self, ty: &str) -> Result<Vec<Record>, NestError> {
        self.select("type = ?1", ty)
    }

    pub fn by_val_prefix(&self, prefix: &str) -> Result<Vec<Record>, NestError> {
        self.select("substr(val, 1, length(?1)) = ?1", prefix)
    }
}

impl Table for SqlTable {
    fn insert(&mut self, record: Record) -> Result<(), NestError> {
        self.begin()?;
        let v = record.to_json()?;
        let result = self.conn.execute(
            &format!(
                "INSERT INTO {} (k, type, val, ref, v) VALUES (?1, ?2, ?3, ?4, ?5)",
                self.name
            ),
            params![record.k, record.ty, record.val, record.refs as i64, v],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_primary_key_violation(&e) => Err(NestError::Conflict(record.k)),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&mut self, record: Record) -> Result<(), NestError> {
        self.begin()?;
        let v = record.to_json()?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET type = ?2, val = ?3, ref = ?4, v = ?5 WHERE k = ?1",
                self.name
            ),
            params![record.k, record.ty, record.val, record.refs as i64, v],
        )?;
        if changed == 0 {
            return Err(NestError::RecordNotFound(record.k));
        }
        Ok(())
    }

    fn get(&self, k: &str) -> Result<Option<Record>, NestError> {
        let raw: Option<RawRow> = self
            .conn
            .query_row(
                &format!("SELECT k, type, val, ref, v FROM {} WHERE k = ?1", self.name),
                params![k],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;
        raw.map(Self::decode).transpose()
    }

    fn len(&self) -> Result<usize, NestError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.name),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn commit(&mut self) -> Result<(), NestError> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }
}
