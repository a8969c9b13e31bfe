use libmdbx::{Database, DatabaseOptions, WriteMap, WriteFlags, TableFlags};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("mdbx error: {0}")]
    Mdbx(#[from] libmdbx::Error),

    #[error("database mutex poisoned")]
    Poisoned,
}

/// A single row destined for `table`, committed together with its siblings
/// by [`SafeDatabase::commit`].
#[derive(Debug, Clone)]
pub struct TableWrite {
    pub table: &'static str,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl TableWrite {
    pub fn new(table: &'static str, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self { table, key: key.into(), value: value.into() }
    }
}

#[derive(Clone)]
pub struct InnerDatabase {
    db: Arc<Mutex<Database<WriteMap>>>,
}

pub trait SafeDatabase: Clone + Send + Sync + 'static {

    fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> where Self: Sized;

    fn write(&self, key: &str, value: &str, table: &str) -> Result<(), DbError>;

    fn read(&self, key: &str, table: &str) -> Result<Option<Vec<u8>>, DbError>;

    /// Every row of `table` in key order. Missing tables read as empty.
    fn read_all(&self, table: &str) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, DbError>;

    /// Writes rows spanning several tables in one read-write transaction.
    /// Either every row lands or none does.
    fn commit(&self, writes: &[TableWrite]) -> Result<(), DbError>;
}

impl InnerDatabase {
    fn lock(&self) -> Result<MutexGuard<'_, Database<WriteMap>>, DbError> {
        self.db.lock().map_err(|_| DbError::Poisoned)
    }
}


impl SafeDatabase for InnerDatabase {

    fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let mut options = DatabaseOptions::default();
        options.max_tables = Some(100);
        let db = Database::<WriteMap>::open_with_options(path, options)?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }


    fn write(&self, key: &str, value: &str, table: &str) -> Result<(), DbError> {
        let db = self.lock()?;
        let transaction = db.begin_rw_txn()?;
        let table = transaction.create_table(Some(table), TableFlags::default())?;

        transaction.put(&table, key, value, WriteFlags::default())?;
        transaction.commit()?;
        Ok(())
    }


    fn read(&self, key: &str, table: &str) -> Result<Option<Vec<u8>>, DbError> {
        let db = self.lock()?;
        let transaction = db.begin_ro_txn()?;

        if let Ok(table) = transaction.open_table(Some(table)) {
            let result = transaction.get(&table, key.as_bytes())?;
            return Ok(result);
        }

        Ok(None)
    }

    fn read_all(&self, table: &str) -> Result<BTreeMap<Vec<u8>, Vec<u8>>, DbError> {
        let mut map = BTreeMap::new();
        let db = self.lock()?;
        let transaction = db.begin_ro_txn()?;

        if let Ok(table) = transaction.open_table(Some(table)) {
            let mut cursor = transaction.cursor(&table)?;

            for item in cursor.iter::<Vec<u8>, Vec<u8>>() {
                let (key, value) = item?;
                map.insert(key, value);
            }
        }

        Ok(map)
    }


    fn commit(&self, writes: &[TableWrite]) -> Result<(), DbError> {
        let db = self.lock()?;
        let transaction = db.begin_rw_txn()?;

        for write in writes {
            let table = transaction.create_table(Some(write.table), TableFlags::default())?;
            transaction.put(&table, &write.key, &write.value, WriteFlags::default())?;
        }

        transaction.commit()?;
        Ok(())
    }
}


// NOTE: rows are decoded as owned Vec<u8>. Borrowed Cow rows would point into
// the mdbx map and dangle once the transaction drops.
