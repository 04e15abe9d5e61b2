//! # Table Facade
//!
//! The user-facing surface: a `Table` composes a schema store and a page
//! manager over one table directory, and wires the ingest parser to bulk
//! insertion. All three on-disk artifacts (`schema.dat`,
//! `pagedirectory.dat`, `pages.dat`) live under the directory the table is
//! opened on.
//!
//! A table must be initialized before use; [`Table::open`] does so in one
//! step for the filesystem-backed case. Operations on an uninitialized
//! table fail with `NotInitialized`.

use std::path::{Path, PathBuf};

use eyre::{bail, Result, WrapErr};
use tracing::info;

use crate::error::StorageError;
use crate::parsing;
use crate::schema::SchemaStore;
use crate::storage::{BlobStore, FileBlobStore, PageManager, RowLocation};
use crate::types::Column;

/// An append-only table bound to a directory on a [`BlobStore`].
#[derive(Debug)]
pub struct Table<S: BlobStore + Clone = FileBlobStore> {
    dir: PathBuf,
    schema: SchemaStore<S>,
    page_manager: PageManager<S>,
    initialized: bool,
}

impl Table<FileBlobStore> {
    /// Opens (creating if necessary) a filesystem-backed table at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let mut table = Self::new(dir.as_ref(), FileBlobStore::new());
        table.initialize()?;
        Ok(table)
    }
}

impl<S: BlobStore + Clone> Table<S> {
    /// Binds a table to `dir` on `storage`. No I/O happens until
    /// [`Table::initialize`].
    pub fn new(dir: &Path, storage: S) -> Self {
        Self {
            schema: SchemaStore::new(dir, storage.clone()),
            page_manager: PageManager::new(dir, storage),
            dir: dir.to_path_buf(),
            initialized: false,
        }
    }

    /// Initializes the schema store and the page manager. Both must succeed
    /// before the table is usable.
    pub fn initialize(&mut self) -> Result<()> {
        info!(dir = %self.dir.display(), "initializing table");
        self.schema
            .initialize()
            .wrap_err("failed to initialize schema store")?;
        self.page_manager
            .initialize()
            .wrap_err("failed to initialize page manager")?;
        self.initialized = true;
        Ok(())
    }

    /// Writes the column list for this table, replacing any existing schema.
    pub fn create_schema(&mut self, columns: &[Column]) -> Result<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized.into());
        }
        info!(dir = %self.dir.display(), num_columns = columns.len(), "creating schema");
        self.schema.write(columns)
    }

    /// Returns the cached in-memory schema.
    pub fn schema(&self) -> &[Column] {
        self.schema.columns()
    }

    /// Parses a delimited file against the current schema and bulk-inserts
    /// every surviving row, returning the assigned row ids and locations.
    pub fn load_from_file(
        &mut self,
        path: impl AsRef<Path>,
        delimiter: char,
    ) -> Result<Vec<(u32, RowLocation)>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized.into());
        }
        let path = path.as_ref();
        info!(dir = %self.dir.display(), file = %path.display(), "bulk loading");

        let batch = parsing::parse_file(path, delimiter, self.schema.columns())?;
        if batch.rows.is_empty() {
            bail!("no rows parsed from '{}'", path.display());
        }

        self.page_manager
            .insert_rows(batch.rows, batch.serialized_size, batch.num_rows)
    }

    /// Returns the page manager, exposing the directory for inspection.
    pub fn page_manager(&self) -> &PageManager<S> {
        &self.page_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_columns() -> Vec<Column> {
        vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::Text),
        ]
    }

    #[test]
    fn open_initializes_all_artifacts() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("t");

        let table = Table::open(&table_dir).unwrap();

        assert!(table_dir.join("schema.dat").exists());
        assert!(table_dir.join("pagedirectory.dat").exists());
        assert!(table_dir.join("pages.dat").exists());
        assert!(table.schema().is_empty());
    }

    #[test]
    fn uninitialized_table_rejects_operations() {
        let dir = tempdir().unwrap();
        let mut table = Table::new(&dir.path().join("t"), FileBlobStore::new());

        let err = table.create_schema(&sample_columns()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotInitialized)
        ));
        assert!(table.load_from_file("whatever.tsv", '\t').is_err());
    }

    #[test]
    fn schema_round_trips_through_reopen() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("t");
        {
            let mut table = Table::open(&table_dir).unwrap();
            table.create_schema(&sample_columns()).unwrap();
        }

        let table = Table::open(&table_dir).unwrap();
        assert_eq!(table.schema(), sample_columns().as_slice());
    }

    #[test]
    fn load_from_file_inserts_rows() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("t")).unwrap();
        table.create_schema(&sample_columns()).unwrap();

        let ingest = dir.path().join("rows.tsv");
        let mut file = std::fs::File::create(&ingest).unwrap();
        write!(file, "id\tname\n1\talice\n2\tbob\n").unwrap();

        let results = table.load_from_file(&ingest, '\t').unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(table.page_manager().directory().num_rows(), 2);
    }

    #[test]
    fn load_with_no_surviving_rows_fails() {
        let dir = tempdir().unwrap();
        let mut table = Table::open(dir.path().join("t")).unwrap();
        table.create_schema(&sample_columns()).unwrap();

        let ingest = dir.path().join("rows.tsv");
        let mut file = std::fs::File::create(&ingest).unwrap();
        write!(file, "id\tname\n").unwrap();

        assert!(table.load_from_file(&ingest, '\t').is_err());
    }
}
