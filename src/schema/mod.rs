//! # Schema Store
//!
//! Persists a table's column list and keeps an in-memory copy for the
//! codec and the ingest parser.
//!
//! ## File Format
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  ------------------------------
//! 0       2     num_columns   u16 little-endian
//! 2       ...   column records
//! ```
//!
//! Each column record is `name_len: u16` LE, `name` (UTF-8 bytes), then the
//! one-byte type tag (see [`DataType`]). Records are variable length, so
//! reads parse with a cursor; a file that ends mid-record is corrupt. The
//! whole file is rewritten on every [`SchemaStore::write`].

use std::path::{Path, PathBuf};

use eyre::{ensure, Result};
use tracing::debug;

use crate::config::{SCHEMA_FILE_NAME, SCHEMA_HEADER_SIZE};
use crate::error::StorageError;
use crate::storage::BlobStore;
use crate::types::{Column, DataType};

/// Column-list persistence for one table.
#[derive(Debug)]
pub struct SchemaStore<S: BlobStore> {
    path: PathBuf,
    storage: S,
    columns: Vec<Column>,
}

impl<S: BlobStore> SchemaStore<S> {
    /// Binds a store to `table_dir/schema.dat`. No I/O happens until
    /// [`SchemaStore::initialize`].
    pub fn new(table_dir: &Path, storage: S) -> Self {
        Self {
            path: table_dir.join(SCHEMA_FILE_NAME),
            storage,
            columns: Vec::new(),
        }
    }

    /// Creates the schema file empty if it does not exist; otherwise reads
    /// it into memory.
    pub fn initialize(&mut self) -> Result<()> {
        if self.storage.exists(&self.path) {
            debug!(path = %self.path.display(), "schema file exists, reading");
            self.read()?;
        } else {
            debug!(path = %self.path.display(), "creating empty schema file");
            self.storage.create(&self.path)?;
            self.columns.clear();
        }
        Ok(())
    }

    /// Returns true if the schema file exists on disk.
    pub fn exists(&self) -> bool {
        self.storage.exists(&self.path)
    }

    /// Returns the cached in-memory column list.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Serializes `columns` and writes the whole file at offset 0, then
    /// updates the in-memory copy.
    pub fn write(&mut self, columns: &[Column]) -> Result<()> {
        debug!(path = %self.path.display(), num_columns = columns.len(), "writing schema");
        ensure!(
            columns.len() <= u16::MAX as usize,
            "schema has {} columns; the header caps at {}",
            columns.len(),
            u16::MAX
        );

        let mut buf = Vec::with_capacity(SCHEMA_HEADER_SIZE + columns.len() * 16);
        buf.extend_from_slice(&(columns.len() as u16).to_le_bytes());
        for column in columns {
            let name_bytes = column.name().as_bytes();
            ensure!(
                name_bytes.len() <= u16::MAX as usize,
                "column name '{}' is too long (max {} bytes)",
                column.name(),
                u16::MAX
            );
            buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
            buf.extend_from_slice(name_bytes);
            buf.push(column.data_type() as u8);
        }

        self.storage.write(&self.path, &buf, 0)?;
        self.columns = columns.to_vec();
        Ok(())
    }

    /// Reads the schema file into memory and returns the column list.
    /// A zero-length file is the empty schema; a file that ends mid-record
    /// is `CorruptSchema`.
    pub fn read(&mut self) -> Result<Vec<Column>> {
        let size = self.storage.size(&self.path)? as usize;
        if size == 0 {
            self.columns.clear();
            return Ok(Vec::new());
        }

        if size < SCHEMA_HEADER_SIZE {
            return Err(StorageError::CorruptSchema {
                reason: format!("file is {} bytes, smaller than the header", size),
            }
            .into());
        }

        let mut buf = vec![0u8; size];
        self.storage.read(&self.path, &mut buf, 0)?;

        let num_columns = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let mut columns = Vec::with_capacity(num_columns);
        let mut cursor = SCHEMA_HEADER_SIZE;

        for index in 0..num_columns {
            let truncated = |what: &str| StorageError::CorruptSchema {
                reason: format!(
                    "file ends in the {} of column {} of {}",
                    what, index, num_columns
                ),
            };

            if cursor + 2 > size {
                return Err(truncated("name length").into());
            }
            let name_len = u16::from_le_bytes([buf[cursor], buf[cursor + 1]]) as usize;
            cursor += 2;

            if cursor + name_len + 1 > size {
                return Err(truncated("name or type tag").into());
            }
            let name = std::str::from_utf8(&buf[cursor..cursor + name_len])
                .map_err(|_| StorageError::CorruptSchema {
                    reason: format!("column {} name is not valid UTF-8", index),
                })?
                .to_string();
            cursor += name_len;

            let data_type = DataType::try_from(buf[cursor])?;
            cursor += 1;

            columns.push(Column::new(name, data_type));
        }

        debug!(num_columns = columns.len(), "schema read");
        self.columns = columns.clone();
        Ok(columns)
    }
}
