//! # Page Manager
//!
//! Orchestrates bulk insertion of pre-serialized rows. The manager assigns
//! row ids from the directory's counter, sizes the batch including slot
//! overhead, and then takes one of two paths:
//!
//! - **Fast path**: if any existing page has enough free space for the
//!   *entire* batch (first fit, insertion order), the batch lands there.
//!   The page is read, verified, extended in place, and written back.
//! - **Slow path**: otherwise fresh pages are allocated one at a time and
//!   packed greedily until the batch is exhausted.
//!
//! The fast path never splits a batch between an existing page and new
//! pages; a batch that does not fit wholly in one existing page always goes
//! to fresh pages.
//!
//! ## Write Ordering
//!
//! Page-file writes happen as pages fill; the full directory rewrite is the
//! last write of a successful insertion. A crash in between leaves record
//! bytes in the page file that the directory never references — invisible
//! on the next open, and harmless, because all id assignment and space
//! accounting live in the directory.
//!
//! ## Buffers
//!
//! One `PAGE_SIZE` buffer is reused across fast-path insertions; the slow
//! path builds each new page in its own buffer.

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use tracing::{debug, info};

use super::page::{format_empty_page, insert_records, validate_page, Record, RowLocation};
use super::{
    BlobStore, PageDirectory, PageDirectoryEntry, SlottedPageHeader, MAX_RECORD_PAYLOAD,
    PAGE_SIZE, PAGE_USABLE_SIZE, SLOT_ENTRY_SIZE,
};
use crate::config::PAGES_FILE_NAME;
use crate::error::StorageError;

/// Bulk-insertion orchestrator for one table's page file.
#[derive(Debug)]
pub struct PageManager<S: BlobStore> {
    pages_path: PathBuf,
    storage: S,
    directory: PageDirectory<S>,
    page_buf: Vec<u8>,
    initialized: bool,
}

impl<S: BlobStore + Clone> PageManager<S> {
    /// Binds a manager to `table_dir/pages.dat`. No I/O happens until
    /// [`PageManager::initialize`] (bulk insertion initializes on demand).
    pub fn new(table_dir: &Path, storage: S) -> Self {
        Self {
            pages_path: table_dir.join(PAGES_FILE_NAME),
            directory: PageDirectory::new(table_dir, storage.clone()),
            storage,
            page_buf: vec![0u8; PAGE_SIZE],
            initialized: false,
        }
    }

    /// Loads the page directory and creates the page file if absent.
    /// Idempotent; later calls are no-ops.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.directory
            .initialize()
            .wrap_err("failed to initialize page directory")?;
        if !self.storage.exists(&self.pages_path) {
            self.storage.create(&self.pages_path)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Returns the page directory (id counters, entries, free space).
    pub fn directory(&self) -> &PageDirectory<S> {
        &self.directory
    }

    /// Reads page `entry.page_id` into the reusable buffer and verifies it.
    fn load_page(&mut self, entry: &PageDirectoryEntry) -> Result<()> {
        debug!(page_id = entry.page_id(), "loading page");
        let offset = entry.page_id() as u64 * PAGE_SIZE as u64;
        self.storage
            .read(&self.pages_path, &mut self.page_buf, offset)?;
        validate_page(&self.page_buf)
            .wrap_err_with(|| format!("page {} failed verification", entry.page_id()))
    }

    /// Writes a page buffer at its slot in the page file.
    fn persist_page(&self, buf: &[u8], page_id: u16) -> Result<()> {
        debug!(page_id, "persisting page");
        let offset = page_id as u64 * PAGE_SIZE as u64;
        self.storage.write(&self.pages_path, buf, offset)
    }

    /// Bulk-inserts a batch of serialized rows, returning each assigned row
    /// id with the location it landed at.
    ///
    /// `expected_size` is the caller's figure for the batch's on-page
    /// footprint (serialized bytes plus one slot entry per row) and
    /// `expected_rows` its row count; both are validated against what was
    /// actually inserted before the directory is persisted.
    pub fn insert_rows(
        &mut self,
        rows: Vec<Vec<u8>>,
        expected_size: usize,
        expected_rows: usize,
    ) -> Result<Vec<(u32, RowLocation)>> {
        self.initialize()?;
        info!(num_rows = rows.len(), "starting bulk insertion");

        let records: Vec<Record> = rows
            .into_iter()
            .map(|payload| Record {
                row_id: self.directory.next_row_id(),
                payload,
            })
            .collect();
        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            debug!(
                first_row_id = first.row_id,
                last_row_id = last.row_id,
                "assigned row ids"
            );
        }

        let required: usize = records
            .iter()
            .map(|r| r.payload.len() + SLOT_ENTRY_SIZE)
            .sum();
        debug!(required, "total required space for batch");

        // An oversized row can never be stored; reject before any page is
        // allocated or written.
        if let Some(too_large) = records
            .iter()
            .find(|r| r.payload.len() > MAX_RECORD_PAYLOAD)
        {
            return Err(StorageError::RowTooLarge {
                size: too_large.payload.len(),
                max: MAX_RECORD_PAYLOAD,
            }
            .into());
        }

        let results = match self.directory.find_fit(required) {
            Some(entry) => self.insert_into_existing(&records, entry)?,
            None => self.insert_into_new_pages(&records)?,
        };

        if results.len() != expected_rows || required != expected_size {
            return Err(StorageError::InsertionSizeMismatch {
                inserted: results.len(),
                expected_rows,
                required,
                expected_size,
            }
            .into());
        }

        self.directory.add_rows(results.len() as u32);
        self.directory.persist()?;
        info!(num_rows = results.len(), "bulk insertion complete");
        Ok(results)
    }

    /// Fast path: the whole batch fits in one existing page.
    fn insert_into_existing(
        &mut self,
        records: &[Record],
        mut entry: PageDirectoryEntry,
    ) -> Result<Vec<(u32, RowLocation)>> {
        info!(
            page_id = entry.page_id(),
            available_space = entry.available_space(),
            "batch fits in existing page"
        );
        self.load_page(&entry)?;

        let results = insert_records(&mut self.page_buf, records, entry.page_id())?;

        let header = SlottedPageHeader::from_bytes(&self.page_buf)?;
        let free_space = header.free_space();
        debug!(
            num_slots = header.num_slots(),
            last_data_offset = header.last_data_offset(),
            free_space,
            "page state after insertion"
        );

        entry.set_available_space(free_space as u16);
        self.persist_page(&self.page_buf, entry.page_id())?;
        self.directory.upsert(entry)?;
        Ok(results)
    }

    /// Slow path: allocate fresh pages and pack the batch greedily.
    fn insert_into_new_pages(&mut self, records: &[Record]) -> Result<Vec<(u32, RowLocation)>> {
        info!("no existing page fits the batch; allocating new pages");
        let mut results = Vec::with_capacity(records.len());
        let mut remaining = records;

        while !remaining.is_empty() {
            let page_id = self.directory.next_page_id();
            let mut entry = PageDirectoryEntry::new(page_id, PAGE_SIZE as u16);
            self.directory.append(entry)?;
            debug!(page_id, "allocated new page");

            let mut page = vec![0u8; PAGE_SIZE];
            format_empty_page(&mut page)?;

            // Pack rows while the next one still fits alongside its slot.
            let mut page_used = 0;
            let mut take = 0;
            for record in remaining {
                let record_size = record.payload.len() + SLOT_ENTRY_SIZE;
                if page_used + record_size > PAGE_USABLE_SIZE {
                    break;
                }
                page_used += record_size;
                take += 1;
            }
            let (batch, rest) = remaining.split_at(take);
            remaining = rest;

            debug!(page_id, rows = batch.len(), "packing rows into new page");
            results.extend(insert_records(&mut page, batch, page_id)?);

            let header = SlottedPageHeader::from_bytes(&page)?;
            let free_space = header.free_space();
            debug!(
                num_slots = header.num_slots(),
                last_data_offset = header.last_data_offset(),
                free_space,
                "new page state after insertion"
            );

            entry.set_available_space(free_space as u16);
            self.directory.upsert(entry)?;
            self.persist_page(&page, page_id)?;
        }

        Ok(results)
    }
}
