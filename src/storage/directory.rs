//! # Page Directory
//!
//! The persistent index of pages and the single authority for page count,
//! id assignment, and free-space accounting. The directory is loaded into
//! memory on initialization and rewritten in full on persist; for the
//! expected scale (small directories, batch ingest) the full rewrite trades
//! O(num_pages) write amplification for not having an in-place update path.
//!
//! ## File Format
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -------------------------------
//! 0       4     num_pages      u32, == number of entries
//! 4       4     next_page_id   u32, monotonic
//! 8       4     num_rows       u32, total rows across pages
//! 12      4     next_row_id    u32, monotonic
//! 16      4×n   entries        { page_id u16; available_space u16 }
//! ```
//!
//! `available_space` counts the free bytes between a page's slot-directory
//! end and its `last_data_offset` — the bytes available to grow either
//! region. Entry order is insertion order, and the first-fit search walks it
//! linearly, so fit selection is stable across reopens.
//!
//! ## Persistence Points
//!
//! Appending a new entry persists immediately; updating an existing entry
//! mutates memory only and relies on the bulk operation's final
//! [`PageDirectory::persist`]. Page ids and row ids are handed out from the
//! in-memory counters and only become durable with that same persist.

use std::path::{Path, PathBuf};

use eyre::Result;
use tracing::debug;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{parse_zerocopy, BlobStore, DIRECTORY_ENTRY_SIZE, DIRECTORY_HEADER_SIZE};
use crate::config::DIRECTORY_FILE_NAME;
use crate::error::StorageError;

/// Directory header: page/row counts and the monotonic id counters.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PageDirectoryHeader {
    num_pages: U32,
    next_page_id: U32,
    num_rows: U32,
    next_row_id: U32,
}

const _: () = assert!(std::mem::size_of::<PageDirectoryHeader>() == DIRECTORY_HEADER_SIZE);

impl PageDirectoryHeader {
    fn new_zero() -> Self {
        Self {
            num_pages: U32::new(0),
            next_page_id: U32::new(0),
            num_rows: U32::new(0),
            next_row_id: U32::new(0),
        }
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages.get()
    }

    pub fn next_page_id(&self) -> u32 {
        self.next_page_id.get()
    }

    pub fn num_rows(&self) -> u32 {
        self.num_rows.get()
    }

    pub fn next_row_id(&self) -> u32 {
        self.next_row_id.get()
    }
}

/// One directory entry: a page and its free byte count.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct PageDirectoryEntry {
    page_id: U16,
    available_space: U16,
}

const _: () = assert!(std::mem::size_of::<PageDirectoryEntry>() == DIRECTORY_ENTRY_SIZE);

impl PageDirectoryEntry {
    pub fn new(page_id: u16, available_space: u16) -> Self {
        Self {
            page_id: U16::new(page_id),
            available_space: U16::new(available_space),
        }
    }

    pub fn page_id(&self) -> u16 {
        self.page_id.get()
    }

    pub fn available_space(&self) -> u16 {
        self.available_space.get()
    }

    pub fn set_available_space(&mut self, space: u16) {
        self.available_space = U16::new(space);
    }
}

/// In-memory page directory bound to its on-disk file.
#[derive(Debug)]
pub struct PageDirectory<S: BlobStore> {
    path: PathBuf,
    storage: S,
    header: PageDirectoryHeader,
    entries: Vec<PageDirectoryEntry>,
}

impl<S: BlobStore> PageDirectory<S> {
    /// Binds a directory to `table_dir/pagedirectory.dat`. No I/O happens
    /// until [`PageDirectory::initialize`].
    pub fn new(table_dir: &Path, storage: S) -> Self {
        Self {
            path: table_dir.join(DIRECTORY_FILE_NAME),
            storage,
            header: PageDirectoryHeader::new_zero(),
            entries: Vec::new(),
        }
    }

    /// Creates the directory file with a zero header if it does not exist;
    /// otherwise reads the header and all entries into memory.
    pub fn initialize(&mut self) -> Result<()> {
        if !self.storage.exists(&self.path) {
            debug!(path = %self.path.display(), "creating page directory file");
            self.header = PageDirectoryHeader::new_zero();
            self.entries.clear();
            return self
                .storage
                .write(&self.path, self.header.as_bytes(), 0);
        }

        debug!(path = %self.path.display(), "reading page directory file");
        let mut header_buf = [0u8; DIRECTORY_HEADER_SIZE];
        self.storage.read(&self.path, &mut header_buf, 0)?;
        self.header = *parse_zerocopy::<PageDirectoryHeader>(&header_buf, "PageDirectoryHeader")?;

        let num_pages = self.header.num_pages() as usize;
        let needed = (DIRECTORY_HEADER_SIZE + num_pages * DIRECTORY_ENTRY_SIZE) as u64;
        let actual = self.storage.size(&self.path)?;
        if actual < needed {
            return Err(StorageError::CorruptDirectory {
                reason: format!(
                    "file is {} bytes but the header claims {} entries ({} bytes)",
                    actual, num_pages, needed
                ),
            }
            .into());
        }

        self.entries.clear();
        self.entries.reserve(num_pages);
        for i in 0..num_pages {
            let mut entry_buf = [0u8; DIRECTORY_ENTRY_SIZE];
            let offset = (DIRECTORY_HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE) as u64;
            self.storage.read(&self.path, &mut entry_buf, offset)?;
            let entry = *parse_zerocopy::<PageDirectoryEntry>(&entry_buf, "PageDirectoryEntry")?;
            self.entries.push(entry);
        }

        debug!(
            num_pages = self.header.num_pages(),
            next_page_id = self.header.next_page_id(),
            num_rows = self.header.num_rows(),
            next_row_id = self.header.next_row_id(),
            "page directory loaded"
        );
        Ok(())
    }

    /// Hands out the next page id and advances the in-memory counter.
    pub fn next_page_id(&mut self) -> u16 {
        let id = self.header.next_page_id();
        self.header.next_page_id = U32::new(id + 1);
        id as u16
    }

    /// Hands out the next row id and advances the in-memory counter.
    pub fn next_row_id(&mut self) -> u32 {
        let id = self.header.next_row_id();
        self.header.next_row_id = U32::new(id + 1);
        id
    }

    /// Adds `count` to the stored total row count.
    pub fn add_rows(&mut self, count: u32) {
        self.header.num_rows = U32::new(self.header.num_rows() + count);
    }

    pub fn num_pages(&self) -> u32 {
        self.header.num_pages()
    }

    pub fn num_rows(&self) -> u32 {
        self.header.num_rows()
    }

    pub fn entries(&self) -> &[PageDirectoryEntry] {
        &self.entries
    }

    /// Looks up the entry for `page_id` by linear scan.
    pub fn get(&self, page_id: u16) -> Option<PageDirectoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.page_id() == page_id)
            .copied()
    }

    /// First-fit search: the earliest entry, in insertion order, with at
    /// least `required` free bytes.
    pub fn find_fit(&self, required: usize) -> Option<PageDirectoryEntry> {
        self.entries
            .iter()
            .find(|entry| entry.available_space() as usize >= required)
            .copied()
    }

    /// Overwrites the entry with the same page id, or appends (and then
    /// persists) if none exists. The in-place path touches memory only.
    pub fn upsert(&mut self, entry: PageDirectoryEntry) -> Result<()> {
        debug!(
            page_id = entry.page_id(),
            available_space = entry.available_space(),
            "upserting page directory entry"
        );
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.page_id() == entry.page_id())
        {
            *existing = entry;
            return Ok(());
        }
        self.append(entry)
    }

    /// Appends an entry unconditionally and persists the directory.
    pub fn append(&mut self, entry: PageDirectoryEntry) -> Result<()> {
        debug!(
            page_id = entry.page_id(),
            available_space = entry.available_space(),
            "appending page directory entry"
        );
        self.entries.push(entry);
        self.header.num_pages = U32::new(self.entries.len() as u32);
        self.persist()
    }

    /// Rewrites the whole file: header then all entries, at offset 0.
    pub fn persist(&self) -> Result<()> {
        debug!(path = %self.path.display(), num_pages = self.header.num_pages(), "persisting page directory");
        let mut buf =
            Vec::with_capacity(DIRECTORY_HEADER_SIZE + self.entries.len() * DIRECTORY_ENTRY_SIZE);
        buf.extend_from_slice(self.header.as_bytes());
        for entry in &self.entries {
            buf.extend_from_slice(entry.as_bytes());
        }
        self.storage.write(&self.path, &buf, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileBlobStore;
    use tempfile::tempdir;

    fn fresh(dir: &Path) -> PageDirectory<FileBlobStore> {
        let mut directory = PageDirectory::new(dir, FileBlobStore::new());
        directory.initialize().unwrap();
        directory
    }

    #[test]
    fn initialize_creates_zero_header_file() {
        let dir = tempdir().unwrap();
        let directory = fresh(dir.path());

        assert_eq!(directory.num_pages(), 0);
        assert_eq!(directory.num_rows(), 0);
        assert!(directory.entries().is_empty());

        let store = FileBlobStore::new();
        assert_eq!(
            store.size(&dir.path().join(DIRECTORY_FILE_NAME)).unwrap(),
            DIRECTORY_HEADER_SIZE as u64
        );
    }

    #[test]
    fn counters_are_monotonic() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());

        assert_eq!(directory.next_page_id(), 0);
        assert_eq!(directory.next_page_id(), 1);
        assert_eq!(directory.next_row_id(), 0);
        assert_eq!(directory.next_row_id(), 1);
        assert_eq!(directory.next_row_id(), 2);
    }

    #[test]
    fn append_persists_and_reopen_restores_state() {
        let dir = tempdir().unwrap();
        {
            let mut directory = fresh(dir.path());
            let _ = directory.next_page_id();
            let _ = directory.next_row_id();
            directory.append(PageDirectoryEntry::new(0, 4096)).unwrap();
            directory.append(PageDirectoryEntry::new(1, 1234)).unwrap();
            directory.add_rows(10);
            directory.persist().unwrap();
        }

        let reopened = fresh(dir.path());
        assert_eq!(reopened.num_pages(), 2);
        assert_eq!(reopened.num_rows(), 10);
        assert_eq!(reopened.get(1).unwrap().available_space(), 1234);
    }

    #[test]
    fn counters_survive_reopen_only_after_persist() {
        let dir = tempdir().unwrap();
        {
            let mut directory = fresh(dir.path());
            let _ = directory.next_page_id();
            let _ = directory.next_page_id();
            // no persist
        }

        let mut reopened = fresh(dir.path());
        assert_eq!(reopened.next_page_id(), 0);
    }

    #[test]
    fn get_by_id_linear_scan() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());
        directory.append(PageDirectoryEntry::new(0, 100)).unwrap();
        directory.append(PageDirectoryEntry::new(1, 200)).unwrap();

        assert_eq!(directory.get(0).unwrap().available_space(), 100);
        assert_eq!(directory.get(1).unwrap().available_space(), 200);
        assert!(directory.get(7).is_none());
    }

    #[test]
    fn find_fit_is_first_fit_in_insertion_order() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());
        directory.append(PageDirectoryEntry::new(0, 100)).unwrap();
        directory.append(PageDirectoryEntry::new(1, 500)).unwrap();
        directory.append(PageDirectoryEntry::new(2, 4000)).unwrap();

        // Page 1 fits but page 2 would fit "better"; first fit wins.
        assert_eq!(directory.find_fit(300).unwrap().page_id(), 1);
        assert_eq!(directory.find_fit(50).unwrap().page_id(), 0);
        assert_eq!(directory.find_fit(100).unwrap().page_id(), 0);
        assert!(directory.find_fit(4001).is_none());
    }

    #[test]
    fn upsert_overwrites_in_memory() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());
        directory.append(PageDirectoryEntry::new(0, 4092)).unwrap();

        directory.upsert(PageDirectoryEntry::new(0, 10)).unwrap();
        assert_eq!(directory.num_pages(), 1);
        assert_eq!(directory.get(0).unwrap().available_space(), 10);

        // In-place update is not yet durable; reopen sees the appended value.
        let reopened = fresh(dir.path());
        assert_eq!(reopened.get(0).unwrap().available_space(), 4092);

        // After an explicit persist it is.
        directory.persist().unwrap();
        let reopened = fresh(dir.path());
        assert_eq!(reopened.get(0).unwrap().available_space(), 10);
    }

    #[test]
    fn upsert_of_unknown_page_appends() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());

        directory.upsert(PageDirectoryEntry::new(3, 777)).unwrap();
        assert_eq!(directory.num_pages(), 1);

        let reopened = fresh(dir.path());
        assert_eq!(reopened.get(3).unwrap().available_space(), 777);
    }

    #[test]
    fn truncated_entry_region_is_corrupt() {
        let dir = tempdir().unwrap();
        {
            let mut directory = fresh(dir.path());
            directory.append(PageDirectoryEntry::new(0, 4092)).unwrap();
            directory.append(PageDirectoryEntry::new(1, 4092)).unwrap();
        }

        // Chop the file so the header claims more entries than the file holds.
        let path = dir.path().join(DIRECTORY_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap();
        file.set_len((DIRECTORY_HEADER_SIZE + DIRECTORY_ENTRY_SIZE) as u64)
            .unwrap();

        let mut directory = PageDirectory::new(dir.path(), FileBlobStore::new());
        let err = directory.initialize().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::CorruptDirectory { .. })
        ));
    }

    #[test]
    fn on_disk_layout_matches_the_contract() {
        let dir = tempdir().unwrap();
        let mut directory = fresh(dir.path());
        let _ = directory.next_page_id();
        directory.append(PageDirectoryEntry::new(0, 3892)).unwrap();
        directory.add_rows(5);
        let _ = directory.next_row_id();
        directory.persist().unwrap();

        let mut buf = [0u8; DIRECTORY_HEADER_SIZE + DIRECTORY_ENTRY_SIZE];
        FileBlobStore::new()
            .read(&dir.path().join(DIRECTORY_FILE_NAME), &mut buf, 0)
            .unwrap();

        assert_eq!(&buf[0..4], &1u32.to_le_bytes()); // num_pages
        assert_eq!(&buf[4..8], &1u32.to_le_bytes()); // next_page_id
        assert_eq!(&buf[8..12], &5u32.to_le_bytes()); // num_rows
        assert_eq!(&buf[12..16], &1u32.to_le_bytes()); // next_row_id
        assert_eq!(&buf[16..18], &0u16.to_le_bytes()); // page_id
        assert_eq!(&buf[18..20], &3892u16.to_le_bytes()); // available_space
    }
}
