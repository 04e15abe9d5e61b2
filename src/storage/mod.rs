//! # Storage Module
//!
//! The paged storage subsystem: blob I/O, the slotted-page record layout,
//! the page directory with its free-space index, and the page manager that
//! orchestrates bulk insertion. These components define the durable data
//! format; everything above them is glue.
//!
//! ## Data Flow
//!
//! ```text
//! serialized rows ──> PageManager ──┬──> SlottedPage (pack records)
//!                                   ├──> PageDirectory (ids, free space)
//!                                   └──> BlobStore (page/directory files)
//! ```
//!
//! ## Resource Model
//!
//! Single-threaded and synchronous. Every file-touching operation opens a
//! handle, performs one read or write, and releases it on all exit paths;
//! no long-lived descriptors are held. Within a bulk insertion, page-file
//! writes happen in fill order and the full directory rewrite comes last,
//! so a crash in between leaves orphan page bytes that the directory (the
//! single authority for ids and space accounting) never references.
//!
//! ## Module Organization
//!
//! - `blob`: the `BlobStore` seam and the `std::fs`-backed implementation
//! - `page`: slotted-page layout, verification, and record insertion
//! - `directory`: persistent `(page_id, available_space)` index + counters
//! - `page_manager`: bulk-insertion policy (reuse one page or allocate new)

mod blob;
mod directory;
mod page;
mod page_manager;

pub use blob::{BlobStore, FileBlobStore};
pub use directory::{PageDirectory, PageDirectoryEntry, PageDirectoryHeader};
pub use page::{
    format_empty_page, insert_records, payload_at, slot_at, validate_page, Record, RowLocation,
    SlotEntry, SlottedPageHeader,
};
pub use page_manager::PageManager;

pub use crate::config::{
    DIRECTORY_ENTRY_SIZE, DIRECTORY_HEADER_SIZE, MAX_RECORD_PAYLOAD, MAX_SLOTS_PER_PAGE,
    PAGE_HEADER_SIZE, PAGE_SIZE, PAGE_USABLE_SIZE, SLOT_ENTRY_SIZE,
};

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Parses a zerocopy struct from a byte slice with size validation.
#[inline]
pub fn parse_zerocopy<'a, T: FromBytes + KnownLayout + Immutable>(
    bytes: &'a [u8],
    type_name: &str,
) -> Result<&'a T> {
    let size = std::mem::size_of::<T>();
    ensure!(
        bytes.len() >= size,
        "buffer too small for {}: {} < {}",
        type_name,
        bytes.len(),
        size
    );
    T::ref_from_bytes(&bytes[..size])
        .map_err(|e| eyre::eyre!("failed to parse {}: {:?}", type_name, e))
}

/// Parses a mutable zerocopy struct from a byte slice with size validation.
#[inline]
pub fn parse_zerocopy_mut<'a, T: FromBytes + KnownLayout + zerocopy::IntoBytes>(
    bytes: &'a mut [u8],
    type_name: &str,
) -> Result<&'a mut T> {
    let size = std::mem::size_of::<T>();
    ensure!(
        bytes.len() >= size,
        "buffer too small for {}: {} < {}",
        type_name,
        bytes.len(),
        size
    );
    T::mut_from_bytes(&mut bytes[..size])
        .map_err(|e| eyre::eyre!("failed to parse {}: {:?}", type_name, e))
}
