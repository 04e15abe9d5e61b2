//! # Storage Geometry Constants
//!
//! All sizes that define the durable data format live here. The page format,
//! the directory format, and the bulk-insertion packing math all derive from
//! these values, so they are grouped and cross-checked rather than scattered.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> PAGE_HEADER_SIZE (4 bytes: num_slots u16 + last_data_offset u16)
//!       │
//!       ├─> PAGE_USABLE_SIZE (derived: PAGE_SIZE - PAGE_HEADER_SIZE)
//!       │
//!       ├─> SLOT_ENTRY_SIZE (8 bytes: row_id u32 + data_offset u16 + length u16)
//!       │     │
//!       │     ├─> MAX_SLOTS_PER_PAGE (derived: PAGE_USABLE_SIZE / SLOT_ENTRY_SIZE)
//!       │     │
//!       │     └─> MAX_RECORD_PAYLOAD (derived: PAGE_USABLE_SIZE - SLOT_ENTRY_SIZE)
//!       │           Largest row that can ever be stored; anything bigger is
//!       │           rejected before a page is allocated.
//!       │
//!       └─> page file offsets (page_id * PAGE_SIZE)
//!
//! DIRECTORY_HEADER_SIZE (16 bytes: four u32 counters)
//!       │
//!       └─> entry i lives at DIRECTORY_HEADER_SIZE + i * DIRECTORY_ENTRY_SIZE
//! ```
//!
//! ## Critical Invariants
//!
//! Enforced by the compile-time assertions below:
//!
//! 1. `PAGE_USABLE_SIZE == PAGE_SIZE - PAGE_HEADER_SIZE`
//! 2. `MAX_RECORD_PAYLOAD + SLOT_ENTRY_SIZE <= PAGE_USABLE_SIZE`
//! 3. `PAGE_SIZE` fits in a `u16`, since `last_data_offset` and
//!    `available_space` are stored as `u16` on disk

/// Size of one page in bytes. Pages are the unit of I/O: the page file is a
/// concatenation of blocks this size, and page `p` lives at byte offset
/// `p * PAGE_SIZE`.
pub const PAGE_SIZE: usize = 4096;

/// Size of the slotted-page header: `num_slots: u16` + `last_data_offset: u16`.
pub const PAGE_HEADER_SIZE: usize = 4;

/// Bytes of a page available for slot entries and row payloads combined.
pub const PAGE_USABLE_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Size of one slot entry: `row_id: u32` + `data_offset: u16` + `length: u16`.
pub const SLOT_ENTRY_SIZE: usize = 8;

/// Upper bound on `num_slots`; a header claiming more is corrupt.
pub const MAX_SLOTS_PER_PAGE: usize = PAGE_USABLE_SIZE / SLOT_ENTRY_SIZE;

/// Largest row payload that fits in an otherwise empty page together with
/// its slot entry. Rows beyond this can never be stored.
pub const MAX_RECORD_PAYLOAD: usize = PAGE_USABLE_SIZE - SLOT_ENTRY_SIZE;

/// Size of the page-directory header: `num_pages`, `next_page_id`,
/// `num_rows`, `next_row_id`, each `u32`.
pub const DIRECTORY_HEADER_SIZE: usize = 16;

/// Size of one page-directory entry: `page_id: u16` + `available_space: u16`.
pub const DIRECTORY_ENTRY_SIZE: usize = 4;

/// Size of the schema-file header: `num_columns: u16`.
pub const SCHEMA_HEADER_SIZE: usize = 2;

/// Schema file name inside a table directory.
pub const SCHEMA_FILE_NAME: &str = "schema.dat";

/// Page-directory file name inside a table directory.
pub const DIRECTORY_FILE_NAME: &str = "pagedirectory.dat";

/// Page file name inside a table directory.
pub const PAGES_FILE_NAME: &str = "pages.dat";

const _: () = assert!(
    PAGE_USABLE_SIZE == PAGE_SIZE - PAGE_HEADER_SIZE,
    "PAGE_USABLE_SIZE must be derived from PAGE_SIZE and PAGE_HEADER_SIZE"
);

const _: () = assert!(
    MAX_RECORD_PAYLOAD + SLOT_ENTRY_SIZE <= PAGE_USABLE_SIZE,
    "a maximal record plus its slot entry must fit in the usable area"
);

const _: () = assert!(
    PAGE_SIZE <= u16::MAX as usize,
    "last_data_offset and available_space are u16 on disk; PAGE_SIZE must fit"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_capacities() {
        assert_eq!(PAGE_USABLE_SIZE, 4092);
        assert_eq!(MAX_SLOTS_PER_PAGE, 511);
        assert_eq!(MAX_RECORD_PAYLOAD, 4084);
    }

    #[test]
    fn directory_entry_offsets_are_dense() {
        let third_entry = DIRECTORY_HEADER_SIZE + 2 * DIRECTORY_ENTRY_SIZE;
        assert_eq!(third_entry, 24);
    }
}
