//! # Slotted Page Layout
//!
//! Every page is a `PAGE_SIZE` block with a 4-byte header, a slot directory
//! growing forward from the header, and a data region growing backward from
//! the end of the page:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  ----------------------------------------------
//! 0       2     num_slots          number of slot entries
//! 2       2     last_data_offset   start of the most recent payload
//! 4       8×n   slot entries       { row_id u32; data_offset u16; length u16 }
//! ...           free space
//! ...           row payloads       newest at the lowest used offset
//! 4096          end of page
//! ```
//!
//! ```text
//! +------------------+
//! | Header (4 bytes) |
//! +------------------+
//! | Slot Directory   |  <- grows downward from offset 4
//! +------------------+
//! | Free Space       |
//! +------------------+
//! | Row Payloads     |  <- grow upward from end of page
//! +------------------+
//! ```
//!
//! The dual growth decouples directory size from payload size and admits
//! variable-length records without compaction at write time. Insertion is
//! append-only: slots are never reused, `num_slots` only increases, and
//! `last_data_offset` only decreases.
//!
//! ## Canonical Empty Page
//!
//! A page with zero slots must have `last_data_offset == PAGE_SIZE` and an
//! all-zero tail after the header. [`validate_page`] rejects anything else,
//! which catches buffers that were never formatted (for example a page read
//! from a hole in a sparse file).
//!
//! ## Endianness
//!
//! Header and slot fields are explicit little-endian via zerocopy wrappers;
//! the slot directory starts at offset 4, so `SlotEntry` must be unaligned-
//! safe.

use eyre::Result;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{
    parse_zerocopy, parse_zerocopy_mut, MAX_SLOTS_PER_PAGE, PAGE_HEADER_SIZE, PAGE_SIZE,
    SLOT_ENTRY_SIZE,
};
use crate::error::StorageError;

/// Slotted-page header: slot count and the lowest used payload offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SlottedPageHeader {
    num_slots: U16,
    last_data_offset: U16,
}

const _: () = assert!(std::mem::size_of::<SlottedPageHeader>() == PAGE_HEADER_SIZE);

impl SlottedPageHeader {
    /// Header of a freshly formatted empty page.
    pub fn new_empty() -> Self {
        Self {
            num_slots: U16::new(0),
            last_data_offset: U16::new(PAGE_SIZE as u16),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        parse_zerocopy(data, "SlottedPageHeader")
    }

    pub fn write_to(&self, data: &mut [u8]) -> Result<()> {
        let dst = parse_zerocopy_mut::<Self>(data, "SlottedPageHeader")?;
        *dst = *self;
        Ok(())
    }

    pub fn num_slots(&self) -> u16 {
        self.num_slots.get()
    }

    pub fn last_data_offset(&self) -> u16 {
        self.last_data_offset.get()
    }

    /// Byte offset one past the last slot entry.
    pub fn slot_directory_end(&self) -> usize {
        PAGE_HEADER_SIZE + self.num_slots() as usize * SLOT_ENTRY_SIZE
    }

    /// Free bytes between the slot directory and the data region; the space
    /// available to grow either one.
    pub fn free_space(&self) -> usize {
        (self.last_data_offset() as usize).saturating_sub(self.slot_directory_end())
    }
}

/// One slot-directory entry locating a payload within the page.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SlotEntry {
    row_id: U32,
    data_offset: U16,
    length: U16,
}

const _: () = assert!(std::mem::size_of::<SlotEntry>() == SLOT_ENTRY_SIZE);

impl SlotEntry {
    pub fn new(row_id: u32, data_offset: u16, length: u16) -> Self {
        Self {
            row_id: U32::new(row_id),
            data_offset: U16::new(data_offset),
            length: U16::new(length),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        parse_zerocopy(data, "SlotEntry")
    }

    pub fn row_id(&self) -> u32 {
        self.row_id.get()
    }

    pub fn data_offset(&self) -> u16 {
        self.data_offset.get()
    }

    pub fn length(&self) -> u16 {
        self.length.get()
    }
}

/// A serialized row handed to the page for insertion: the assigned row id
/// plus the payload bytes.
#[derive(Debug, Clone)]
pub struct Record {
    pub row_id: u32,
    pub payload: Vec<u8>,
}

/// Where a record landed: the owning page and the ordinal of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub page_id: u16,
    pub slot_id: u16,
}

fn corrupt(reason: String) -> eyre::Report {
    StorageError::CorruptPage { reason }.into()
}

/// Checks every structural invariant of a page buffer.
///
/// Violations are reported as `CorruptPage` naming the broken invariant:
/// wrong buffer size, oversized `num_slots`, `last_data_offset` beyond the
/// page, slot directory overlapping the data region, or a non-canonical
/// empty page.
pub fn validate_page(buf: &[u8]) -> Result<()> {
    if buf.len() != PAGE_SIZE {
        return Err(corrupt(format!(
            "page buffer is {} bytes, expected {}",
            buf.len(),
            PAGE_SIZE
        )));
    }

    let header = SlottedPageHeader::from_bytes(buf)?;

    if header.num_slots() as usize > MAX_SLOTS_PER_PAGE {
        return Err(corrupt(format!(
            "num_slots {} exceeds slot directory capacity {}",
            header.num_slots(),
            MAX_SLOTS_PER_PAGE
        )));
    }

    if header.last_data_offset() as usize > PAGE_SIZE {
        return Err(corrupt(format!(
            "last_data_offset {} is beyond the page size {}",
            header.last_data_offset(),
            PAGE_SIZE
        )));
    }

    if header.slot_directory_end() > header.last_data_offset() as usize {
        return Err(corrupt(format!(
            "slot directory end {} overlaps data region at {}",
            header.slot_directory_end(),
            header.last_data_offset()
        )));
    }

    if header.num_slots() == 0 {
        if header.last_data_offset() as usize != PAGE_SIZE {
            return Err(corrupt(format!(
                "empty page has last_data_offset {}, expected {}",
                header.last_data_offset(),
                PAGE_SIZE
            )));
        }
        if buf[PAGE_HEADER_SIZE..].iter().any(|&b| b != 0) {
            return Err(corrupt(
                "empty page has non-zero bytes after the header".to_string(),
            ));
        }
    }

    Ok(())
}

/// Appends `records` in order into the page buffer, returning each record's
/// id paired with the location it landed at.
///
/// The buffer must pass [`validate_page`] first. Records are written at the
/// falling end of the data region while their slot entries fill the rising
/// slot directory; the header is written back once after the loop. A record
/// that does not fit fails with `PageFull` and leaves that record (and any
/// following ones) out, but records already placed by this call remain in
/// the buffer.
pub fn insert_records(
    buf: &mut [u8],
    records: &[Record],
    page_id: u16,
) -> Result<Vec<(u32, RowLocation)>> {
    validate_page(buf)?;

    let mut header = *SlottedPageHeader::from_bytes(buf)?;
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let payload_len = record.payload.len();
        let slot_offset = header.slot_directory_end();

        let data_offset = match (header.last_data_offset() as usize).checked_sub(payload_len) {
            Some(offset) if offset >= slot_offset + SLOT_ENTRY_SIZE => offset,
            _ => {
                // Write back what landed so far before reporting the failure.
                header.write_to(buf)?;
                return Err(StorageError::PageFull {
                    record: payload_len + SLOT_ENTRY_SIZE,
                    free: header.free_space(),
                }
                .into());
            }
        };

        buf[data_offset..data_offset + payload_len].copy_from_slice(&record.payload);

        let slot = SlotEntry::new(record.row_id, data_offset as u16, payload_len as u16);
        buf[slot_offset..slot_offset + SLOT_ENTRY_SIZE].copy_from_slice(slot.as_bytes());

        header = SlottedPageHeader {
            num_slots: U16::new(header.num_slots() + 1),
            last_data_offset: U16::new(data_offset as u16),
        };

        results.push((
            record.row_id,
            RowLocation {
                page_id,
                slot_id: header.num_slots() - 1,
            },
        ));
    }

    header.write_to(buf)?;
    Ok(results)
}

/// Reads slot `slot_id` of a page buffer.
pub fn slot_at(buf: &[u8], slot_id: u16) -> Result<&SlotEntry> {
    let header = SlottedPageHeader::from_bytes(buf)?;
    if slot_id >= header.num_slots() {
        return Err(corrupt(format!(
            "slot {} out of range for page with {} slots",
            slot_id,
            header.num_slots()
        )));
    }
    let offset = PAGE_HEADER_SIZE + slot_id as usize * SLOT_ENTRY_SIZE;
    SlotEntry::from_bytes(&buf[offset..offset + SLOT_ENTRY_SIZE])
}

/// Returns the payload bytes of slot `slot_id`.
pub fn payload_at(buf: &[u8], slot_id: u16) -> Result<&[u8]> {
    let slot = slot_at(buf, slot_id)?;
    let start = slot.data_offset() as usize;
    let end = start + slot.length() as usize;
    if end > buf.len() {
        return Err(corrupt(format!(
            "slot {} points past the end of the page ({}..{})",
            slot_id, start, end
        )));
    }
    Ok(&buf[start..end])
}

/// Formats `buf` as a canonical empty page: zero tail, empty header.
pub fn format_empty_page(buf: &mut [u8]) -> Result<()> {
    eyre::ensure!(
        buf.len() == PAGE_SIZE,
        "page buffer is {} bytes, expected {}",
        buf.len(),
        PAGE_SIZE
    );
    buf.fill(0);
    SlottedPageHeader::new_empty().write_to(buf)
}
