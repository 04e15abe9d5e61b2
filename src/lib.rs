//! # tabstore - Append-Only Paged Table Storage
//!
//! tabstore is a minimal on-disk storage engine for append-only, typed,
//! tabular data. A table is declared with a fixed column schema and then
//! bulk-loaded from delimited text files. Rows are serialized into a compact
//! binary format and packed into fixed-size slotted pages; a persistent page
//! directory tracks per-page free space so later loads can reuse a page with
//! enough room or allocate fresh ones.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tabstore::{Column, DataType, Table};
//!
//! let mut table = Table::open("./users")?;
//! table.create_schema(&[
//!     Column::new("id", DataType::Int),
//!     Column::new("name", DataType::Text),
//!     Column::new("joined", DataType::Date),
//! ])?;
//!
//! let inserted = table.load_from_file("users.tsv", '\t')?;
//! ```
//!
//! ## Architecture
//!
//! The engine is a pipeline of cooperating components, leaves first:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Table Facade (Table)          │
//! ├──────────────────┬──────────────────┤
//! │  Schema Store    │  Ingest Parser   │
//! ├──────────────────┴──────────────────┤
//! │      Page Manager (bulk insert)      │
//! ├──────────────────┬──────────────────┤
//! │  Slotted Page    │  Page Directory  │
//! ├──────────────────┴──────────────────┤
//! │        Blob I/O (BlobStore)          │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! Each table owns a directory with three files:
//!
//! ```text
//! table_dir/
//! ├── schema.dat          # column list
//! ├── pagedirectory.dat   # header + (page_id, available_space) entries
//! └── pages.dat           # num_pages × PAGE_SIZE slotted pages
//! ```
//!
//! Pages live at file offset `page_id * PAGE_SIZE`. All on-disk integers are
//! little-endian with explicit widths.
//!
//! ## Scope
//!
//! Insertion is append-only and single-writer. There is no query layer, no
//! indexing, no deletes or updates, no transactions, and no crash recovery
//! beyond what the file layouts themselves imply.
//!
//! ## Module Overview
//!
//! - [`storage`]: blob I/O, slotted pages, page directory, page manager
//! - [`records`]: row construction and binary serialization
//! - [`schema`]: column-list persistence
//! - [`parsing`]: delimited ingest-file parsing
//! - [`table`]: the user-facing facade
//! - [`config`]: page geometry and file-layout constants
//! - [`error`]: the error kinds surfaced at the API boundary

pub mod config;
pub mod error;
pub mod parsing;
pub mod records;
pub mod schema;
pub mod storage;
pub mod table;
pub mod types;

pub use error::StorageError;
pub use records::{convert_value, Row};
pub use storage::{BlobStore, FileBlobStore, RowLocation, PAGE_SIZE};
pub use table::Table;
pub use types::{Column, DataType, Value};
