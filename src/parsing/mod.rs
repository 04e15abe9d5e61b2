//! # Delimited-File Ingest Parsing
//!
//! Turns a delimited text file into a batch of serialized rows ready for
//! bulk insertion. The first line must be a header naming the schema's
//! columns in order; every later non-empty line is one row.
//!
//! ## Contract With the Page Manager
//!
//! [`ParsedBatch::serialized_size`] is the batch's *on-page footprint*:
//! the serialized bytes of every row plus one slot entry per row. The page
//! manager computes its required space the same way and validates the two
//! figures against each other at the end of the bulk insert.
//!
//! ## Malformed Input
//!
//! A header that does not match the schema is fatal. A data row with the
//! wrong field count, an unconvertible token, or a value the codec rejects
//! is skipped with a warning; the rest of the file still loads. Empty lines
//! are ignored, and a trailing `\r` is stripped so CRLF files parse.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use eyre::{bail, Result, WrapErr};
use tracing::{debug, warn};

use crate::config::SLOT_ENTRY_SIZE;
use crate::error::StorageError;
use crate::records::{convert_value, Row};
use crate::types::Column;

/// Output of parsing one ingest file: serialized rows in file order plus
/// the totals the page manager validates against.
#[derive(Debug)]
pub struct ParsedBatch {
    /// Serialized row payloads, in file order.
    pub rows: Vec<Vec<u8>>,
    /// On-page footprint: serialized bytes plus slot overhead per row.
    pub serialized_size: usize,
    /// Number of rows that survived parsing.
    pub num_rows: usize,
}

/// Parses `path` against `schema`, splitting fields on `delimiter`.
pub fn parse_file(path: &Path, delimiter: char, schema: &[Column]) -> Result<ParsedBatch> {
    debug!(path = %path.display(), delimiter = %delimiter, "parsing ingest file");
    let file = File::open(path)
        .map_err(StorageError::Io)
        .wrap_err_with(|| format!("failed to open ingest file '{}'", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line.map_err(StorageError::Io)?,
        None => bail!("ingest file '{}' is empty", path.display()),
    };
    check_header(trim_line(&header), delimiter, schema, path)?;

    let mut rows = Vec::new();
    let mut serialized_size = 0;

    for (line_no, line) in lines.enumerate() {
        let line = line.map_err(StorageError::Io)?;
        let line = trim_line(&line);
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(delimiter).collect();
        if fields.len() != schema.len() {
            warn!(
                line = line_no + 2,
                fields = fields.len(),
                expected = schema.len(),
                "skipping row with unexpected field count"
            );
            continue;
        }

        let values = match fields
            .iter()
            .zip(schema)
            .map(|(token, column)| convert_value(token, column.data_type()))
            .collect::<Result<Vec<_>>>()
        {
            Ok(values) => values,
            Err(err) => {
                warn!(line = line_no + 2, %err, "skipping unconvertible row");
                continue;
            }
        };

        let row = match Row::new(schema, values) {
            Ok(row) => row,
            Err(err) => {
                warn!(line = line_no + 2, %err, "skipping row rejected by the codec");
                continue;
            }
        };

        serialized_size += row.serialized_size() + SLOT_ENTRY_SIZE;
        rows.push(row.serialize());
    }

    debug!(num_rows = rows.len(), serialized_size, "ingest file parsed");
    Ok(ParsedBatch {
        num_rows: rows.len(),
        serialized_size,
        rows,
    })
}

fn trim_line(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn check_header(header: &str, delimiter: char, schema: &[Column], path: &Path) -> Result<()> {
    let names: Vec<&str> = header.split(delimiter).collect();
    if names.len() != schema.len() {
        bail!(
            "header of '{}' has {} columns, but the schema defines {}",
            path.display(),
            names.len(),
            schema.len()
        );
    }
    for (index, (name, column)) in names.iter().zip(schema).enumerate() {
        if *name != column.name() {
            bail!(
                "header column {} of '{}' is '{}', expected '{}'",
                index,
                path.display(),
                name,
                column.name()
            );
        }
    }
    Ok(())
}
