//! # Row Codec
//!
//! Construction, validation, and binary serialization of rows against a
//! column schema.
//!
//! ## Row Format
//!
//! A serialized row is the column-order concatenation of:
//!
//! ```text
//! INT    -> 4 bytes, i32 little-endian
//! FLOAT  -> 4 bytes, f32 little-endian
//! TEXT   -> u16 little-endian length, then that many raw bytes
//! DATE   -> as TEXT (the DD/MM/YYYY form is validated at construction)
//! ```
//!
//! There is no terminator and no padding; the schema is required to decode.
//! [`Row::serialized_size`] reports exactly the byte count
//! [`Row::serialize`] will emit, which is what the page-packing math in the
//! page manager relies on.
//!
//! ## Validation
//!
//! `Row::new` rejects cardinality mismatches (`SchemaMismatch`), per-column
//! payload mismatches (`TypeMismatch`), malformed DATE strings
//! (`InvalidDate`), and text payloads too long for the u16 length prefix.
//! A constructed row is therefore always serializable.

use eyre::{ensure, Result};

use crate::error::StorageError;
use crate::types::{is_valid_date, Column, DataType, Value};

/// A validated row: typed values parallel to a borrowed schema.
#[derive(Debug, Clone)]
pub struct Row<'a> {
    schema: &'a [Column],
    values: Vec<Value>,
}

impl<'a> Row<'a> {
    /// Constructs a row, checking cardinality, per-column types, and the
    /// DATE format predicate.
    pub fn new(schema: &'a [Column], values: Vec<Value>) -> Result<Self> {
        if schema.len() != values.len() {
            return Err(StorageError::SchemaMismatch {
                values: values.len(),
                columns: schema.len(),
            }
            .into());
        }

        for (index, (column, value)) in schema.iter().zip(&values).enumerate() {
            if !value.matches(column.data_type()) {
                return Err(StorageError::TypeMismatch {
                    index,
                    column: column.name().to_string(),
                    expected: column.data_type(),
                    actual: value.type_name(),
                }
                .into());
            }
            if let (DataType::Date, Value::Text(text)) = (column.data_type(), value) {
                if !is_valid_date(text) {
                    return Err(StorageError::InvalidDate {
                        index,
                        value: text.clone(),
                    }
                    .into());
                }
            }
            if let Value::Text(text) = value {
                ensure!(
                    text.len() <= u16::MAX as usize,
                    "text value at column {} is {} bytes; the length prefix caps at {}",
                    index,
                    text.len(),
                    u16::MAX
                );
            }
        }

        Ok(Self { schema, values })
    }

    /// Serializes the row into a fresh buffer, per the module format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        for value in &self.values {
            match value {
                Value::Int(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::Text(v) => {
                    buf.extend_from_slice(&(v.len() as u16).to_le_bytes());
                    buf.extend_from_slice(v.as_bytes());
                }
            }
        }
        buf
    }

    /// Returns the exact byte count [`Row::serialize`] will produce.
    pub fn serialized_size(&self) -> usize {
        self.values
            .iter()
            .map(|value| match value {
                Value::Int(_) | Value::Float(_) => 4,
                Value::Text(v) => 2 + v.len(),
            })
            .sum()
    }

    /// Returns the schema this row was validated against.
    pub fn schema(&self) -> &[Column] {
        self.schema
    }

    /// Returns the values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get_int(&self, index: usize) -> Result<i32> {
        match self.checked(index, DataType::Int)? {
            Value::Int(v) => Ok(*v),
            _ => unreachable!("checked() verified the column type"),
        }
    }

    pub fn get_float(&self, index: usize) -> Result<f32> {
        match self.checked(index, DataType::Float)? {
            Value::Float(v) => Ok(*v),
            _ => unreachable!("checked() verified the column type"),
        }
    }

    pub fn get_text(&self, index: usize) -> Result<&str> {
        match self.checked(index, DataType::Text)? {
            Value::Text(v) => Ok(v),
            _ => unreachable!("checked() verified the column type"),
        }
    }

    pub fn get_date(&self, index: usize) -> Result<&str> {
        match self.checked(index, DataType::Date)? {
            Value::Text(v) => Ok(v),
            _ => unreachable!("checked() verified the column type"),
        }
    }

    pub fn set_int(&mut self, index: usize, value: i32) -> Result<()> {
        self.checked(index, DataType::Int)?;
        self.values[index] = Value::Int(value);
        Ok(())
    }

    pub fn set_float(&mut self, index: usize, value: f32) -> Result<()> {
        self.checked(index, DataType::Float)?;
        self.values[index] = Value::Float(value);
        Ok(())
    }

    pub fn set_text(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        self.checked(index, DataType::Text)?;
        let text = value.into();
        ensure!(
            text.len() <= u16::MAX as usize,
            "text value is {} bytes; the length prefix caps at {}",
            text.len(),
            u16::MAX
        );
        self.values[index] = Value::Text(text);
        Ok(())
    }

    pub fn set_date(&mut self, index: usize, value: impl Into<String>) -> Result<()> {
        self.checked(index, DataType::Date)?;
        let text = value.into();
        if !is_valid_date(&text) {
            return Err(StorageError::InvalidDate { index, value: text }.into());
        }
        self.values[index] = Value::Text(text);
        Ok(())
    }

    fn checked(&self, index: usize, expected: DataType) -> Result<&Value> {
        let column = self.schema.get(index).ok_or_else(|| {
            eyre::eyre!(
                "column index {} out of range for {}-column schema",
                index,
                self.schema.len()
            )
        })?;
        if column.data_type() != expected {
            return Err(StorageError::TypeMismatch {
                index,
                column: column.name().to_string(),
                expected,
                actual: self.values[index].type_name(),
            }
            .into());
        }
        Ok(&self.values[index])
    }
}

/// Parses one textual token from an ingest file into the value a column of
/// `target` type stores. TEXT and DATE pass through unparsed; DATE format
/// validation happens at row construction.
pub fn convert_value(token: &str, target: DataType) -> Result<Value> {
    match target {
        DataType::Int => token.parse::<i32>().map(Value::Int).map_err(|_| {
            StorageError::ConversionError {
                token: token.to_string(),
                target,
            }
            .into()
        }),
        DataType::Float => token.parse::<f32>().map(Value::Float).map_err(|_| {
            StorageError::ConversionError {
                token: token.to_string(),
                target,
            }
            .into()
        }),
        DataType::Text | DataType::Date => Ok(Value::Text(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Column, DataType, Value};

    fn sample_schema() -> Vec<Column> {
        vec![
            Column::new("id", DataType::Int),
            Column::new("score", DataType::Float),
            Column::new("name", DataType::Text),
            Column::new("joined", DataType::Date),
        ]
    }

    fn sample_values() -> Vec<Value> {
        vec![
            Value::Int(42),
            Value::Float(2.5),
            Value::Text("alice".into()),
            Value::Text("01/02/2023".into()),
        ]
    }

    #[test]
    fn serialize_matches_serialized_size() {
        let schema = sample_schema();
        let row = Row::new(&schema, sample_values()).unwrap();

        assert_eq!(row.serialize().len(), row.serialized_size());
        // 4 + 4 + (2 + 5) + (2 + 10)
        assert_eq!(row.serialized_size(), 27);
    }

    #[test]
    fn serialized_layout_is_little_endian_and_length_prefixed() {
        let schema = vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::Text),
        ];
        let row = Row::new(&schema, vec![Value::Int(1), Value::Text("ab".into())]).unwrap();

        let bytes = row.serialize();
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..6], &2u16.to_le_bytes());
        assert_eq!(&bytes[6..8], b"ab");
    }

    #[test]
    fn cardinality_mismatch_is_rejected() {
        let schema = sample_schema();
        let err = Row::new(&schema, vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::SchemaMismatch {
                values: 1,
                columns: 4
            })
        ));
    }

    #[test]
    fn type_mismatch_names_the_column() {
        let schema = sample_schema();
        let mut values = sample_values();
        values[0] = Value::Text("not an int".into());

        let err = Row::new(&schema, values).unwrap_err();
        match err.downcast_ref::<StorageError>() {
            Some(StorageError::TypeMismatch { index, column, .. }) => {
                assert_eq!(*index, 0);
                assert_eq!(column, "id");
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn malformed_date_is_rejected() {
        let schema = sample_schema();
        let mut values = sample_values();
        values[3] = Value::Text("2023-02-01".into());

        let err = Row::new(&schema, values).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::InvalidDate { index: 3, .. })
        ));
    }

    #[test]
    fn typed_accessors_round_trip() {
        let schema = sample_schema();
        let mut row = Row::new(&schema, sample_values()).unwrap();

        assert_eq!(row.get_int(0).unwrap(), 42);
        assert_eq!(row.get_float(1).unwrap(), 2.5);
        assert_eq!(row.get_text(2).unwrap(), "alice");
        assert_eq!(row.get_date(3).unwrap(), "01/02/2023");

        row.set_int(0, 7).unwrap();
        row.set_text(2, "bob").unwrap();
        row.set_date(3, "02/03/2024").unwrap();
        assert_eq!(row.get_int(0).unwrap(), 7);
        assert_eq!(row.get_text(2).unwrap(), "bob");
        assert_eq!(row.get_date(3).unwrap(), "02/03/2024");
    }

    #[test]
    fn accessors_enforce_the_column_type() {
        let schema = sample_schema();
        let mut row = Row::new(&schema, sample_values()).unwrap();

        assert!(row.get_int(2).is_err());
        assert!(row.set_float(0, 1.0).is_err());
        assert!(row.set_date(3, "not a date").is_err());
        assert!(row.get_int(9).is_err());
    }

    #[test]
    fn convert_parses_ints_and_floats() {
        assert_eq!(convert_value("42", DataType::Int).unwrap(), Value::Int(42));
        assert_eq!(
            convert_value("-17", DataType::Int).unwrap(),
            Value::Int(-17)
        );
        assert_eq!(
            convert_value("2.5", DataType::Float).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn convert_passes_text_and_date_through() {
        assert_eq!(
            convert_value("hello", DataType::Text).unwrap(),
            Value::Text("hello".into())
        );
        assert_eq!(
            convert_value("31/12/2020", DataType::Date).unwrap(),
            Value::Text("31/12/2020".into())
        );
    }

    #[test]
    fn convert_rejects_garbage_numerics() {
        let err = convert_value("12abc", DataType::Int).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::ConversionError { .. })
        ));
        assert!(convert_value("", DataType::Float).is_err());
    }

    #[test]
    fn empty_schema_empty_row() {
        let schema: Vec<Column> = vec![];
        let row = Row::new(&schema, vec![]).unwrap();
        assert_eq!(row.serialized_size(), 0);
        assert!(row.serialize().is_empty());
    }
}
