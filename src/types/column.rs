//! # Column Definitions
//!
//! A column pairs a name with a [`DataType`]. An ordered sequence of columns
//! is a schema; rows are validated against it position by position.

use super::DataType;

/// One schema position: a named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
}

impl Column {
    /// Creates a new column definition with the given name and type.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns the column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}
