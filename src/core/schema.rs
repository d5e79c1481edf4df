//! Resolved record layouts: field descriptions in byte order

use crate::core::record::{Field, Record};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Description of a single record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    /// Number of elements; for ASCII fields this is the byte length
    pub num_elems: usize,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType, num_elems: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            num_elems: num_elems.max(1),
            unit: None,
            description: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Size of the field in a product file
    pub fn size_in_bytes(&self) -> usize {
        match self.data_type {
            DataType::Ascii => self.num_elems,
            other => self.num_elems * other.elem_size(),
        }
    }

    /// Number of raw buffer units needed to hold the field
    pub fn num_raw_elems(&self) -> usize {
        match self.data_type {
            DataType::Utc => self.num_elems * 3,
            _ => self.num_elems,
        }
    }

    /// Create an empty field backed by this description
    pub fn create_field(self: &Arc<Self>) -> Field {
        Field::new(Arc::clone(self))
    }
}

/// Ordered list of fields making up one dataset record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    name: String,
    fields: Vec<Arc<FieldSchema>>,
    size_in_bytes: usize,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            size_in_bytes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_field(&mut self, field: FieldSchema) {
        self.fields.push(Arc::new(field));
        self.update_size_in_bytes();
    }

    /// Append all fields of `other`, renaming each to `<prefix>.<name>`
    pub fn add_record(&mut self, other: &RecordSchema, prefix: &str) {
        for field in &other.fields {
            let mut renamed = field.as_ref().clone();
            renamed.name = format!("{}.{}", prefix, field.name);
            self.fields.push(Arc::new(renamed));
        }
        self.update_size_in_bytes();
    }

    fn update_size_in_bytes(&mut self) {
        self.size_in_bytes = self.fields.iter().map(|f| f.size_in_bytes()).sum();
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Arc<FieldSchema>] {
        &self.fields
    }

    pub fn field_at(&self, index: usize) -> Option<&Arc<FieldSchema>> {
        self.fields.get(index)
    }

    /// Case-insensitive index lookup
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Byte offset of field `index` from the start of the record
    pub fn field_offset(&self, index: usize) -> usize {
        self.fields.iter().take(index).map(|f| f.size_in_bytes()).sum()
    }

    /// Create an empty record with one field per description
    pub fn create_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }
}

impl std::fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "RecordSchema '{}' ({} bytes)", self.name, self.size_in_bytes)?;
        for (i, field) in self.fields.iter().enumerate() {
            writeln!(
                f,
                "  [{}] {} {} x{} @ {}",
                i,
                field.name,
                field.data_type,
                field.num_elems,
                self.field_offset(i)
            )?;
        }
        Ok(())
    }
}
