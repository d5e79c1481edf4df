//! In-memory record and field values
//!
//! Records and fields are mutable scratch buffers. They are sized once from
//! their schema and then refilled in place, so a caller decoding many lines
//! can keep one instance and pass it back into every read.

use crate::core::schema::{FieldSchema, RecordSchema};
use crate::types::{DataType, EnvisatError, EnvisatResult, ProductUtc};
use std::io::{self, Read};
use std::sync::Arc;

const READ_CHUNK_BYTES: usize = 4096;

/// Typed element buffer of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Ascii(Vec<u8>),
    /// Three i32 values (days, seconds, microseconds) per UTC element
    Utc(Vec<i32>),
}

macro_rules! decode_be {
    ($values:expr, $bytes:expr, $t:ty) => {
        for (value, chunk) in $values
            .iter_mut()
            .zip($bytes.chunks_exact(std::mem::size_of::<$t>()))
        {
            let mut raw = [0u8; std::mem::size_of::<$t>()];
            raw.copy_from_slice(chunk);
            *value = <$t>::from_be_bytes(raw);
        }
    };
}

impl FieldData {
    /// Zero-filled buffer holding `len` raw units of `data_type`
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Int8 => FieldData::Int8(vec![0; len]),
            DataType::UInt8 => FieldData::UInt8(vec![0; len]),
            DataType::Int16 => FieldData::Int16(vec![0; len]),
            DataType::UInt16 => FieldData::UInt16(vec![0; len]),
            DataType::Int32 => FieldData::Int32(vec![0; len]),
            DataType::UInt32 => FieldData::UInt32(vec![0; len]),
            DataType::Float32 => FieldData::Float32(vec![0.0; len]),
            DataType::Float64 => FieldData::Float64(vec![0.0; len]),
            DataType::Ascii => FieldData::Ascii(vec![0; len]),
            DataType::Utc => FieldData::Utc(vec![0; len]),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            FieldData::Int8(_) => DataType::Int8,
            FieldData::UInt8(_) => DataType::UInt8,
            FieldData::Int16(_) => DataType::Int16,
            FieldData::UInt16(_) => DataType::UInt16,
            FieldData::Int32(_) => DataType::Int32,
            FieldData::UInt32(_) => DataType::UInt32,
            FieldData::Float32(_) => DataType::Float32,
            FieldData::Float64(_) => DataType::Float64,
            FieldData::Ascii(_) => DataType::Ascii,
            FieldData::Utc(_) => DataType::Utc,
        }
    }

    /// Number of raw units in the buffer
    pub fn len(&self) -> usize {
        match self {
            FieldData::Int8(v) => v.len(),
            FieldData::UInt8(v) | FieldData::Ascii(v) => v.len(),
            FieldData::Int16(v) => v.len(),
            FieldData::UInt16(v) => v.len(),
            FieldData::Int32(v) | FieldData::Utc(v) => v.len(),
            FieldData::UInt32(v) => v.len(),
            FieldData::Float32(v) => v.len(),
            FieldData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill the first `count` raw units from big-endian bytes read sequentially
    /// from `reader`. The buffer length never changes.
    ///
    /// Bytes pass through a fixed stack buffer, so repeated reads into the
    /// same field do not allocate.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R, count: usize) -> io::Result<()> {
        let count = count.min(self.len());
        let unit_size = self.data_type().raw_elem_size();
        let units_per_chunk = READ_CHUNK_BYTES / unit_size;
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        let mut start = 0;
        while start < count {
            let end = (start + units_per_chunk).min(count);
            let bytes = &mut chunk[..(end - start) * unit_size];
            reader.read_exact(bytes)?;
            self.decode_into(start..end, bytes);
            start = end;
        }
        Ok(())
    }

    fn decode_into(&mut self, range: std::ops::Range<usize>, bytes: &[u8]) {
        match self {
            FieldData::Int8(v) => {
                for (value, byte) in v[range].iter_mut().zip(bytes) {
                    *value = *byte as i8;
                }
            }
            FieldData::UInt8(v) | FieldData::Ascii(v) => v[range].copy_from_slice(bytes),
            FieldData::Int16(v) => decode_be!(v[range], bytes, i16),
            FieldData::UInt16(v) => decode_be!(v[range], bytes, u16),
            FieldData::Int32(v) | FieldData::Utc(v) => decode_be!(v[range], bytes, i32),
            FieldData::UInt32(v) => decode_be!(v[range], bytes, u32),
            FieldData::Float32(v) => decode_be!(v[range], bytes, f32),
            FieldData::Float64(v) => decode_be!(v[range], bytes, f64),
        }
    }

    /// Raw unit `index` as an integer. Floats are truncated.
    pub fn get_i64(&self, index: usize) -> Option<i64> {
        match self {
            FieldData::Int8(v) => v.get(index).map(|&x| x as i64),
            FieldData::UInt8(v) | FieldData::Ascii(v) => v.get(index).map(|&x| x as i64),
            FieldData::Int16(v) => v.get(index).map(|&x| x as i64),
            FieldData::UInt16(v) => v.get(index).map(|&x| x as i64),
            FieldData::Int32(v) | FieldData::Utc(v) => v.get(index).map(|&x| x as i64),
            FieldData::UInt32(v) => v.get(index).map(|&x| x as i64),
            FieldData::Float32(v) => v.get(index).map(|&x| x as i64),
            FieldData::Float64(v) => v.get(index).map(|&x| x as i64),
        }
    }

    /// Raw unit `index` as a float
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            FieldData::Float32(v) => v.get(index).map(|&x| x as f64),
            FieldData::Float64(v) => v.get(index).copied(),
            other => other.get_i64(index).map(|x| x as f64),
        }
    }
}

/// A field value: a shared description plus an owned, fixed-length buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    schema: Arc<FieldSchema>,
    data: FieldData,
}

impl Field {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        let data = FieldData::zeros(schema.data_type, schema.num_raw_elems());
        Self { schema, data }
    }

    /// Wrap an already populated buffer. Type and length must match the schema.
    pub fn with_data(schema: Arc<FieldSchema>, data: FieldData) -> EnvisatResult<Self> {
        if data.data_type() != schema.data_type || data.len() != schema.num_raw_elems() {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "field '{}': buffer {} x{} does not match schema {} x{}",
                schema.name,
                data.data_type(),
                data.len(),
                schema.data_type,
                schema.num_raw_elems()
            )));
        }
        Ok(Self { schema, data })
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn data_type(&self) -> DataType {
        self.schema.data_type
    }

    pub fn num_elems(&self) -> usize {
        self.schema.num_elems
    }

    pub fn unit(&self) -> Option<&str> {
        self.schema.unit.as_deref()
    }

    /// Raw buffer for sample decoders
    pub fn data(&self) -> &FieldData {
        &self.data
    }

    /// Read the complete field from the current stream position
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<()> {
        let len = self.data.len();
        self.data.read_from(reader, len)
    }

    /// Read only the first `count` raw units (used for line segments)
    pub fn read_raw_elems<R: Read + ?Sized>(&mut self, reader: &mut R, count: usize) -> EnvisatResult<()> {
        if count > self.data.len() {
            return Err(EnvisatError::IllegalLayout(format!(
                "segment of {} elements does not fit into field '{}' ({} elements)",
                count,
                self.name(),
                self.data.len()
            )));
        }
        self.data.read_from(reader, count)?;
        Ok(())
    }

    fn out_of_range(&self, index: usize) -> EnvisatError {
        EnvisatError::IllegalLayout(format!(
            "element index {} out of range for field '{}' ({} elements)",
            index,
            self.name(),
            self.data.len()
        ))
    }

    pub fn elem_i64(&self, index: usize) -> EnvisatResult<i64> {
        self.data.get_i64(index).ok_or_else(|| self.out_of_range(index))
    }

    pub fn elem_f64(&self, index: usize) -> EnvisatResult<f64> {
        self.data.get_f64(index).ok_or_else(|| self.out_of_range(index))
    }

    /// UTC element `index` of a UTC field
    pub fn elem_utc(&self, index: usize) -> Option<ProductUtc> {
        match &self.data {
            FieldData::Utc(v) => {
                let base = index * 3;
                let parts = v.get(base..base + 3)?;
                Some(ProductUtc::new(parts[0], parts[1], parts[2]))
            }
            _ => None,
        }
    }

    /// String form of the value. ASCII fields yield their text, numeric
    /// fields their elements separated by commas.
    pub fn as_string(&self) -> String {
        match &self.data {
            FieldData::Ascii(bytes) => String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string(),
            FieldData::Utc(_) => (0..self.num_elems())
                .filter_map(|i| self.elem_utc(i))
                .map(|utc| utc.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            FieldData::Float32(_) | FieldData::Float64(_) => (0..self.data.len())
                .filter_map(|i| self.data.get_f64(i))
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            _ => (0..self.data.len())
                .filter_map(|i| self.data.get_i64(i))
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// A record value: one field per field schema, in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<RecordSchema>,
    fields: Vec<Field>,
}

impl Record {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        let fields = schema.fields().iter().map(|f| Field::new(Arc::clone(f))).collect();
        Self { schema, fields }
    }

    /// Build a record from already populated fields (used for headers)
    pub(crate) fn from_fields(schema: Arc<RecordSchema>, fields: Vec<Field>) -> Self {
        Self { schema, fields }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_at(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Case-insensitive lookup by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Read all fields in schema order, purely sequentially
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<()> {
        for field in &mut self.fields {
            field.read_from(reader)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Record '{}'", self.schema.name())?;
        for field in &self.fields {
            writeln!(f, "  {} = {}", field.name(), field.as_string())?;
        }
        Ok(())
    }
}
