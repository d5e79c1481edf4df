//! Positioned record access for one dataset
//!
//! A [`RecordReader`] binds a DSD, its resolved record schema and the shared
//! product stream. Records are either stored back to back (contiguous) or
//! line-interleaved with the records of all other measurement datasets.

use crate::core::record::{Field, Record};
use crate::core::schema::RecordSchema;
use crate::io::dsd::Dsd;
use crate::io::stream::ProductStream;
use crate::profile::ProductProfile;
use crate::types::{DatasetType, EnvisatError, EnvisatResult};
use std::sync::Arc;

/// Where record `i` of a dataset starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// `dataset_offset + i * record_size`
    Contiguous,
    /// `header_size + i * combined_stride + this_offset`
    Interleaved {
        header_size: u64,
        combined_stride: u64,
        this_offset: u64,
    },
}

impl RecordLayout {
    /// Interleaved layout of measurement dataset `dsd` among `dsds`
    pub fn interleaved(dsd: &Dsd, dsds: &[Dsd]) -> EnvisatResult<Self> {
        let measurement: Vec<&Dsd> = dsds
            .iter()
            .filter(|d| d.dataset_type == DatasetType::Measurement && !d.is_empty())
            .collect();

        let position = measurement
            .iter()
            .position(|d| d.index == dsd.index)
            .ok_or_else(|| {
                EnvisatError::IllegalLayout(format!(
                    "'{}' is not a non-empty measurement dataset",
                    dsd.dataset_name
                ))
            })?;

        let header_size = measurement.first().map_or(0, |d| d.dataset_offset);
        let combined_stride = measurement.iter().map(|d| d.record_size as u64).sum();
        let this_offset = measurement[..position]
            .iter()
            .map(|d| d.record_size as u64)
            .sum();

        Ok(RecordLayout::Interleaved {
            header_size,
            combined_stride,
            this_offset,
        })
    }

    fn record_offset(&self, dsd: &Dsd, index: usize) -> u64 {
        match *self {
            RecordLayout::Contiguous => dsd.dataset_offset + index as u64 * dsd.record_size as u64,
            RecordLayout::Interleaved {
                header_size,
                combined_stride,
                this_offset,
            } => header_size + index as u64 * combined_stride + this_offset,
        }
    }
}

/// Reads records and field segments of one dataset
#[derive(Debug)]
pub struct RecordReader {
    dsd: Dsd,
    schema: Arc<RecordSchema>,
    stream: Arc<ProductStream>,
    profile: Option<Arc<dyn ProductProfile>>,
    layout: RecordLayout,
}

impl RecordReader {
    /// Create a reader. Without a profile record indices are used as-is.
    pub fn new(
        dsd: Dsd,
        schema: Arc<RecordSchema>,
        stream: Arc<ProductStream>,
        profile: Option<Arc<dyn ProductProfile>>,
        layout: RecordLayout,
    ) -> Self {
        if !dsd.is_empty() && schema.size_in_bytes() != dsd.record_size {
            log::warn!(
                "record size of dataset '{}' is {} bytes in the DSD but {} bytes in the DDDB",
                dsd.dataset_name,
                dsd.record_size,
                schema.size_in_bytes()
            );
        }
        Self {
            dsd,
            schema,
            stream,
            profile,
            layout,
        }
    }

    pub fn dsd(&self) -> &Dsd {
        &self.dsd
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    pub fn num_records(&self) -> usize {
        self.dsd.num_records
    }

    pub fn dataset_name(&self) -> &str {
        &self.dsd.dataset_name
    }

    /// Create an empty record matching this reader's schema
    pub fn create_record(&self) -> Record {
        self.schema.create_record()
    }

    /// Physical record index for logical index `index`.
    ///
    /// Only measurement datasets go through the profile remap; `None` means
    /// the line has no physical record.
    pub fn remap(&self, index: usize) -> Option<usize> {
        match (&self.profile, self.dsd.dataset_type) {
            (Some(profile), DatasetType::Measurement) => {
                profile.map_record_index(&self.dsd.dataset_name, index)
            }
            _ => Some(index),
        }
    }

    /// Physical record index, or `None` for a gap or an index out of range
    fn physical_index(&self, index: usize) -> Option<usize> {
        self.remap(index).filter(|i| *i < self.dsd.num_records)
    }

    /// Stream offset of physical record `index`
    pub fn record_offset(&self, index: usize) -> u64 {
        self.layout.record_offset(&self.dsd, index)
    }

    /// Read record `index`; `Ok(None)` if the line has no physical record
    pub fn read_record(&self, index: usize) -> EnvisatResult<Option<Record>> {
        let mut record = self.create_record();
        if self.read_record_into(index, &mut record)? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Read record `index` into a caller-owned record.
    ///
    /// Returns `false` if the line has no physical record. A physical index
    /// outside the dataset is an error.
    pub fn read_record_into(&self, index: usize, record: &mut Record) -> EnvisatResult<bool> {
        let Some(physical) = self.remap(index) else {
            return Ok(false);
        };
        if physical >= self.dsd.num_records {
            return Err(EnvisatError::IllegalLayout(format!(
                "record index {} out of range for dataset '{}' with {} records",
                physical, self.dsd.dataset_name, self.dsd.num_records
            )));
        }
        self.stream.read_record_at(self.record_offset(physical), record)?;
        Ok(true)
    }

    /// Read elements `min_elem..=max_elem` of a field of record `index`.
    ///
    /// `field_offset` is the byte offset of the field in the record and
    /// `sample_stride` the number of raw elements per sample. The first
    /// `(max_elem - min_elem + 1) * sample_stride` raw elements of `field`
    /// are filled. Returns `false` without touching the stream when the
    /// line has no physical record. A segment reaching past the end of the
    /// field is an error.
    pub fn read_field_segment(
        &self,
        index: usize,
        field_offset: usize,
        sample_stride: usize,
        min_elem: usize,
        max_elem: usize,
        field: &mut Field,
    ) -> EnvisatResult<bool> {
        if max_elem >= min_elem {
            let field_len = field.schema().num_raw_elems();
            let end = (max_elem + 1).checked_mul(sample_stride);
            if sample_stride == 0 || end.map_or(true, |end| end > field_len) {
                return Err(EnvisatError::IllegalLayout(format!(
                    "elements {}..={} (stride {}) outside field '{}' of {} raw elements",
                    min_elem,
                    max_elem,
                    sample_stride,
                    field.name(),
                    field_len
                )));
            }
        }
        let Some(physical) = self.physical_index(index) else {
            return Ok(false);
        };
        if max_elem < min_elem {
            return Ok(true);
        }
        let elem_size = field.data_type().raw_elem_size();
        let offset = self.record_offset(physical)
            + field_offset as u64
            + (min_elem * sample_stride * elem_size) as u64;
        let count = (max_elem - min_elem + 1) * sample_stride;
        self.stream.read_field_at(offset, field, count)?;
        Ok(true)
    }

    /// Read a complete field of record `index`
    pub fn read_field(&self, index: usize, field_index: usize, field: &mut Field) -> EnvisatResult<bool> {
        if field_index >= self.schema.num_fields() {
            return Err(EnvisatError::IllegalLayout(format!(
                "field index {} out of range for dataset '{}'",
                field_index, self.dsd.dataset_name
            )));
        }
        let count = field.schema().num_raw_elems();
        if count == 0 {
            return Ok(true);
        }
        self.read_field_segment(index, self.schema.field_offset(field_index), 1, 0, count - 1, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldSchema;
    use crate::types::DataType;
    use std::io::Cursor;

    fn schema() -> Arc<RecordSchema> {
        let mut schema = RecordSchema::new("lines");
        schema.add_field(FieldSchema::new("counter", DataType::UInt32, 1));
        schema.add_field(FieldSchema::new("samples", DataType::UInt16, 8));
        Arc::new(schema)
    }

    fn product_bytes() -> Vec<u8> {
        let mut bytes = vec![0xEE; 100];
        for record in 0..4u32 {
            bytes.extend_from_slice(&record.to_be_bytes());
            for sample in 0..8u16 {
                bytes.extend_from_slice(&(record as u16 * 100 + sample).to_be_bytes());
            }
        }
        bytes
    }

    fn reader() -> RecordReader {
        let dsd = Dsd::new(0, "Lines", DatasetType::Measurement, None, 100, 80, 4, 20).unwrap();
        let stream = Arc::new(ProductStream::new(Cursor::new(product_bytes())));
        RecordReader::new(dsd, schema(), stream, None, RecordLayout::Contiguous)
    }

    #[test]
    fn test_contiguous_records() {
        let reader = reader();
        assert_eq!(reader.record_offset(2), 140);
        let record = reader.read_record(2).unwrap().unwrap();
        assert_eq!(record.field("counter").unwrap().elem_i64(0).unwrap(), 2);
        assert_eq!(record.field("samples").unwrap().elem_i64(7).unwrap(), 207);
        assert!(matches!(reader.read_record(4), Err(EnvisatError::IllegalLayout(_))));
    }

    #[test]
    fn test_field_segment() {
        let reader = reader();
        let mut field = reader.schema().fields()[1].create_field();
        assert!(reader.read_field_segment(3, 4, 1, 2, 5, &mut field).unwrap());
        let values: Vec<i64> = (0..4).map(|i| field.elem_i64(i).unwrap()).collect();
        assert_eq!(values, vec![302, 303, 304, 305]);
        assert!(!reader.read_field_segment(9, 4, 1, 0, 1, &mut field).unwrap());
    }

    #[test]
    fn test_field_segment_past_field_end() {
        let reader = reader();
        let mut field = reader.schema().fields()[1].create_field();
        assert!(matches!(
            reader.read_field_segment(0, 4, 1, 6, 8, &mut field),
            Err(EnvisatError::IllegalLayout(_))
        ));
        assert!(matches!(
            reader.read_field_segment(0, 4, 2, 2, 4, &mut field),
            Err(EnvisatError::IllegalLayout(_))
        ));
        // rejected before the gap lookup
        assert!(reader.read_field_segment(9, 4, 1, 0, 8, &mut field).is_err());
        assert!(reader.read_field_segment(0, 4, 2, 0, 3, &mut field).unwrap());
    }

    #[test]
    fn test_interleaved_layout() {
        let dsds = vec![
            Dsd::new(0, "Quality ADS", DatasetType::Annotation, None, 50, 10, 1, 10).unwrap(),
            Dsd::new(1, "Band 1", DatasetType::Measurement, None, 1000, 40, 4, 10).unwrap(),
            Dsd::new(2, "Band 2", DatasetType::Measurement, None, 1010, 24, 4, 6).unwrap(),
            Dsd::new(3, "Band 3", DatasetType::Measurement, None, 0, 0, 0, 0).unwrap(),
            Dsd::new(4, "Band 4", DatasetType::Measurement, None, 1016, 16, 4, 4).unwrap(),
        ];
        let layout = RecordLayout::interleaved(&dsds[4], &dsds).unwrap();
        assert_eq!(
            layout,
            RecordLayout::Interleaved {
                header_size: 1000,
                combined_stride: 20,
                this_offset: 16
            }
        );
        assert_eq!(layout.record_offset(&dsds[4], 3), 1076);
        assert!(RecordLayout::interleaved(&dsds[0], &dsds).is_err());
    }
}
