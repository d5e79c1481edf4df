//! Raster line extraction for one band

use crate::core::catalog::{BandDescriptor, PixelSource};
use crate::core::record::Field;
use crate::core::sample::{DecodeSpan, RasterSample, SampleDecoder};
use crate::io::record_reader::RecordReader;
use crate::profile::ProductProfile;
use crate::types::{DatasetType, EnvisatError, EnvisatResult};
use std::sync::Arc;

/// Reads raster lines of a band backed by a record field
#[derive(Debug, Clone)]
pub struct BandLineReader {
    band: Arc<BandDescriptor>,
    reader: Arc<RecordReader>,
    profile: Arc<dyn ProductProfile>,
    decoder: SampleDecoder,
    field_index: usize,
    field_offset: usize,
}

impl BandLineReader {
    pub fn new(
        band: Arc<BandDescriptor>,
        reader: Arc<RecordReader>,
        profile: Arc<dyn ProductProfile>,
    ) -> EnvisatResult<Self> {
        let field_index = match &band.source {
            PixelSource::Field { field_index, .. } => *field_index,
            PixelSource::Expression(expr) => {
                return Err(EnvisatError::IllegalLayout(format!(
                    "band '{}' is virtual ({}) and has no line reader",
                    band.name, expr
                )))
            }
        };
        let decoder = band.decoder.ok_or_else(|| {
            EnvisatError::IllegalLayout(format!("band '{}' has no sample decoder", band.name))
        })?;
        if field_index >= reader.schema().num_fields() {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "band '{}' refers to field {} but dataset '{}' has {} fields",
                band.name,
                field_index + 1,
                reader.dataset_name(),
                reader.schema().num_fields()
            )));
        }
        let field_offset = reader.schema().field_offset(field_index);
        Ok(Self {
            band,
            reader,
            profile,
            decoder,
            field_index,
            field_offset,
        })
    }

    pub fn band(&self) -> &Arc<BandDescriptor> {
        &self.band
    }

    pub fn record_reader(&self) -> &Arc<RecordReader> {
        &self.reader
    }

    pub fn field_index(&self) -> usize {
        self.field_index
    }

    /// Scratch field for [`read_raster_line`](Self::read_raster_line), one per thread
    pub fn create_scratch_field(&self) -> Field {
        self.reader.schema().fields()[self.field_index].create_field()
    }

    fn is_mirrored(&self) -> bool {
        !self.profile.stores_pixels_in_chronological_order()
            && self.reader.dsd().dataset_type == DatasetType::Measurement
    }

    /// Decode pixels `min_x..=max_x` step `step_x` of raster line `line`
    /// into `dest[dest_pos..]`.
    ///
    /// Returns `false` if the line has no physical record, in which case the
    /// span is filled with the profile's missing pixel value.
    #[allow(clippy::too_many_arguments)]
    pub fn read_raster_line<T: RasterSample>(
        &self,
        line: usize,
        min_x: usize,
        max_x: usize,
        step_x: usize,
        scratch: &mut Field,
        dest: &mut [T],
        dest_pos: usize,
    ) -> EnvisatResult<bool> {
        if step_x == 0 || max_x < min_x {
            return Err(EnvisatError::IllegalLayout(format!(
                "invalid pixel range {}..={} step {} for band '{}'",
                min_x, max_x, step_x, self.band.name
            )));
        }
        let num_samples = (max_x - min_x) / step_x + 1;
        if dest_pos + num_samples > dest.len() {
            return Err(EnvisatError::IllegalLayout(format!(
                "{} samples at {} exceed destination of {}",
                num_samples,
                dest_pos,
                dest.len()
            )));
        }
        let last_x = min_x + (num_samples - 1) * step_x;
        let width = self.band.width;
        if last_x >= width {
            return Err(EnvisatError::IllegalLayout(format!(
                "pixel {} outside band '{}' of width {}",
                last_x, self.band.name, width
            )));
        }

        let span = if self.is_mirrored() {
            DecodeSpan {
                min_x: width - 1 - last_x,
                max_x: width - 1 - min_x,
                step_x,
                dest_pos: dest_pos + num_samples - 1,
                dest_incr: -1,
            }
        } else {
            DecodeSpan {
                min_x,
                max_x: last_x,
                step_x,
                dest_pos,
                dest_incr: 1,
            }
        };

        let present = self.reader.read_field_segment(
            line,
            self.field_offset,
            self.decoder.stride(),
            span.min_x,
            span.max_x,
            scratch,
        )?;
        if !present {
            let missing = T::from_f64(self.profile.missing_pixel_value());
            dest[dest_pos..dest_pos + num_samples].fill(missing);
            return Ok(false);
        }

        self.decoder.decode(scratch.data(), &span, dest)?;
        Ok(true)
    }
}
