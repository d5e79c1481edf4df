//! Sample extraction decoders
//!
//! A decoder turns the raw buffer of one measurement field into raster
//! samples. The buffer holds a segment starting at the first requested
//! sample slot, as filled by a field segment read.

use crate::core::record::FieldData;
use crate::types::{DataType, EnvisatError, EnvisatResult};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

/// Storage convention of samples within a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleModel {
    /// `1OF1`: one sample per element
    OneOfOne,
    /// `1OF2`: first element of each pair
    OneOfTwo,
    /// `2OF2`: second element of each pair
    TwoOfTwo,
    /// `2TOF`: two bytes combined into a 16-bit value
    TwoBytesToShort,
    /// `3TOI`: three bytes combined into a 24-bit value
    ThreeBytesToInt,
}

impl SampleModel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "1OF1" => Some(SampleModel::OneOfOne),
            "1OF2" => Some(SampleModel::OneOfTwo),
            "2OF2" => Some(SampleModel::TwoOfTwo),
            "2TOF" => Some(SampleModel::TwoBytesToShort),
            "3TOI" => Some(SampleModel::ThreeBytesToInt),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SampleModel::OneOfOne => "1OF1",
            SampleModel::OneOfTwo => "1OF2",
            SampleModel::TwoOfTwo => "2OF2",
            SampleModel::TwoBytesToShort => "2TOF",
            SampleModel::ThreeBytesToInt => "3TOI",
        }
    }

    /// Raw elements occupied by one sample slot
    pub fn stride(&self) -> usize {
        match self {
            SampleModel::OneOfOne => 1,
            SampleModel::OneOfTwo | SampleModel::TwoOfTwo | SampleModel::TwoBytesToShort => 2,
            SampleModel::ThreeBytesToInt => 3,
        }
    }
}

impl std::fmt::Display for SampleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Destination element type of a decoded raster line
pub trait RasterSample: Copy + Send + Sync + 'static {
    fn from_i64(value: i64) -> Self;
    fn from_f64(value: f64) -> Self;
}

impl<T> RasterSample for T
where
    T: Copy + Send + Sync + 'static,
    i64: AsPrimitive<T>,
    f64: AsPrimitive<T>,
{
    fn from_i64(value: i64) -> Self {
        value.as_()
    }

    fn from_f64(value: f64) -> Self {
        value.as_()
    }
}

/// Placement of decoded samples: source slots `min_x..=max_x` stepped by
/// `step_x`, written to `dest[dest_pos]`, `dest[dest_pos + dest_incr]`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSpan {
    pub min_x: usize,
    pub max_x: usize,
    pub step_x: usize,
    pub dest_pos: usize,
    pub dest_incr: isize,
}

impl DecodeSpan {
    pub fn num_samples(&self) -> usize {
        if self.max_x < self.min_x || self.step_x == 0 {
            0
        } else {
            (self.max_x - self.min_x) / self.step_x + 1
        }
    }
}

/// A decoder for one `(sample model, source type)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleDecoder {
    model: SampleModel,
    source_type: DataType,
}

impl SampleDecoder {
    /// Select the decoder for a band. Unsupported pairs fail here, not at decode time.
    pub fn select(model: SampleModel, source_type: DataType) -> EnvisatResult<Self> {
        let supported = match model {
            SampleModel::OneOfOne | SampleModel::OneOfTwo | SampleModel::TwoOfTwo => {
                source_type.is_numeric()
            }
            SampleModel::TwoBytesToShort | SampleModel::ThreeBytesToInt => {
                matches!(source_type, DataType::Int8 | DataType::UInt8)
            }
        };
        if !supported {
            return Err(EnvisatError::UnsupportedSampleScheme {
                model: model.name().to_string(),
                data_type: source_type,
            });
        }
        Ok(Self { model, source_type })
    }

    pub fn model(&self) -> SampleModel {
        self.model
    }

    pub fn source_type(&self) -> DataType {
        self.source_type
    }

    pub fn stride(&self) -> usize {
        self.model.stride()
    }

    /// Decode `span` from `source` into `dest`
    pub fn decode<T: RasterSample>(
        &self,
        source: &FieldData,
        span: &DecodeSpan,
        dest: &mut [T],
    ) -> EnvisatResult<()> {
        if source.data_type() != self.source_type {
            return Err(EnvisatError::UnsupportedSampleScheme {
                model: self.model.name().to_string(),
                data_type: source.data_type(),
            });
        }

        let n = span.num_samples();
        if n == 0 {
            return Ok(());
        }

        let needed = (span.max_x - span.min_x + 1) * self.stride();
        if needed > source.len() {
            return Err(EnvisatError::IllegalLayout(format!(
                "decoder needs {} source elements, field holds {}",
                needed,
                source.len()
            )));
        }

        let last = span.dest_pos as isize + (n as isize - 1) * span.dest_incr;
        if last < 0 || last as usize >= dest.len() || span.dest_pos >= dest.len() {
            return Err(EnvisatError::IllegalLayout(format!(
                "destination span of {} samples at {} (increment {}) exceeds raster of {}",
                n,
                span.dest_pos,
                span.dest_incr,
                dest.len()
            )));
        }

        let is_float = matches!(self.source_type, DataType::Float32 | DataType::Float64);
        let mut pos = span.dest_pos as isize;
        for k in 0..n {
            let slot = k * span.step_x;
            let value = match self.model {
                SampleModel::OneOfOne => self.element(source, slot, is_float),
                SampleModel::OneOfTwo => self.element(source, 2 * slot, is_float),
                SampleModel::TwoOfTwo => self.element(source, 2 * slot + 1, is_float),
                SampleModel::TwoBytesToShort => {
                    let base = 2 * slot;
                    T::from_i64((byte_at(source, base) << 8) | byte_at(source, base + 1))
                }
                SampleModel::ThreeBytesToInt => {
                    let base = 3 * slot;
                    T::from_i64(
                        (byte_at(source, base) << 16)
                            | (byte_at(source, base + 1) << 8)
                            | byte_at(source, base + 2),
                    )
                }
            };
            dest[pos as usize] = value;
            pos += span.dest_incr;
        }
        Ok(())
    }

    fn element<T: RasterSample>(&self, source: &FieldData, index: usize, is_float: bool) -> T {
        if is_float {
            T::from_f64(source.get_f64(index).unwrap_or(0.0))
        } else {
            T::from_i64(source.get_i64(index).unwrap_or(0))
        }
    }
}

/// Unsigned byte `index` of an 8-bit buffer
fn byte_at(source: &FieldData, index: usize) -> i64 {
    source.get_i64(index).map_or(0, |v| (v as u8) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(min_x: usize, max_x: usize, step_x: usize) -> DecodeSpan {
        DecodeSpan {
            min_x,
            max_x,
            step_x,
            dest_pos: 0,
            dest_incr: 1,
        }
    }

    #[test]
    fn test_unsupported_pairs_fail_at_selection() {
        assert!(SampleDecoder::select(SampleModel::OneOfOne, DataType::Float32).is_ok());
        assert!(SampleDecoder::select(SampleModel::ThreeBytesToInt, DataType::UInt8).is_ok());
        assert!(matches!(
            SampleDecoder::select(SampleModel::TwoBytesToShort, DataType::UInt16),
            Err(EnvisatError::UnsupportedSampleScheme { .. })
        ));
        assert!(SampleDecoder::select(SampleModel::OneOfOne, DataType::Ascii).is_err());
        assert!(SampleDecoder::select(SampleModel::OneOfTwo, DataType::Utc).is_err());
    }

    #[test]
    fn test_one_of_one_with_step() {
        let decoder = SampleDecoder::select(SampleModel::OneOfOne, DataType::Int16).unwrap();
        let source = FieldData::Int16(vec![-3, 1, 4, 1, 5, 9, 2]);
        let mut dest = vec![0i32; 4];
        decoder.decode(&source, &span(0, 6, 2), &mut dest).unwrap();
        assert_eq!(dest, vec![-3, 4, 5, 2]);
    }

    #[test]
    fn test_byte_combining_is_big_endian() {
        let decoder = SampleDecoder::select(SampleModel::TwoBytesToShort, DataType::UInt8).unwrap();
        let source = FieldData::UInt8(vec![0x01, 0x02, 0xFF, 0xFE]);
        let mut dest = vec![0u16; 2];
        decoder.decode(&source, &span(0, 1, 1), &mut dest).unwrap();
        assert_eq!(dest, vec![0x0102, 0xFFFE]);

        let decoder = SampleDecoder::select(SampleModel::ThreeBytesToInt, DataType::Int8).unwrap();
        let source = FieldData::Int8(vec![0x01, 0x02, 0x03, -1, -1, -1]);
        let mut dest = vec![0i32; 2];
        decoder.decode(&source, &span(0, 1, 1), &mut dest).unwrap();
        assert_eq!(dest, vec![0x010203, 0xFFFFFF]);
    }

    #[test]
    fn test_reverse_fill_from_tail() {
        let decoder = SampleDecoder::select(SampleModel::OneOfOne, DataType::Float32).unwrap();
        let source = FieldData::Float32(vec![1.0, 2.0, 3.0]);
        let mut dest = vec![0f64; 5];
        let span = DecodeSpan {
            min_x: 0,
            max_x: 2,
            step_x: 1,
            dest_pos: 3,
            dest_incr: -1,
        };
        decoder.decode(&source, &span, &mut dest).unwrap();
        assert_eq!(dest, vec![0.0, 3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_spans_are_rejected() {
        let decoder = SampleDecoder::select(SampleModel::OneOfTwo, DataType::UInt8).unwrap();
        let source = FieldData::UInt8(vec![0; 4]);
        let mut dest = vec![0u8; 8];
        assert!(decoder.decode(&source, &span(0, 2, 1), &mut dest).is_err());

        let mut short = vec![0u8; 1];
        assert!(decoder.decode(&source, &span(0, 1, 1), &mut short).is_err());
    }
}
