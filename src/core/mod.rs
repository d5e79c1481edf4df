//! Schema resolution, the record model and sample decoding

pub mod band_reader;
pub mod catalog;
pub mod dddb;
pub mod record;
pub mod sample;
pub mod schema;
pub mod table;

// Re-export main types
pub use band_reader::BandLineReader;
pub use catalog::{BandDescriptor, FieldRef, Flag, FlagCoding, PixelSource, ScalingMethod};
pub use dddb::{DatasetInfo, Dddb, ProductInfo};
pub use record::{Field, FieldData, Record};
pub use sample::{DecodeSpan, RasterSample, SampleDecoder, SampleModel};
pub use schema::{FieldSchema, RecordSchema};
