//! Product file access: headers, DSDs, the shared stream and record readers

pub mod dsd;
pub mod header;
pub mod product_file;
pub mod record_reader;
pub mod resource;
pub mod stream;

pub use dsd::Dsd;
pub use header::{Header, HeaderParser};
pub use product_file::{is_envisat_product, read_product_type, ProductFile, RasterRegion};
pub use record_reader::{RecordLayout, RecordReader};
pub use resource::{DirectoryStore, MemoryStore, ResourceStore};
pub use stream::{DataSource, ProductStream};
