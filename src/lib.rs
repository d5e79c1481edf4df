//! envisat: a schema-driven reader for ENVISAT-family binary products
//!
//! Record layouts are not hard-coded. They are resolved at run time from the
//! pipe-delimited tables of a data description database (DDDB), using sizes
//! taken from the product headers. On top of the resolved records the crate
//! decodes packed samples into raster lines and band arrays.

pub mod config;
pub mod core;
pub mod io;
pub mod profile;
pub mod types;

// Re-export main types and functions for easier access
pub use crate::config::ReaderConfig;
pub use crate::core::{BandDescriptor, BandLineReader, Dddb, Field, FieldSchema, Record, RecordSchema};
pub use io::{is_envisat_product, Dsd, Header, HeaderParser, ProductFile, RasterRegion, RecordReader};
pub use profile::{AttachFlagProfile, ProductProfile, ProfileContext, StandardProfile};
pub use types::{DataType, DatasetType, EnvisatError, EnvisatResult, ProductUtc, SchemaParams};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::prelude::*;

    fn to_py_err(e: EnvisatError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Python wrapper for ProductFile
    #[pyclass(name = "ProductFile")]
    struct PyProductFile {
        inner: ProductFile,
    }

    #[pymethods]
    impl PyProductFile {
        #[new]
        fn new(path: String) -> PyResult<Self> {
            let inner = ProductFile::open(&path).map_err(to_py_err)?;
            Ok(PyProductFile { inner })
        }

        fn product_type(&self) -> String {
            self.inner.product_type().to_string()
        }

        fn product_id(&self) -> PyResult<String> {
            self.inner.product_id().map_err(to_py_err)
        }

        fn scene_raster_size(&self) -> (usize, usize) {
            (self.inner.scene_raster_width(), self.inner.scene_raster_height())
        }

        /// MPH entry as text
        fn mph_value(&self, key: &str) -> PyResult<String> {
            self.inner.mph().param_string(key).map_err(to_py_err)
        }

        /// SPH entry as text
        fn sph_value(&self, key: &str) -> PyResult<String> {
            self.inner.sph().param_string(key).map_err(to_py_err)
        }

        fn dataset_names(&self) -> PyResult<Vec<String>> {
            self.inner.valid_dataset_names(None).map_err(to_py_err)
        }

        fn band_names(&self) -> PyResult<Vec<String>> {
            self.inner.band_names().map_err(to_py_err)
        }

        /// Band raster as a 2-D float64 array; region is (x, y, width, height)
        #[pyo3(signature = (name, region=None))]
        fn read_band<'py>(
            &self,
            py: Python<'py>,
            name: &str,
            region: Option<(usize, usize, usize, usize)>,
        ) -> PyResult<&'py PyArray2<f64>> {
            let region = region.map(|(x, y, w, h)| RasterRegion::new(x, y, w, h));
            let raster = py
                .allow_threads(|| self.inner.read_band_raster(name, region, None))
                .map_err(to_py_err)?;
            Ok(raster.into_pyarray(py))
        }

        fn __repr__(&self) -> String {
            format!(
                "ProductFile({}, {} x {})",
                self.inner.product_type(),
                self.inner.scene_raster_width(),
                self.inner.scene_raster_height()
            )
        }
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PyProductFile>()?;
        Ok(())
    }
}
