//! Open ENVISAT products
//!
//! [`ProductFile`] parses the MPH, SPH and DSDs of a product, selects its
//! profile and DDDB product type, and hands out record readers and band line
//! readers for the datasets it contains.

use crate::config::ReaderConfig;
use crate::core::band_reader::BandLineReader;
use crate::core::catalog::{BandDescriptor, PixelSource};
use crate::core::dddb::Dddb;
use crate::core::record::Record;
use crate::io::dsd::Dsd;
use crate::io::header::{Header, HeaderParser};
use crate::io::record_reader::{RecordLayout, RecordReader};
use crate::io::stream::{DataSource, ProductStream};
use crate::profile::{schema_params, ProductProfile, ProfileContext, ProfileFactory, StandardProfile};
use crate::types::{DatasetType, EnvisatError, EnvisatResult, ProductUtc, SchemaParams};
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Size of the main product header in bytes
pub const MPH_SIZE: usize = 1247;

/// Magic string every product starts with
pub const PRODUCT_MAGIC: &str = "PRODUCT=\"";

/// Length of the product type prefix of a product name
pub const PRODUCT_TYPE_LENGTH: usize = 10;

const DSD_START_KEY: &[u8] = b"DS_NAME=";

/// Name of the record time field of measurement datasets
const RECORD_TIME_FIELD: &str = "dsr_time";

/// Product type of the product in `source`, `None` if it is not an ENVISAT product.
///
/// A trailing `C` (child product) is reported as `P`.
pub fn read_product_type<R: Read + Seek + ?Sized>(source: &mut R) -> EnvisatResult<Option<String>> {
    source.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::with_capacity(PRODUCT_MAGIC.len() + PRODUCT_TYPE_LENGTH);
    source
        .take((PRODUCT_MAGIC.len() + PRODUCT_TYPE_LENGTH) as u64)
        .read_to_end(&mut buf)?;

    let Some(type_bytes) = buf.strip_prefix(PRODUCT_MAGIC.as_bytes()) else {
        return Ok(None);
    };
    if type_bytes.len() < PRODUCT_TYPE_LENGTH {
        return Ok(None);
    }
    let mut product_type = String::from_utf8_lossy(type_bytes).to_string();
    if product_type.ends_with('C') {
        product_type.pop();
        product_type.push('P');
    }
    Ok(Some(product_type))
}

/// Whether the file at `path` starts like an ENVISAT product
pub fn is_envisat_product<P: AsRef<Path>>(path: P) -> bool {
    File::open(path)
        .map_err(EnvisatError::from)
        .and_then(|mut file| read_product_type(&mut file))
        .map_or(false, |t| t.is_some())
}

/// Upper-cased 10-character product type with child and unknown level
/// suffixes mapped to `P`
fn normalize_product_type(product: &str) -> EnvisatResult<String> {
    let mut product_type: String = product
        .chars()
        .take(PRODUCT_TYPE_LENGTH)
        .collect::<String>()
        .to_ascii_uppercase();
    if product_type.chars().count() < PRODUCT_TYPE_LENGTH {
        return Err(EnvisatError::InvalidFormat(format!(
            "product name '{}' too short for a product type",
            product
        )));
    }
    if product_type.ends_with('C') {
        product_type.pop();
        product_type.push('P');
    }
    if !product_type.ends_with('P') && !product_type.ends_with('X') {
        let mapped: String = product_type.chars().take(PRODUCT_TYPE_LENGTH - 1).chain(['P']).collect();
        log::warn!("unknown product type '{}' mapped to '{}'", product_type, mapped);
        product_type = mapped;
    }
    Ok(product_type)
}

/// Sub-region of a band raster, in raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub step_x: usize,
    pub step_y: usize,
}

impl RasterRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            step_x: 1,
            step_y: 1,
        }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn with_step(mut self, step_x: usize, step_y: usize) -> Self {
        self.step_x = step_x;
        self.step_y = step_y;
        self
    }

    /// Shape of the subsampled output, `(rows, columns)`
    pub fn output_shape(&self) -> (usize, usize) {
        let count = |len: usize, step: usize| if len == 0 { 0 } else { (len - 1) / step + 1 };
        (count(self.height, self.step_y), count(self.width, self.step_x))
    }
}

/// An open ENVISAT product
pub struct ProductFile {
    stream: Arc<ProductStream>,
    dddb: Arc<Dddb>,
    config: ReaderConfig,
    product_type: String,
    dddb_product_type: String,
    mph: Header,
    sph: Header,
    dsds: Vec<Dsd>,
    profile: Arc<dyn ProductProfile>,
    params: SchemaParams,
    gads: Option<Record>,
    sensing_start: Option<ProductUtc>,
    sensing_stop: Option<ProductUtc>,
    readers: RwLock<HashMap<String, Arc<RecordReader>>>,
    bands: RwLock<Option<Arc<Vec<Arc<BandDescriptor>>>>>,
}

impl std::fmt::Debug for ProductFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductFile")
            .field("product_type", &self.product_type)
            .field("dddb_product_type", &self.dddb_product_type)
            .field("num_dsds", &self.dsds.len())
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl ProductFile {
    /// Open a product file using the process-wide DDDB and the standard profile
    pub fn open<P: AsRef<Path>>(path: P) -> EnvisatResult<Self> {
        Self::open_with_config(path, ReaderConfig::from_env())
    }

    /// Open a product file with an explicit configuration
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ReaderConfig) -> EnvisatResult<Self> {
        let path = path.as_ref();
        log::info!("Opening ENVISAT product: {}", path.display());
        let file = BufReader::new(File::open(path)?);
        let dddb = if config.dddb_dir == ReaderConfig::from_env().dddb_dir {
            Dddb::global()
        } else {
            Arc::new(Dddb::from_dir(&config.dddb_dir))
        };
        Self::open_with(file, dddb, config, &StandardProfile::create)
    }

    /// Open a product from any seekable source
    pub fn open_with<S: DataSource + 'static>(
        source: S,
        dddb: Arc<Dddb>,
        config: ReaderConfig,
        profile_factory: &ProfileFactory,
    ) -> EnvisatResult<Self> {
        let stream = Arc::new(ProductStream::new(source));

        let mut mph_bytes = vec![0u8; MPH_SIZE];
        stream.read_exact_at(0, &mut mph_bytes).map_err(|e| match e {
            EnvisatError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                EnvisatError::InvalidFormat("file too short for an ENVISAT main product header".to_string())
            }
            other => other,
        })?;
        if !mph_bytes.starts_with(PRODUCT_MAGIC.as_bytes()) {
            return Err(EnvisatError::InvalidFormat(
                "not an ENVISAT product: main product header not found".to_string(),
            ));
        }

        let mph = HeaderParser::parse("MPH", &mph_bytes)?;
        let product_type = normalize_product_type(&mph.param_string("PRODUCT")?)?;

        let sph_size = mph.param_uint("SPH_SIZE")? as usize;
        let num_dsd = mph.param_uint("NUM_DSD")? as usize;
        let dsd_size = mph.param_uint("DSD_SIZE")? as usize;
        let mut sph_bytes = vec![0u8; sph_size];
        stream.read_exact_at(MPH_SIZE as u64, &mut sph_bytes)?;
        let (sph, dsds) = parse_sph(&sph_bytes, num_dsd, dsd_size)?;

        if mph.has_param("NUM_DATA_SETS") {
            let num_data_sets = mph.param_uint("NUM_DATA_SETS")? as usize;
            if dsds.len() < num_data_sets {
                log::warn!(
                    "{}: found {} DSDs but NUM_DATA_SETS is {}",
                    product_type,
                    dsds.len(),
                    num_data_sets
                );
            }
        }

        let sensing_start = sensing_time(&mph, "SENSING_START");
        let sensing_stop = sensing_time(&mph, "SENSING_STOP");

        let profile = profile_factory(&ProfileContext {
            product_type: &product_type,
            mph: &mph,
            sph: &sph,
            dsds: &dsds,
            dddb: &dddb,
            config: &config,
            stream: &stream,
        })?;
        let dddb_product_type = dddb.resolve_product_type(&product_type, &profile.format_suffixes())?;
        let params = schema_params(profile.as_ref());

        let mut product = Self {
            stream,
            dddb,
            config,
            product_type,
            dddb_product_type,
            mph,
            sph,
            dsds,
            profile,
            params,
            gads: None,
            sensing_start,
            sensing_stop,
            readers: RwLock::new(HashMap::new()),
            bands: RwLock::new(None),
        };
        product.gads = product.read_gads()?;

        log::info!(
            "Opened {} product ({}): {} x {} pixels, {} DSDs",
            product.product_type,
            product.dddb_product_type,
            product.scene_raster_width(),
            product.scene_raster_height(),
            product.dsds.len()
        );
        Ok(product)
    }

    fn read_gads(&self) -> EnvisatResult<Option<Record>> {
        let Some(gads_name) = self.profile.gads_name() else {
            return Ok(None);
        };
        match self.dsd(gads_name) {
            Some(dsd) if !dsd.is_empty() => {
                log::debug!("reading GADS '{}'", gads_name);
                self.record_reader(gads_name)?.read_record(0)
            }
            _ => Ok(None),
        }
    }

    pub fn product_type(&self) -> &str {
        &self.product_type
    }

    /// Product type the DDDB tables were resolved for
    pub fn dddb_product_type(&self) -> &str {
        &self.dddb_product_type
    }

    /// Full product name from the MPH
    pub fn product_id(&self) -> EnvisatResult<String> {
        Ok(self.mph.param_string("PRODUCT")?.trim().to_string())
    }

    /// Total product size in bytes as declared in the MPH
    pub fn total_size(&self) -> EnvisatResult<u64> {
        let value = self.mph.param_double("TOT_SIZE")?;
        if value < 0.0 {
            return Err(EnvisatError::HeaderParse {
                key: "MPH.TOT_SIZE".to_string(),
                reason: format!("negative size {}", value),
            });
        }
        Ok(value as u64)
    }

    pub fn product_description(&self) -> EnvisatResult<Option<String>> {
        self.dddb.product_description(&self.dddb_product_type)
    }

    pub fn mph(&self) -> &Header {
        &self.mph
    }

    pub fn sph(&self) -> &Header {
        &self.sph
    }

    pub fn dsds(&self) -> &[Dsd] {
        &self.dsds
    }

    pub fn profile(&self) -> &Arc<dyn ProductProfile> {
        &self.profile
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn dddb(&self) -> &Arc<Dddb> {
        &self.dddb
    }

    /// Named sizes used to resolve the record tables of this product
    pub fn params(&self) -> &SchemaParams {
        &self.params
    }

    pub fn gads(&self) -> Option<&Record> {
        self.gads.as_ref()
    }

    pub fn sensing_start(&self) -> Option<ProductUtc> {
        self.sensing_start
    }

    pub fn sensing_stop(&self) -> Option<ProductUtc> {
        self.sensing_stop
    }

    pub fn scene_raster_width(&self) -> usize {
        self.profile.scene_raster_width()
    }

    pub fn scene_raster_height(&self) -> usize {
        self.profile.scene_raster_height()
    }

    pub fn num_dsds(&self) -> usize {
        self.dsds.len()
    }

    pub fn dsd_at(&self, index: usize) -> Option<&Dsd> {
        self.dsds.get(index)
    }

    /// DSD of a dataset, found through the DDDB dataset-to-DSD name map
    pub fn dsd(&self, dataset_name: &str) -> Option<&Dsd> {
        let dsd_name = self
            .dddb
            .dsd_name(&self.dddb_product_type, dataset_name)
            .unwrap_or_else(|_| dataset_name.to_string());
        self.dsds
            .iter()
            .find(|d| d.dataset_name.eq_ignore_ascii_case(&dsd_name))
    }

    /// Non-empty DSDs of the given type
    pub fn valid_dsds(&self, dataset_type: DatasetType) -> Vec<&Dsd> {
        self.dsds
            .iter()
            .filter(|d| d.dataset_type == dataset_type && !d.is_empty())
            .collect()
    }

    pub fn is_valid_dataset_name(&self, dataset_name: &str) -> bool {
        self.profile.is_valid_dataset_name(dataset_name)
            && self.dsd(dataset_name).map_or(false, |d| !d.is_empty())
    }

    /// DDDB dataset names present in the product, optionally of one type only
    pub fn valid_dataset_names(&self, dataset_type: Option<DatasetType>) -> EnvisatResult<Vec<String>> {
        Ok(self
            .dddb
            .dataset_names(&self.dddb_product_type)?
            .into_iter()
            .filter(|name| self.is_valid_dataset_name(name))
            .filter(|name| {
                dataset_type.map_or(true, |t| self.dsd(name).map_or(false, |d| d.dataset_type == t))
            })
            .collect())
    }

    /// Record reader of a dataset, created on first use
    pub fn record_reader(&self, dataset_name: &str) -> EnvisatResult<Arc<RecordReader>> {
        let key = dataset_name.to_ascii_uppercase();
        if let Some(reader) = self
            .readers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(reader));
        }

        let dsd = self.dsd(dataset_name).ok_or_else(|| {
            EnvisatError::IllegalLayout(format!(
                "no DSD found for dataset '{}' in {} product",
                dataset_name, self.product_type
            ))
        })?;
        let schema = Arc::new(
            self.dddb
                .read_record_schema(&self.dddb_product_type, dataset_name, &self.params)?,
        );
        let layout = if self.config.line_interleaved && dsd.dataset_type == DatasetType::Measurement {
            RecordLayout::interleaved(dsd, &self.dsds)?
        } else {
            RecordLayout::Contiguous
        };
        log::debug!("record reader for '{}': {}, {:?}", dataset_name, dsd, layout);

        let reader = Arc::new(RecordReader::new(
            dsd.clone(),
            schema,
            Arc::clone(&self.stream),
            Some(Arc::clone(&self.profile)),
            layout,
        ));
        self.readers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&reader));
        Ok(reader)
    }

    /// UTC value of element 0 of `field_name` in record `index`,
    /// `None` if the line has no physical record
    pub fn record_time(
        &self,
        dataset_name: &str,
        field_name: &str,
        index: usize,
    ) -> EnvisatResult<Option<ProductUtc>> {
        let reader = self.record_reader(dataset_name)?;
        let field_index = reader.schema().field_index(field_name).ok_or_else(|| {
            EnvisatError::SchemaIntegrity(format!(
                "dataset '{}' has no field '{}'",
                dataset_name, field_name
            ))
        })?;
        let mut field = reader.schema().fields()[field_index].create_field();
        if !reader.read_field(index, field_index, &mut field)? {
            return Ok(None);
        }
        Ok(field.elem_utc(0))
    }

    /// Record times of every raster line, taken from the first measurement dataset
    pub fn all_record_times(&self) -> EnvisatResult<Vec<Option<ProductUtc>>> {
        let names = self.valid_dataset_names(Some(DatasetType::Measurement))?;
        let first = names.first().ok_or_else(|| {
            EnvisatError::IllegalLayout(format!(
                "no valid measurement datasets in {} product",
                self.product_type
            ))
        })?;
        (0..self.scene_raster_height())
            .map(|line| self.record_time(first, RECORD_TIME_FIELD, line))
            .collect()
    }

    /// Bands of the product, resolved on first use
    pub fn band_descriptors(&self) -> EnvisatResult<Arc<Vec<Arc<BandDescriptor>>>> {
        if let Some(bands) = self.bands.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Ok(Arc::clone(bands));
        }
        let bands = Arc::new(self.resolve_bands()?);
        *self.bands.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&bands));
        Ok(bands)
    }

    fn resolve_bands(&self) -> EnvisatResult<Vec<Arc<BandDescriptor>>> {
        let rows = self.dddb.band_rows(&self.dddb_product_type)?;
        let gads_name = self.profile.gads_name();
        let mut bands = Vec::with_capacity(rows.len());

        for row in rows.iter() {
            let flag_coding = match &row.flag_table {
                Some(path) => Some(self.dddb.read_flag_coding(path)?),
                None => None,
            };

            let (source_type, width, height) = match &row.source {
                PixelSource::Field {
                    dataset_name,
                    field_index,
                } => {
                    if !self.is_valid_dataset_name(dataset_name) {
                        log::debug!("band '{}' skipped: dataset '{}' not present", row.name, dataset_name);
                        continue;
                    }
                    let reader = self.record_reader(dataset_name)?;
                    let field = reader.schema().field_at(*field_index).ok_or_else(|| {
                        EnvisatError::SchemaIntegrity(format!(
                            "band '{}' refers to field {} of '{}' which has {} fields",
                            row.name,
                            field_index + 1,
                            dataset_name,
                            reader.schema().num_fields()
                        ))
                    })?;
                    let (width, height) = match reader.dsd().dataset_type {
                        DatasetType::Measurement => {
                            (self.scene_raster_width(), self.scene_raster_height())
                        }
                        _ => (field.num_elems / row.sample_model.stride(), reader.num_records()),
                    };
                    (Some(field.data_type), width, height)
                }
                PixelSource::Expression(_) => (None, self.scene_raster_width(), self.scene_raster_height()),
            };

            let band = row.resolve(source_type, gads_name, self.gads.as_ref(), width, height, flag_coding)?;
            bands.push(Arc::new(band));
        }

        log::debug!("{}: {} bands resolved", self.dddb_product_type, bands.len());
        Ok(bands)
    }

    pub fn band_names(&self) -> EnvisatResult<Vec<String>> {
        Ok(self.band_descriptors()?.iter().map(|b| b.name.clone()).collect())
    }

    pub fn band_descriptor(&self, band_name: &str) -> EnvisatResult<Arc<BandDescriptor>> {
        self.band_descriptors()?
            .iter()
            .find(|b| b.name.eq_ignore_ascii_case(band_name))
            .cloned()
            .ok_or_else(|| EnvisatError::SchemaNotFound(format!("band '{}' not found", band_name)))
    }

    /// Virtual bands with their pixel expressions
    pub fn virtual_bands(&self) -> EnvisatResult<Vec<(String, String)>> {
        Ok(self
            .band_descriptors()?
            .iter()
            .filter_map(|b| match &b.source {
                PixelSource::Expression(expr) => Some((b.name.clone(), expr.clone())),
                PixelSource::Field { .. } => None,
            })
            .collect())
    }

    pub fn band_line_reader(&self, band_name: &str) -> EnvisatResult<BandLineReader> {
        let band = self.band_descriptor(band_name)?;
        let dataset_name = band.source.dataset_name().ok_or_else(|| {
            EnvisatError::IllegalLayout(format!("band '{}' is virtual", band.name))
        })?;
        let reader = self.record_reader(dataset_name)?;
        BandLineReader::new(band, reader, Arc::clone(&self.profile))
    }

    /// Line readers of all non-virtual bands
    pub fn band_line_readers(&self) -> EnvisatResult<Vec<BandLineReader>> {
        self.band_descriptors()?
            .iter()
            .filter(|b| !b.is_virtual())
            .map(|b| self.band_line_reader(&b.name))
            .collect()
    }

    /// Read a band (or a region of it) into a 2-D array of scaled values.
    ///
    /// Lines without a physical record hold the profile's missing pixel value,
    /// unscaled. `cancel` is polled between lines.
    pub fn read_band_raster(
        &self,
        band_name: &str,
        region: Option<RasterRegion>,
        cancel: Option<&AtomicBool>,
    ) -> EnvisatResult<Array2<f64>> {
        let reader = self.band_line_reader(band_name)?;
        let band = Arc::clone(reader.band());
        let region = region.unwrap_or_else(|| RasterRegion::full(band.width, band.height));

        if region.step_x == 0
            || region.step_y == 0
            || region.x + region.width > band.width
            || region.y + region.height > band.height
        {
            return Err(EnvisatError::IllegalLayout(format!(
                "region {:?} outside band '{}' of {} x {}",
                region, band.name, band.width, band.height
            )));
        }

        let (rows, cols) = region.output_shape();
        let mut data = vec![0.0f64; rows * cols];
        if cols == 0 {
            return Array2::from_shape_vec((rows, cols), data)
                .map_err(|e| EnvisatError::InvalidFormat(e.to_string()));
        }

        let mut scratch = reader.create_scratch_field();
        let lines = (region.y..region.y + region.height).step_by(region.step_y);
        for (row, line) in data.chunks_mut(cols).zip(lines) {
            if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
                log::info!("reading band '{}' cancelled at line {}", band.name, line);
                return Err(EnvisatError::Cancelled);
            }
            let present = reader.read_raster_line(
                line,
                region.x,
                region.x + region.width - 1,
                region.step_x,
                &mut scratch,
                row,
                0,
            )?;
            if present && band.is_scaled() {
                row.iter_mut().for_each(|v| *v = band.scale(*v));
            }
        }

        Array2::from_shape_vec((rows, cols), data).map_err(|e| EnvisatError::InvalidFormat(e.to_string()))
    }

    /// Read several bands, in parallel when the `parallel` feature is enabled
    pub fn read_bands(
        &self,
        band_names: &[&str],
        region: Option<RasterRegion>,
        cancel: Option<&AtomicBool>,
    ) -> EnvisatResult<Vec<Array2<f64>>> {
        #[cfg(feature = "parallel")]
        {
            band_names
                .par_iter()
                .map(|name| self.read_band_raster(name, region, cancel))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            band_names
                .iter()
                .map(|name| self.read_band_raster(name, region, cancel))
                .collect()
        }
    }
}

/// Split the SPH into its own header and the DSD blocks that follow it
fn parse_sph(bytes: &[u8], num_dsd: usize, dsd_size: usize) -> EnvisatResult<(Header, Vec<Dsd>)> {
    let dsd_start = bytes
        .windows(DSD_START_KEY.len())
        .position(|w| w == DSD_START_KEY)
        .unwrap_or(bytes.len());
    let sph = HeaderParser::parse("SPH", &bytes[..dsd_start])?;

    let mut dsds = Vec::with_capacity(num_dsd);
    if dsd_size == 0 {
        return Ok((sph, dsds));
    }
    for index in 0..num_dsd {
        let start = dsd_start + index * dsd_size;
        if start >= bytes.len() {
            log::warn!("SPH holds only {} of {} DSDs", index, num_dsd);
            break;
        }
        let block = &bytes[start..(start + dsd_size).min(bytes.len())];
        let dsd = Dsd::parse(index, block)?;
        if dsd.dataset_name.is_empty() {
            // spare DSD
            continue;
        }
        dsds.push(dsd);
    }
    Ok((sph, dsds))
}

fn sensing_time(mph: &Header, key: &str) -> Option<ProductUtc> {
    if !mph.has_param(key) {
        return None;
    }
    match mph.param_utc(key) {
        Ok(time) => Some(time),
        Err(e) => {
            log::warn!("failed to parse sensing time: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_product_type_normalization() {
        assert_eq!(normalize_product_type("mer_rr__1pnpdk2003").unwrap(), "MER_RR__1P");
        assert_eq!(normalize_product_type("MER_RR__1CNPDK2003").unwrap(), "MER_RR__1P");
        assert_eq!(normalize_product_type("ASA_IMS_1XNPDE2003").unwrap(), "ASA_IMS_1X");
        assert_eq!(normalize_product_type("ASA_WVW_2QNPDE2003").unwrap(), "ASA_WVW_2P");
        assert!(matches!(normalize_product_type("MER"), Err(EnvisatError::InvalidFormat(_))));
    }

    #[test]
    fn test_read_product_type() {
        let mut product = Cursor::new(b"PRODUCT=\"MER_FR__2CNPDK20030515\"".to_vec());
        assert_eq!(read_product_type(&mut product).unwrap().as_deref(), Some("MER_FR__2P"));

        let mut other = Cursor::new(b"SAFE manifest".to_vec());
        assert_eq!(read_product_type(&mut other).unwrap(), None);
    }

    #[test]
    fn test_region_output_shape() {
        assert_eq!(RasterRegion::full(10, 4).output_shape(), (4, 10));
        assert_eq!(RasterRegion::new(2, 1, 7, 3).with_step(2, 2).output_shape(), (2, 4));
        assert_eq!(RasterRegion::full(0, 0).output_shape(), (0, 0));
    }
}
