//! Product family profiles
//!
//! A profile carries the geometry and reading policy of one product family:
//! raster size, tie-point grid layout, GADS name, pixel order, the value used
//! for missing lines and the mapping from raster lines to physical records.
//! Profiles are created once per open product and never change afterwards.

use crate::config::ReaderConfig;
use crate::core::dddb::Dddb;
use crate::io::dsd::Dsd;
use crate::io::header::Header;
use crate::io::record_reader::{RecordLayout, RecordReader};
use crate::io::stream::ProductStream;
use crate::types::{DatasetType, EnvisatError, EnvisatResult, SchemaParams};
use std::sync::Arc;

/// Offset of MERIS-style tie points within a pixel
const TIE_POINT_OFFSET: f64 = 0.5;

/// Geometry and policy of a product family
pub trait ProductProfile: Send + Sync + std::fmt::Debug {
    fn scene_raster_width(&self) -> usize;

    fn scene_raster_height(&self) -> usize;

    fn tie_point_grid_offset_x(&self, _grid_width: usize) -> f64 {
        TIE_POINT_OFFSET
    }

    fn tie_point_grid_offset_y(&self, _grid_width: usize) -> f64 {
        TIE_POINT_OFFSET
    }

    /// Sub-sampling of the tie-point grid with the given width
    fn tie_point_sub_sampling_x(&self, grid_width: usize) -> f64;

    fn tie_point_sub_sampling_y(&self, grid_width: usize) -> f64;

    /// Dataset name of the global annotation dataset, if the family has one
    fn gads_name(&self) -> Option<&str> {
        None
    }

    /// Whether scan lines are stored west to east
    fn stores_pixels_in_chronological_order(&self) -> bool {
        true
    }

    /// Raw value for pixels of lines without a physical record
    fn missing_pixel_value(&self) -> f64 {
        0.0
    }

    /// Physical record index of raster line `line` in a measurement dataset,
    /// `None` if the line has no record
    fn map_record_index(&self, _dataset_name: &str, line: usize) -> Option<usize> {
        Some(line)
    }

    fn is_valid_dataset_name(&self, _dataset_name: &str) -> bool {
        true
    }

    /// Format revision suffixes for DDDB lookup, most specific first
    fn format_suffixes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Additional named sizes available to DDDB record tables
    fn extra_parameters(&self) -> SchemaParams {
        SchemaParams::new()
    }
}

/// Named record sizes derived from a profile
pub fn schema_params(profile: &dyn ProductProfile) -> SchemaParams {
    let width = profile.scene_raster_width();
    let height = profile.scene_raster_height();
    let sub_x = profile.tie_point_sub_sampling_x(0).round() as usize;
    let sub_y = profile.tie_point_sub_sampling_y(0).round() as usize;

    let mut params = SchemaParams::new();
    params.insert("sceneRasterWidth".to_string(), width as i64);
    params.insert("sceneRasterHeight".to_string(), height as i64);
    params.insert("LINE_WIDTH".to_string(), width as i64);
    if sub_x > 0 && sub_y > 0 {
        params.insert("tiePointGridWidth".to_string(), (1 + width / sub_x) as i64);
        params.insert("tiePointGridHeight".to_string(), (1 + height / sub_y) as i64);
        params.insert("tiePointSubSamplingX".to_string(), sub_x as i64);
        params.insert("tiePointSubSamplingY".to_string(), sub_y as i64);
    }
    params.extend(profile.extra_parameters());
    params
}

/// What a profile factory gets to see of a product being opened
pub struct ProfileContext<'a> {
    pub product_type: &'a str,
    pub mph: &'a Header,
    pub sph: &'a Header,
    pub dsds: &'a [Dsd],
    pub dddb: &'a Dddb,
    pub config: &'a ReaderConfig,
    pub stream: &'a Arc<ProductStream>,
}

impl<'a> ProfileContext<'a> {
    /// DSD of a dataset, looked up through the DDDB dataset-to-DSD name map
    pub fn dsd(&self, dddb_product_type: &str, dataset_name: &str) -> Option<&'a Dsd> {
        let dsd_name = self.dddb.dsd_name(dddb_product_type, dataset_name).ok()?;
        self.dsds
            .iter()
            .find(|d| d.dataset_name.eq_ignore_ascii_case(&dsd_name))
    }

    /// Names of the non-empty datasets of the given type present in the product
    pub fn valid_dataset_names(
        &self,
        dddb_product_type: &str,
        dataset_type: DatasetType,
    ) -> EnvisatResult<Vec<String>> {
        Ok(self
            .dddb
            .dataset_names(dddb_product_type)?
            .into_iter()
            .filter(|name| {
                self.dsd(dddb_product_type, name)
                    .map_or(false, |d| !d.is_empty() && d.dataset_type == dataset_type)
            })
            .collect())
    }

    /// Read one integer element of `field_name` from every record of a dataset
    pub fn scan_field(
        &self,
        profile: &Arc<dyn ProductProfile>,
        dataset_name: &str,
        field_name: &str,
    ) -> EnvisatResult<Vec<i64>> {
        let dddb_type = self
            .dddb
            .resolve_product_type(self.product_type, &profile.format_suffixes())?;
        let dsd = self.dsd(&dddb_type, dataset_name).ok_or_else(|| {
            EnvisatError::IllegalLayout(format!("no DSD found for dataset '{}'", dataset_name))
        })?;
        let schema = Arc::new(self.dddb.read_record_schema(
            &dddb_type,
            dataset_name,
            &schema_params(profile.as_ref()),
        )?);
        let field_index = schema.field_index(field_name).ok_or_else(|| {
            EnvisatError::SchemaIntegrity(format!(
                "dataset '{}' has no field '{}'",
                dataset_name, field_name
            ))
        })?;

        let layout = if self.config.line_interleaved && dsd.dataset_type == DatasetType::Measurement {
            RecordLayout::interleaved(dsd, self.dsds)?
        } else {
            RecordLayout::Contiguous
        };
        // raw access: no line remapping while the remapping is being built
        let reader = RecordReader::new(
            dsd.clone(),
            Arc::clone(&schema),
            Arc::clone(self.stream),
            None,
            layout,
        );

        let mut field = schema.fields()[field_index].create_field();
        let mut values = Vec::with_capacity(dsd.num_records);
        for index in 0..dsd.num_records {
            reader.read_field(index, field_index, &mut field)?;
            values.push(field.elem_i64(0)?);
        }
        Ok(values)
    }
}

/// Factory choosing the profile of a product at open time
pub type ProfileFactory =
    dyn for<'a, 'b> Fn(&'a ProfileContext<'b>) -> EnvisatResult<Arc<dyn ProductProfile>> + Send + Sync;

/// Header driven profile usable for most product types
#[derive(Debug, Clone, PartialEq)]
pub struct StandardProfile {
    pub width: usize,
    pub height: usize,
    pub sub_sampling_x: Option<usize>,
    pub sub_sampling_y: Option<usize>,
    pub gads_name: Option<String>,
    pub chronological_order: bool,
    pub missing_pixel_value: f64,
    pub format_suffixes: Vec<String>,
    pub extra_parameters: SchemaParams,
}

impl StandardProfile {
    /// Derive the profile from the SPH and DSDs.
    ///
    /// Width is `LINE_LENGTH`, height the record count of the first valid
    /// measurement dataset, sub-sampling `SAMPLES_PER_TIE_PT` and
    /// `LINES_PER_TIE_PT`, and the GADS the first non-empty global
    /// annotation dataset.
    pub fn from_context(ctx: &ProfileContext<'_>) -> EnvisatResult<Self> {
        let format_suffixes = ctx.config.format_suffixes.clone();
        let dddb_type = ctx.dddb.resolve_product_type(ctx.product_type, &format_suffixes)?;

        let measurement = ctx.valid_dataset_names(&dddb_type, DatasetType::Measurement)?;
        let first_mds = measurement.first().ok_or_else(|| {
            EnvisatError::IllegalLayout(format!(
                "no valid measurement datasets found in {} product",
                ctx.product_type
            ))
        })?;
        let height = ctx.dsd(&dddb_type, first_mds).map_or(0, |d| d.num_records);

        let width = if ctx.sph.has_param("LINE_LENGTH") {
            let line_length = ctx.sph.param_int("LINE_LENGTH")?;
            if line_length < 0 {
                log::warn!("negative LINE_LENGTH {} in {}, using width 0", line_length, ctx.product_type);
            }
            line_length.max(0) as usize
        } else {
            log::warn!("SPH of {} has no LINE_LENGTH, using width 0", ctx.product_type);
            0
        };

        let optional_positive = |key: &str| -> EnvisatResult<Option<usize>> {
            if ctx.sph.has_param(key) {
                Ok(Some(ctx.sph.param_int(key)?).filter(|v| *v > 0).map(|v| v as usize))
            } else {
                Ok(None)
            }
        };

        let gads_name = ctx
            .valid_dataset_names(&dddb_type, DatasetType::GlobalAnnotation)?
            .into_iter()
            .next();

        Ok(Self {
            width,
            height,
            sub_sampling_x: optional_positive("SAMPLES_PER_TIE_PT")?,
            sub_sampling_y: optional_positive("LINES_PER_TIE_PT")?,
            gads_name,
            chronological_order: ctx.config.chronological_order,
            missing_pixel_value: ctx.config.missing_pixel_value,
            format_suffixes,
            extra_parameters: SchemaParams::new(),
        })
    }

    /// Profile factory for [`ProductFile::open_with`](crate::io::ProductFile::open_with)
    pub fn create(ctx: &ProfileContext<'_>) -> EnvisatResult<Arc<dyn ProductProfile>> {
        Ok(Arc::new(Self::from_context(ctx)?))
    }
}

impl ProductProfile for StandardProfile {
    fn scene_raster_width(&self) -> usize {
        self.width
    }

    fn scene_raster_height(&self) -> usize {
        self.height
    }

    fn tie_point_sub_sampling_x(&self, _grid_width: usize) -> f64 {
        self.sub_sampling_x.unwrap_or(0) as f64
    }

    fn tie_point_sub_sampling_y(&self, _grid_width: usize) -> f64 {
        self.sub_sampling_y.unwrap_or(0) as f64
    }

    fn gads_name(&self) -> Option<&str> {
        self.gads_name.as_deref()
    }

    fn stores_pixels_in_chronological_order(&self) -> bool {
        self.chronological_order
    }

    fn missing_pixel_value(&self) -> f64 {
        self.missing_pixel_value
    }

    fn format_suffixes(&self) -> Vec<String> {
        self.format_suffixes.clone()
    }

    fn extra_parameters(&self) -> SchemaParams {
        self.extra_parameters.clone()
    }
}

/// Profile for products whose measurement records carry an attachment flag.
///
/// Every measurement record is scanned once; records with a non-zero flag
/// hold no data and the corresponding raster lines are reported as missing.
#[derive(Debug, Clone)]
pub struct AttachFlagProfile {
    inner: Arc<dyn ProductProfile>,
    record_index: Vec<Option<usize>>,
    missing_pixel_value: f64,
}

impl AttachFlagProfile {
    /// Wrap `inner` given the attachment flag of every record, in record order
    pub fn new(inner: Arc<dyn ProductProfile>, attach_flags: &[i64], missing_pixel_value: f64) -> Self {
        let record_index = attach_flags
            .iter()
            .enumerate()
            .map(|(index, flag)| if *flag == 0 { Some(index) } else { None })
            .collect();
        Self {
            inner,
            record_index,
            missing_pixel_value,
        }
    }

    /// Scan `field_name` of `dataset_name` and wrap the profile built by `inner`
    pub fn from_context(
        ctx: &ProfileContext<'_>,
        inner: Arc<dyn ProductProfile>,
        dataset_name: &str,
        field_name: &str,
    ) -> EnvisatResult<Self> {
        let flags = ctx.scan_field(&inner, dataset_name, field_name)?;
        let missing = flags.iter().filter(|f| **f != 0).count();
        if missing > 0 {
            log::info!(
                "{}: {} of {} records flagged as not attached",
                dataset_name,
                missing,
                flags.len()
            );
        }
        let missing_pixel_value = inner.missing_pixel_value();
        Ok(Self::new(inner, &flags, missing_pixel_value))
    }

    pub fn num_missing_lines(&self) -> usize {
        self.record_index.iter().filter(|i| i.is_none()).count()
    }
}

impl ProductProfile for AttachFlagProfile {
    fn scene_raster_width(&self) -> usize {
        self.inner.scene_raster_width()
    }

    fn scene_raster_height(&self) -> usize {
        self.inner.scene_raster_height()
    }

    fn tie_point_grid_offset_x(&self, grid_width: usize) -> f64 {
        self.inner.tie_point_grid_offset_x(grid_width)
    }

    fn tie_point_grid_offset_y(&self, grid_width: usize) -> f64 {
        self.inner.tie_point_grid_offset_y(grid_width)
    }

    fn tie_point_sub_sampling_x(&self, grid_width: usize) -> f64 {
        self.inner.tie_point_sub_sampling_x(grid_width)
    }

    fn tie_point_sub_sampling_y(&self, grid_width: usize) -> f64 {
        self.inner.tie_point_sub_sampling_y(grid_width)
    }

    fn gads_name(&self) -> Option<&str> {
        self.inner.gads_name()
    }

    fn stores_pixels_in_chronological_order(&self) -> bool {
        self.inner.stores_pixels_in_chronological_order()
    }

    fn missing_pixel_value(&self) -> f64 {
        self.missing_pixel_value
    }

    fn map_record_index(&self, dataset_name: &str, line: usize) -> Option<usize> {
        let line = self.inner.map_record_index(dataset_name, line)?;
        self.record_index.get(line).copied().flatten()
    }

    fn is_valid_dataset_name(&self, dataset_name: &str) -> bool {
        self.inner.is_valid_dataset_name(dataset_name)
    }

    fn format_suffixes(&self) -> Vec<String> {
        self.inner.format_suffixes()
    }

    fn extra_parameters(&self) -> SchemaParams {
        self.inner.extra_parameters()
    }
}
