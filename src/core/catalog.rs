//! Band and flag catalogs resolved from the DDDB

use crate::core::record::Record;
use crate::core::sample::{SampleDecoder, SampleModel};
use crate::core::table::token_value;
use crate::types::{DataType, EnvisatError, EnvisatResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Prefix marking a virtual band expression in the pixel source column
pub const EXPRESSION_PREFIX: char = '=';

/// Reference to a field (and optionally an element) of a dataset record.
///
/// Written `<dataset>.<field>[.<elem>]` with 1-based indices; stored 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub dataset_name: String,
    pub field_index: usize,
    pub elem_index: usize,
}

fn field_ref_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+?)\.(\d+)(?:\.(\d+))?$").ok())
        .as_ref()
}

impl FieldRef {
    pub fn parse(text: &str) -> EnvisatResult<Self> {
        let invalid = || EnvisatError::SchemaIntegrity(format!("invalid field reference '{}'", text));
        let caps = field_ref_pattern()
            .and_then(|p| p.captures(text.trim()))
            .ok_or_else(invalid)?;

        let one_based = |m: Option<regex::Match<'_>>| -> EnvisatResult<usize> {
            match m {
                None => Ok(0),
                Some(m) => m
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|v| v.checked_sub(1))
                    .ok_or_else(invalid),
            }
        };

        Ok(Self {
            dataset_name: caps[1].to_string(),
            field_index: one_based(caps.get(2))?,
            elem_index: one_based(caps.get(3))?,
        })
    }
}

impl std::fmt::Display for FieldRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.dataset_name, self.field_index + 1, self.elem_index + 1)
    }
}

/// Conversion from raw samples to geophysical values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMethod {
    None,
    /// `offset + factor * raw`
    Linear,
    /// `10^(offset + factor * raw)`
    Log10,
}

impl ScalingMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("Linear_Scale") {
            Some(ScalingMethod::Linear)
        } else if name.eq_ignore_ascii_case("Log_Scale") {
            Some(ScalingMethod::Log10)
        } else {
            None
        }
    }

    pub fn scale(&self, raw: f64, offset: f64, factor: f64) -> f64 {
        match self {
            ScalingMethod::None => raw,
            ScalingMethod::Linear => offset + factor * raw,
            ScalingMethod::Log10 => 10f64.powf(offset + factor * raw),
        }
    }
}

/// Where the pixels of a band come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PixelSource {
    /// Field `field_index` (0-based) of every record of a measurement dataset
    Field {
        dataset_name: String,
        field_index: usize,
    },
    /// Virtual band computed from other bands
    Expression(String),
}

impl PixelSource {
    pub fn parse(text: &str) -> EnvisatResult<Self> {
        let text = text.trim();
        match text.strip_prefix(EXPRESSION_PREFIX) {
            Some(expression) => Ok(PixelSource::Expression(expression.trim().to_string())),
            None => {
                let field_ref = FieldRef::parse(text)?;
                Ok(PixelSource::Field {
                    dataset_name: field_ref.dataset_name,
                    field_index: field_ref.field_index,
                })
            }
        }
    }

    pub fn dataset_name(&self) -> Option<&str> {
        match self {
            PixelSource::Field { dataset_name, .. } => Some(dataset_name),
            PixelSource::Expression(_) => None,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, PixelSource::Expression(_))
    }
}

/// A single flag of a flag coding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub mask: u32,
    pub description: String,
}

/// Named set of bit flags attached to a flag band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCoding {
    pub name: String,
    pub flags: Vec<Flag>,
}

impl FlagCoding {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
        }
    }

    pub fn add_flag(&mut self, name: impl Into<String>, mask: u32, description: impl Into<String>) {
        self.flags.push(Flag {
            name: name.into(),
            mask,
            description: description.into(),
        });
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Names of the flags set in `value`
    pub fn flags_set(&self, value: u32) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|f| f.mask != 0 && value & f.mask == f.mask)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Build a flag mask from a bit spec: one bit index or an `&`-joined set
pub fn create_flag_mask(bit_spec: &str) -> EnvisatResult<u32> {
    let mut mask = 0u32;
    for token in bit_spec.split('&').map(str::trim).filter(|t| !t.is_empty()) {
        let bit = token
            .parse::<u32>()
            .ok()
            .filter(|b| *b < 32)
            .ok_or_else(|| EnvisatError::SchemaIntegrity(format!("invalid flag bit index '{}'", token)))?;
        mask |= 1 << bit;
    }
    Ok(mask)
}

/// A fully resolved band of an open product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandDescriptor {
    pub name: String,
    pub data_type: DataType,
    pub sample_model: SampleModel,
    /// 0-based spectral band index
    pub spectral_band_index: Option<usize>,
    pub scaling_method: ScalingMethod,
    pub scaling_offset: f64,
    pub scaling_factor: f64,
    pub valid_pixel_expression: Option<String>,
    pub flag_coding: Option<Arc<FlagCoding>>,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub source: PixelSource,
    pub width: usize,
    pub height: usize,
    /// Decoder chosen from the sample model and the source field type
    #[serde(skip)]
    pub decoder: Option<SampleDecoder>,
}

impl BandDescriptor {
    pub fn is_virtual(&self) -> bool {
        self.source.is_virtual()
    }

    pub fn is_flag_band(&self) -> bool {
        self.flag_coding.is_some()
    }

    pub fn is_scaled(&self) -> bool {
        self.scaling_method != ScalingMethod::None
    }

    /// Apply the band scaling to a raw sample
    pub fn scale(&self, raw: f64) -> f64 {
        self.scaling_method.scale(raw, self.scaling_offset, self.scaling_factor)
    }
}

/// Resolve a scaling column: a float literal or a reference into the GADS
pub fn resolve_gads_value(
    text: &str,
    gads_name: Option<&str>,
    gads: Option<&Record>,
) -> EnvisatResult<f64> {
    let fail = |reason: String| {
        EnvisatError::SchemaIntegrity(format!("failed to resolve GADS reference '{}': {}", text, reason))
    };

    if let Some(name) = gads_name {
        let is_gads_ref = text
            .get(..name.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(name))
            && text[name.len()..].starts_with('.');
        if is_gads_ref {
            let record = gads.ok_or_else(|| fail("GADS not available".to_string()))?;
            let field_ref = FieldRef::parse(text)?;
            let field = record
                .field_at(field_ref.field_index)
                .ok_or_else(|| fail(format!("no field {}", field_ref.field_index + 1)))?;
            return field.elem_f64(field_ref.elem_index).map_err(|e| fail(e.to_string()));
        }
    }

    text.trim().parse::<f64>().map_err(|e| fail(e.to_string()))
}

/// One row of a band table, parsed but not yet bound to a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRow {
    pub name: String,
    pub source: PixelSource,
    pub sample_model: SampleModel,
    pub data_type: DataType,
    pub spectral_band_index: Option<usize>,
    /// Method plus unresolved offset and factor columns
    pub scaling: Option<(ScalingMethod, String, String)>,
    pub valid_pixel_expression: Option<String>,
    /// Flag table path relative to the DDDB root
    pub flag_table: Option<String>,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl BandRow {
    pub fn parse(tokens: &[String], table: &str) -> EnvisatResult<Self> {
        let malformed =
            |what: &str| EnvisatError::SchemaIntegrity(format!("{} in band table '{}'", what, table));

        if tokens.len() < 11 {
            return Err(malformed("columns missing in record line"));
        }

        let (name, source, data_type) = match (
            token_value(tokens, 0),
            token_value(tokens, 1),
            token_value(tokens, 3),
        ) {
            (Some(n), Some(s), Some(t)) => (n, s, t),
            _ => return Err(malformed("malformed band info record")),
        };

        let data_type = DataType::from_dddb_name(data_type)
            .ok_or_else(|| malformed(&format!("invalid band data type '{}'", data_type)))?;

        let sample_model = match token_value(tokens, 2) {
            Some(model) => SampleModel::from_name(model)
                .ok_or_else(|| malformed(&format!("invalid sample model name '{}'", model)))?,
            None => SampleModel::OneOfOne,
        };

        let spectral_band_index = match token_value(tokens, 4) {
            Some(index) => Some(
                index
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| i.checked_sub(1))
                    .ok_or_else(|| {
                        malformed(&format!("invalid spectral band index for band '{}'", name))
                    })?,
            ),
            None => None,
        };

        let scaling = match token_value(tokens, 5) {
            Some(method_name) => {
                let method = ScalingMethod::from_name(method_name)
                    .ok_or_else(|| malformed(&format!("invalid scaling method name '{}'", method_name)))?;
                match (token_value(tokens, 6), token_value(tokens, 7)) {
                    (Some(offset), Some(factor)) => {
                        Some((method, offset.to_string(), factor.to_string()))
                    }
                    _ => return Err(malformed("malformed band scaling info")),
                }
            }
            None => None,
        };

        let flag_table = token_value(tokens, 9).map(|t| t.strip_prefix("@/").unwrap_or(t).to_string());

        Ok(Self {
            name: name.to_string(),
            source: PixelSource::parse(source)?,
            sample_model,
            data_type,
            spectral_band_index,
            scaling,
            valid_pixel_expression: token_value(tokens, 8).map(str::to_string),
            flag_table,
            unit: token_value(tokens, 10).map(str::to_string),
            description: token_value(tokens, 11).map(str::to_string),
        })
    }

    /// Bind the row to a product: resolve scaling against the GADS and pick
    /// the decoder for the source field type (`None` for virtual bands).
    pub fn resolve(
        &self,
        source_type: Option<DataType>,
        gads_name: Option<&str>,
        gads: Option<&Record>,
        width: usize,
        height: usize,
        flag_coding: Option<Arc<FlagCoding>>,
    ) -> EnvisatResult<BandDescriptor> {
        let (scaling_method, scaling_offset, scaling_factor) = match &self.scaling {
            Some((method, offset, factor)) => (
                *method,
                resolve_gads_value(offset, gads_name, gads)?,
                resolve_gads_value(factor, gads_name, gads)?,
            ),
            None => (ScalingMethod::None, 0.0, 1.0),
        };

        let decoder = match source_type {
            Some(field_type) => Some(SampleDecoder::select(self.sample_model, field_type)?),
            None => None,
        };

        Ok(BandDescriptor {
            name: self.name.clone(),
            data_type: self.data_type,
            sample_model: self.sample_model,
            spectral_band_index: self.spectral_band_index,
            scaling_method,
            scaling_offset,
            scaling_factor,
            valid_pixel_expression: self.valid_pixel_expression.clone(),
            flag_coding,
            unit: self.unit.clone(),
            description: self.description.clone(),
            source: self.source.clone(),
            width,
            height,
            decoder,
        })
    }
}
