use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named integer parameters used to resolve symbolic sizes in DDDB tables
/// (e.g. `LINE_WIDTH`, `tiePointGridWidth`)
pub type SchemaParams = HashMap<String, i64>;

/// Primitive data types known to the ENVISAT data description database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    /// Fixed-length ASCII string, one element per byte
    Ascii,
    /// MJD2000 composite: days, seconds, microseconds (three big-endian i32)
    Utc,
}

impl DataType {
    /// Size in bytes of one element as stored in a product file
    pub fn elem_size(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Ascii => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::Utc => 12,
        }
    }

    /// Size in bytes of one raw buffer unit. Differs from `elem_size` only for
    /// UTC, which is buffered as three separate i32 values.
    pub fn raw_elem_size(&self) -> usize {
        match self {
            DataType::Utc => 4,
            other => other.elem_size(),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::UInt8
                | DataType::Int16
                | DataType::UInt16
                | DataType::Int32
                | DataType::UInt32
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Map a DDDB type token to a data type. `Spare` fillers are single signed bytes.
    pub fn from_dddb_name(name: &str) -> Option<Self> {
        let data_type = match name.to_ascii_lowercase().as_str() {
            "schar" | "spare" => DataType::Int8,
            "uchar" => DataType::UInt8,
            "sshort" => DataType::Int16,
            "ushort" => DataType::UInt16,
            "slong" => DataType::Int32,
            "ulong" => DataType::UInt32,
            "float" => DataType::Float32,
            "double" => DataType::Float64,
            "string" => DataType::Ascii,
            "@/types/utc.dd" | "utc" => DataType::Utc,
            _ => return None,
        };
        Some(data_type)
    }

    /// The DDDB token for this type
    pub fn dddb_name(&self) -> &'static str {
        match self {
            DataType::Int8 => "SChar",
            DataType::UInt8 => "UChar",
            DataType::Int16 => "SShort",
            DataType::UInt16 => "UShort",
            DataType::Int32 => "SLong",
            DataType::UInt32 => "ULong",
            DataType::Float32 => "Float",
            DataType::Float64 => "Double",
            DataType::Ascii => "String",
            DataType::Utc => "@/types/UTC.dd",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dddb_name())
    }
}

/// One-letter dataset type tag found in DSDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetType {
    /// `M`: measurement dataset, one record per scan line
    Measurement,
    /// `A`: annotation dataset
    Annotation,
    /// `G`: global annotation dataset
    GlobalAnnotation,
    /// `R`: reference to an external file
    Reference,
    Unknown(char),
}

impl DatasetType {
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_uppercase() {
            'M' => DatasetType::Measurement,
            'A' => DatasetType::Annotation,
            'G' => DatasetType::GlobalAnnotation,
            'R' => DatasetType::Reference,
            other => DatasetType::Unknown(other),
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            DatasetType::Measurement => 'M',
            DatasetType::Annotation => 'A',
            DatasetType::GlobalAnnotation => 'G',
            DatasetType::Reference => 'R',
            DatasetType::Unknown(c) => *c,
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// ENVISAT UTC value (MJD2000 based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductUtc {
    /// Days since 2000-01-01
    pub days: i32,
    pub seconds: i32,
    pub microseconds: i32,
}

impl ProductUtc {
    pub fn new(days: i32, seconds: i32, microseconds: i32) -> Self {
        Self { days, seconds, microseconds }
    }

    fn epoch() -> DateTime<Utc> {
        // 2000-01-01T00:00:00Z
        DateTime::<Utc>::default() + Duration::seconds(946_684_800)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Self::epoch()
            + Duration::days(self.days as i64)
            + Duration::seconds(self.seconds as i64)
            + Duration::microseconds(self.microseconds as i64)
    }

    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let delta = time - Self::epoch();
        let days = delta.num_days();
        let rest = delta - Duration::days(days);
        let seconds = rest.num_seconds();
        let micros = (rest - Duration::seconds(seconds))
            .num_microseconds()
            .unwrap_or(0);
        Self::new(days as i32, seconds as i32, micros as i32)
    }

    /// Fractional days since 2000-01-01
    pub fn mjd(&self) -> f64 {
        self.days as f64 + (self.seconds as f64 + self.microseconds as f64 * 1.0e-6) / 86_400.0
    }
}

impl std::fmt::Display for ProductUtc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().format("%d-%b-%Y %H:%M:%S%.6f"))
    }
}

/// Error types for ENVISAT product reading
#[derive(Debug, thiserror::Error)]
pub enum EnvisatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DDDB resource not found: {0}")]
    SchemaNotFound(String),

    #[error("DDDB integrity check failed: {0}")]
    SchemaIntegrity(String),

    #[error("header entry not found: '{key}' in {header}")]
    HeaderEntryNotFound { header: String, key: String },

    #[error("failed to parse header entry '{key}': {reason}")]
    HeaderParse { key: String, reason: String },

    #[error("illegal product layout: {0}")]
    IllegalLayout(String),

    #[error("unsupported sample scheme {model} for data type {data_type}")]
    UnsupportedSampleScheme { model: String, data_type: DataType },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("raster read cancelled")]
    Cancelled,
}

/// Result type for ENVISAT operations
pub type EnvisatResult<T> = Result<T, EnvisatError>;
