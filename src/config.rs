//! Reader configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the DDDB location
pub const DDDB_DIR_ENV: &str = "ENVISAT_DDDB_DIR";

/// Product reader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Root directory of the data description database
    pub dddb_dir: PathBuf,
    /// Measurement datasets are interleaved line by line
    pub line_interleaved: bool,
    /// Scan lines run west to east in the file
    pub chronological_order: bool,
    /// Raw value filled into lines without a physical record
    pub missing_pixel_value: f64,
    /// Format revision suffixes tried before the bare product type, most specific first
    pub format_suffixes: Vec<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            dddb_dir: default_dddb_dir(),
            line_interleaved: false,
            chronological_order: true,
            missing_pixel_value: 0.0,
            format_suffixes: Vec::new(),
        }
    }
}

impl ReaderConfig {
    /// Defaults with the DDDB directory taken from `ENVISAT_DDDB_DIR` if set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(DDDB_DIR_ENV).filter(|d| !d.is_empty()) {
            config.dddb_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_dddb_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dddb_dir = dir.into();
        self
    }

    pub fn with_line_interleaved(mut self, line_interleaved: bool) -> Self {
        self.line_interleaved = line_interleaved;
        self
    }

    pub fn with_chronological_order(mut self, chronological_order: bool) -> Self {
        self.chronological_order = chronological_order;
        self
    }

    pub fn with_missing_pixel_value(mut self, value: f64) -> Self {
        self.missing_pixel_value = value;
        self
    }

    pub fn with_format_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.format_suffixes = suffixes.into_iter().map(Into::into).collect();
        self
    }
}

/// `<data dir>/envisat/dddb`, or `./dddb` when the platform has no data dir
fn default_dddb_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("envisat").join("dddb"))
        .unwrap_or_else(|| PathBuf::from("dddb"))
}
