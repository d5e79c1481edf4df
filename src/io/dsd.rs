//! Dataset descriptors embedded in the SPH

use crate::io::header::{Header, HeaderParser};
use crate::types::{DatasetType, EnvisatError, EnvisatResult};
use serde::{Deserialize, Serialize};

/// Location and shape of one dataset in a product file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dsd {
    /// Position in the SPH, 0-based
    pub index: usize,
    pub dataset_name: String,
    pub dataset_type: DatasetType,
    pub filename: Option<String>,
    pub dataset_offset: u64,
    pub dataset_size: u64,
    pub num_records: usize,
    pub record_size: usize,
}

impl Dsd {
    /// Build a descriptor and check its size invariant
    pub fn new(
        index: usize,
        dataset_name: impl Into<String>,
        dataset_type: DatasetType,
        filename: Option<String>,
        dataset_offset: u64,
        dataset_size: u64,
        num_records: usize,
        record_size: usize,
    ) -> EnvisatResult<Self> {
        let dsd = Self {
            index,
            dataset_name: dataset_name.into(),
            dataset_type,
            filename,
            dataset_offset,
            dataset_size,
            num_records,
            record_size,
        };
        dsd.validate()?;
        Ok(dsd)
    }

    /// A dataset is empty if any of size, record count or record size is zero
    pub fn is_empty(&self) -> bool {
        self.dataset_size == 0 || self.num_records == 0 || self.record_size == 0
    }

    pub fn validate(&self) -> EnvisatResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let expected = self.num_records as u64 * self.record_size as u64;
        if expected != self.dataset_size {
            return Err(EnvisatError::IllegalLayout(format!(
                "DSD '{}': size {} != {} records x {} bytes",
                self.dataset_name, self.dataset_size, self.num_records, self.record_size
            )));
        }
        Ok(())
    }

    /// Parse the DSD block at position `index`
    pub fn parse(index: usize, bytes: &[u8]) -> EnvisatResult<Self> {
        let header = HeaderParser::parse(&format!("DSD({})", index + 1), bytes)?;
        Self::from_header(index, &header)
    }

    fn from_header(index: usize, header: &Header) -> EnvisatResult<Self> {
        let string = |key: &str| -> EnvisatResult<String> {
            if header.has_param(key) {
                Ok(header.param_string(key)?.trim().to_string())
            } else {
                Ok(String::new())
            }
        };
        let dataset_type = string("DS_TYPE")?
            .chars()
            .next()
            .map_or(DatasetType::Unknown('?'), DatasetType::from_char);
        let filename = Some(string("FILENAME")?).filter(|f| !f.is_empty());
        let uint = |key: &str| -> EnvisatResult<u64> {
            if header.has_param(key) {
                Ok(header.param_uint(key)? as u64)
            } else {
                Ok(0)
            }
        };

        Self::new(
            index,
            string("DS_NAME")?,
            dataset_type,
            filename,
            uint("DS_OFFSET")?,
            uint("DS_SIZE")?,
            uint("NUM_DSR")? as usize,
            uint("DSR_SIZE")? as usize,
        )
    }
}

impl std::fmt::Display for Dsd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DSD({}) '{}' type {} offset {} size {} ({} x {})",
            self.index + 1,
            self.dataset_name,
            self.dataset_type,
            self.dataset_offset,
            self.dataset_size,
            self.num_records,
            self.record_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dsd_block() {
        let block = "DS_NAME=\"Quality ADS                 \"\n\
                     DS_TYPE=A\n\
                     FILENAME=\"                                                              \"\n\
                     DS_OFFSET=+00000000000000007197<bytes>\n\
                     DS_SIZE=+00000000000000000160<bytes>\n\
                     NUM_DSR=+0000000008\n\
                     DSR_SIZE=+0000000020<bytes>\n";
        let dsd = Dsd::parse(2, block.as_bytes()).unwrap();
        assert_eq!(dsd.dataset_name, "Quality ADS");
        assert_eq!(dsd.dataset_type, DatasetType::Annotation);
        assert_eq!(dsd.filename, None);
        assert_eq!(dsd.dataset_offset, 7197);
        assert_eq!(dsd.num_records, 8);
        assert_eq!(dsd.record_size, 20);
        assert!(!dsd.is_empty());
    }

    #[test]
    fn test_size_invariant() {
        assert!(Dsd::new(0, "x", DatasetType::Measurement, None, 100, 80, 4, 20).is_ok());
        assert!(matches!(
            Dsd::new(0, "x", DatasetType::Measurement, None, 100, 81, 4, 20),
            Err(EnvisatError::IllegalLayout(_))
        ));
        let empty = Dsd::new(0, "x", DatasetType::Reference, Some("AUX".into()), 0, 0, 0, 0).unwrap();
        assert!(empty.is_empty());
    }
}
