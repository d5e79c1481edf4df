//! ASCII header blocks (MPH, SPH, DSDs)
//!
//! A header is a sequence of `KEY=value` lines. Each value is typed by
//! inspecting its text and stored as a field of an in-memory record, so
//! header entries and dataset fields share one access model.

use crate::core::record::{Field, FieldData, Record};
use crate::core::schema::{FieldSchema, RecordSchema};
use crate::types::{EnvisatError, EnvisatResult, ProductUtc};
use chrono::{NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Date format of ASCII UTC entries, e.g. `15-MAY-2003 10:12:34.123456`
const UTC_FORMAT: &str = "%d-%b-%Y %H:%M:%S%.f";

fn numeric_run_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([+-](\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)+$").ok())
        .as_ref()
}

/// Parser for ASCII header blocks
pub struct HeaderParser;

impl HeaderParser {
    /// Parse `bytes` into a header called `name`
    pub fn parse(name: &str, bytes: &[u8]) -> EnvisatResult<Header> {
        let text = String::from_utf8_lossy(bytes);
        let mut schema = RecordSchema::new(name);
        let mut values = Vec::new();

        for line in text.lines() {
            let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }

            let (value, unit) = split_unit(value.trim());
            let data = match parse_value(key, value)? {
                // empty strings still occupy one element
                FieldData::Ascii(bytes) if bytes.is_empty() => FieldData::Ascii(vec![0]),
                other => other,
            };
            let mut field = FieldSchema::new(key, data.data_type(), num_elems(&data));
            field.unit = unit.map(str::to_string);
            schema.add_field(field);
            values.push(data);
        }

        let schema = Arc::new(schema);
        let fields = schema
            .fields()
            .iter()
            .zip(values)
            .map(|(field_schema, data)| Field::with_data(Arc::clone(field_schema), data))
            .collect::<EnvisatResult<Vec<_>>>()?;

        log::trace!("parsed header {} with {} entries", name, fields.len());
        Ok(Header {
            record: Record::from_fields(schema, fields),
        })
    }
}

/// Strip a trailing `<unit>` from an unquoted value
fn split_unit(value: &str) -> (&str, Option<&str>) {
    if value.starts_with('"') || !value.ends_with('>') {
        return (value, None);
    }
    match value.rfind('<') {
        Some(pos) => (value[..pos].trim_end(), Some(&value[pos + 1..value.len() - 1])),
        None => (value, None),
    }
}

fn num_elems(data: &FieldData) -> usize {
    match data {
        FieldData::Utc(v) => v.len() / 3,
        other => other.len(),
    }
}

/// Split a numeric run into sub-tokens at sign characters, except for signs
/// directly following an exponent marker
fn split_numeric_run(token: &str) -> Vec<&str> {
    let bytes = token.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..bytes.len() {
        let is_sign = bytes[i] == b'+' || bytes[i] == b'-';
        let after_exponent = matches!(bytes[i - 1], b'e' | b'E');
        if is_sign && !after_exponent {
            parts.push(&token[start..i]);
            start = i;
        }
    }
    parts.push(&token[start..]);
    parts
}

/// Drop the sign and redundant leading zeros of a sub-token
fn trim_leading_zeros(sub: &str) -> (bool, &str) {
    let negative = sub.starts_with('-');
    let body = sub.trim_start_matches(['+', '-']);
    let trimmed = body.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() || trimmed.starts_with(['.', 'e', 'E']) {
        // keep one zero in front of a fraction or an exponent
        &body[body.len() - trimmed.len() - usize::from(body.len() > trimmed.len())..]
    } else {
        trimmed
    };
    (negative, trimmed)
}

fn parse_value(key: &str, value: &str) -> EnvisatResult<FieldData> {
    if value == "0" || value == "1" {
        return Ok(FieldData::Int8(vec![if value == "1" { 1 } else { 0 }]));
    }
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        return Ok(FieldData::Ascii(value.as_bytes()[1..value.len() - 1].to_vec()));
    }
    if value.len() == 1 {
        return Ok(FieldData::Ascii(value.as_bytes().to_vec()));
    }
    if numeric_run_pattern().map_or(false, |p| p.is_match(value)) {
        return parse_numeric_run(key, value);
    }
    Ok(FieldData::Ascii(value.as_bytes().to_vec()))
}

fn parse_numeric_run(key: &str, value: &str) -> EnvisatResult<FieldData> {
    let parts = split_numeric_run(value);
    let is_float = parts.iter().any(|p| p.contains(['.', 'e', 'E']));
    let parse_error = |reason: String| EnvisatError::HeaderParse {
        key: key.to_string(),
        reason,
    };

    if is_float {
        let values = parts
            .iter()
            .map(|p| {
                let (negative, body) = trim_leading_zeros(p);
                let v = body
                    .parse::<f64>()
                    .map_err(|e| parse_error(format!("'{}': {}", p, e)))?;
                Ok(if negative { -v } else { v })
            })
            .collect::<EnvisatResult<Vec<_>>>()?;
        return Ok(FieldData::Float64(values));
    }

    let any_minus = value.contains('-');
    let mut magnitudes = Vec::with_capacity(parts.len());
    let mut wide = false;
    for part in &parts {
        let (negative, body) = trim_leading_zeros(part);
        let digits = part.chars().filter(|c| c.is_ascii_digit()).count();
        // magnitudes beyond u64 cannot be integers in any header type
        let magnitude = body.parse::<u64>().unwrap_or(u64::MAX);
        if magnitude > i32::MAX as u64 || digits > 10 {
            wide = true;
        }
        magnitudes.push((negative, magnitude));
    }

    if wide && !any_minus {
        if magnitudes.iter().all(|(_, m)| *m <= u32::MAX as u64) {
            return Ok(FieldData::UInt32(magnitudes.iter().map(|(_, m)| *m as u32).collect()));
        }
    } else {
        let signed: Vec<i64> = magnitudes
            .iter()
            .map(|(negative, m)| if *negative { -(*m as i128) } else { *m as i128 })
            .map(|v| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
            .collect();
        if signed.iter().all(|v| *v >= i32::MIN as i64 && *v <= i32::MAX as i64) {
            return Ok(FieldData::Int32(signed.iter().map(|v| *v as i32).collect()));
        }
    }

    log::debug!("header entry {}: integer run '{}' out of range, stored as float", key, value);
    Ok(FieldData::Float64(
        magnitudes
            .iter()
            .map(|(negative, m)| if *negative { -(*m as f64) } else { *m as f64 })
            .collect(),
    ))
}

/// A parsed header: typed entries in file order
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    record: Record,
}

impl Header {
    pub fn name(&self) -> &str {
        self.record.schema().name()
    }

    pub fn num_params(&self) -> usize {
        self.record.num_fields()
    }

    pub fn params(&self) -> &[Field] {
        self.record.fields()
    }

    /// The header as a record
    pub fn as_record(&self) -> &Record {
        &self.record
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.record.field(key).is_some()
    }

    pub fn param(&self, key: &str) -> EnvisatResult<&Field> {
        self.record.field(key).ok_or_else(|| EnvisatError::HeaderEntryNotFound {
            header: self.name().to_string(),
            key: key.to_string(),
        })
    }

    fn parse_error(&self, key: &str, reason: impl Into<String>) -> EnvisatError {
        EnvisatError::HeaderParse {
            key: format!("{}.{}", self.name(), key),
            reason: reason.into(),
        }
    }

    fn integer(&self, key: &str) -> EnvisatResult<i64> {
        let field = self.param(key)?;
        match field.data() {
            FieldData::Ascii(_) => field
                .as_string()
                .trim()
                .parse::<i64>()
                .map_err(|e| self.parse_error(key, e.to_string())),
            FieldData::Float32(_) | FieldData::Float64(_) => {
                Err(self.parse_error(key, "value is not an integer"))
            }
            FieldData::Utc(_) => Err(self.parse_error(key, "value is a UTC time")),
            _ => field.elem_i64(0),
        }
    }

    pub fn param_int(&self, key: &str) -> EnvisatResult<i32> {
        let value = self.integer(key)?;
        i32::try_from(value).map_err(|_| self.parse_error(key, format!("{} out of i32 range", value)))
    }

    pub fn param_uint(&self, key: &str) -> EnvisatResult<u32> {
        let value = self.integer(key)?;
        u32::try_from(value).map_err(|_| self.parse_error(key, format!("{} out of u32 range", value)))
    }

    pub fn param_double(&self, key: &str) -> EnvisatResult<f64> {
        let field = self.param(key)?;
        match field.data() {
            FieldData::Ascii(_) => field
                .as_string()
                .trim()
                .parse::<f64>()
                .map_err(|e| self.parse_error(key, e.to_string())),
            FieldData::Utc(_) => Err(self.parse_error(key, "value is a UTC time")),
            _ => field.elem_f64(0),
        }
    }

    pub fn param_float(&self, key: &str) -> EnvisatResult<f32> {
        Ok(self.param_double(key)? as f32)
    }

    pub fn param_string(&self, key: &str) -> EnvisatResult<String> {
        Ok(self.param(key)?.as_string())
    }

    /// UTC entry, stored either as a 3-element integer composite or as an
    /// ASCII date like `15-MAY-2003 10:12:34.123456`
    pub fn param_utc(&self, key: &str) -> EnvisatResult<ProductUtc> {
        let field = self.param(key)?;
        match field.data() {
            FieldData::Utc(_) => field
                .elem_utc(0)
                .ok_or_else(|| self.parse_error(key, "empty UTC value")),
            FieldData::Int32(v) if v.len() == 3 => Ok(ProductUtc::new(v[0], v[1], v[2])),
            FieldData::Ascii(_) => {
                let text = field.as_string();
                let parsed = NaiveDateTime::parse_from_str(text.trim(), UTC_FORMAT)
                    .map_err(|e| self.parse_error(key, format!("'{}': {}", text.trim(), e)))?;
                Ok(ProductUtc::from_datetime(Utc.from_utc_datetime(&parsed)))
            }
            _ => Err(self.parse_error(key, "value is not a UTC time")),
        }
    }
}

impl std::fmt::Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use approx::assert_relative_eq;

    fn header(text: &str) -> Header {
        HeaderParser::parse("TEST", text.as_bytes()).unwrap()
    }

    #[test]
    fn test_type_inference() {
        let h = header(
            "FLAG=1\n\
             PRODUCT=\"MER_RR__1PNPDK20030515_101234_000000982016_00022_06238_0000.N1\"\n\
             PHASE=X\n\
             TOT_SIZE=+00000000000000012345<bytes>\n\
             ABS_ORBIT=+06238\n\
             DELTA_UT1=-.123456<s>\n\
             STATE=+1234567-0000042+0000007\n\
             BIG=+3000000000\n\
             NEG_BIG=-3000000000\n\
             X_POSITION=-7162521.303<m>\n\
             EXP=+1.5E+02\n\
             PLAIN=hello world\n",
        );

        let types: Vec<DataType> = h.params().iter().map(|f| f.data_type()).collect();
        assert_eq!(
            types,
            vec![
                DataType::Int8,
                DataType::Ascii,
                DataType::Ascii,
                DataType::UInt32,
                DataType::Int32,
                DataType::Float64,
                DataType::Int32,
                DataType::UInt32,
                DataType::Float64,
                DataType::Float64,
                DataType::Float64,
                DataType::Ascii,
            ]
        );

        assert_eq!(h.param_string("PRODUCT").unwrap().len(), 62);
        assert_eq!(h.param_uint("TOT_SIZE").unwrap(), 12345);
        assert_eq!(h.param_int("TOT_SIZE").unwrap(), 12345);
        assert_eq!(h.param("TOT_SIZE").unwrap().unit(), Some("bytes"));
        assert_eq!(h.param_int("abs_orbit").unwrap(), 6238);
        assert_relative_eq!(h.param_double("DELTA_UT1").unwrap(), -0.123456);
        assert_eq!(h.param("STATE").unwrap().num_elems(), 3);
        assert_eq!(h.param("STATE").unwrap().elem_i64(1).unwrap(), -42);
        assert_eq!(h.param_uint("BIG").unwrap(), 3_000_000_000);
        assert_relative_eq!(h.param_double("EXP").unwrap(), 150.0);
        assert_eq!(h.param_string("PLAIN").unwrap(), "hello world");
    }

    #[test]
    fn test_accessor_failures() {
        let h = header("NAME=\"abc\"\nVALUE=+1.5\nBIG=+3000000000\nEMPTY=\"\"\n");
        assert_eq!(h.param_string("EMPTY").unwrap(), "");
        assert!(matches!(
            h.param_int("MISSING"),
            Err(EnvisatError::HeaderEntryNotFound { .. })
        ));
        assert!(matches!(h.param_int("NAME"), Err(EnvisatError::HeaderParse { .. })));
        assert!(matches!(h.param_int("VALUE"), Err(EnvisatError::HeaderParse { .. })));
        assert!(matches!(h.param_int("BIG"), Err(EnvisatError::HeaderParse { .. })));
        assert!(matches!(h.param_utc("VALUE"), Err(EnvisatError::HeaderParse { .. })));
    }

    #[test]
    fn test_utc_entries() {
        let h = header("SENSING_START=\"15-MAY-2003 10:12:34.500000\"\nBAD_TIME=\"yesterday\"\n");
        let utc = h.param_utc("SENSING_START").unwrap();
        assert_eq!(utc.days, 1230);
        assert_eq!(utc.seconds, 36_754);
        assert_eq!(utc.microseconds, 500_000);
        assert!(matches!(h.param_utc("BAD_TIME"), Err(EnvisatError::HeaderParse { .. })));
    }

    #[test]
    fn test_leading_zero_trimming() {
        assert_eq!(trim_leading_zeros("+000123"), (false, "123"));
        assert_eq!(trim_leading_zeros("-0000.5"), (true, "0.5"));
        assert_eq!(trim_leading_zeros("+0000"), (false, "0"));
        assert_eq!(split_numeric_run("+1.0E-03-2+3"), vec!["+1.0E-03", "-2", "+3"]);
    }
}
