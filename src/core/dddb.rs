//! ENVISAT data description database (DDDB)
//!
//! The database is a tree of pipe-delimited tables:
//!
//! * `products/<type>.dd` lists the datasets of a product type together with
//!   the record table describing each dataset and the DSD name used in files
//! * record tables list the fields of one dataset record, possibly splicing
//!   in other tables via `@+<path>.dd` references
//! * `bands/<type>.dd` lists the raster bands of a product type
//! * flag tables list the flags of a flag band
//!
//! Parsed tables are cached for the lifetime of the [`Dddb`] instance.
//! Record and band tables are cached unresolved, so named size parameters and
//! GADS values are applied per product.

use crate::config::ReaderConfig;
use crate::core::catalog::{create_flag_mask, BandRow, FlagCoding};
use crate::core::schema::{FieldSchema, RecordSchema};
use crate::core::table::{parse_integer_field, parse_rows, token_value};
use crate::io::resource::{DirectoryStore, ResourceStore};
use crate::types::{DataType, EnvisatError, EnvisatResult, SchemaParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Index of the first binary dataset row in a product table
const FIRST_BINARY_DATASET_INDEX: usize = 3;

/// Maximum nesting depth of `@+` record table references
const MAX_REFERENCE_DEPTH: usize = 16;

/// One dataset row of a product table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub dataset_name: String,
    /// Record table path relative to the database root
    pub record_table: String,
    pub dsd_name: String,
    pub description: String,
}

/// Parsed product table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: String,
    pub description: Option<String>,
    pub datasets: Vec<DatasetInfo>,
}

impl ProductInfo {
    pub fn dataset(&self, dataset_name: &str) -> Option<&DatasetInfo> {
        self.datasets
            .iter()
            .find(|d| d.dataset_name.eq_ignore_ascii_case(dataset_name))
    }

    /// Dataset stored under the given DSD name
    pub fn dataset_for_dsd(&self, dsd_name: &str) -> Option<&DatasetInfo> {
        self.datasets
            .iter()
            .find(|d| d.dsd_name.eq_ignore_ascii_case(dsd_name))
    }
}

type Cache<T> = RwLock<HashMap<String, Arc<T>>>;

/// Schema database with append-only caches
pub struct Dddb {
    store: Arc<dyn ResourceStore>,
    products: Cache<ProductInfo>,
    record_tables: Cache<Vec<Vec<String>>>,
    band_tables: Cache<Vec<BandRow>>,
    flag_codings: Cache<FlagCoding>,
    existence: RwLock<HashMap<String, bool>>,
}

impl std::fmt::Debug for Dddb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dddb").field("store", &self.store.describe()).finish()
    }
}

fn cached<T>(
    cache: &Cache<T>,
    key: &str,
    load: impl FnOnce() -> EnvisatResult<T>,
) -> EnvisatResult<Arc<T>> {
    if let Some(value) = cache
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
    {
        return Ok(Arc::clone(value));
    }

    // Concurrent loads of the same key are harmless: the first insert wins
    let value = Arc::new(load()?);
    let mut map = cache.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(map.entry(key.to_string()).or_insert(value)))
}

impl Dddb {
    /// Create an isolated database on top of `store`
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            products: RwLock::new(HashMap::new()),
            record_tables: RwLock::new(HashMap::new()),
            band_tables: RwLock::new(HashMap::new()),
            flag_codings: RwLock::new(HashMap::new()),
            existence: RwLock::new(HashMap::new()),
        }
    }

    /// Create a database reading tables from a directory
    pub fn from_dir<P: AsRef<Path>>(root: P) -> Self {
        Self::new(Arc::new(DirectoryStore::new(root)))
    }

    /// The process-wide database, rooted at the configured DDDB directory
    pub fn global() -> Arc<Dddb> {
        static GLOBAL: OnceLock<Arc<Dddb>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            let config = ReaderConfig::from_env();
            log::info!("Using DDDB at {}", config.dddb_dir.display());
            Arc::new(Dddb::from_dir(&config.dddb_dir))
        }))
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    /// Memoized existence check, never fails
    pub fn resource_exists(&self, path: &str) -> bool {
        if let Some(exists) = self
            .existence
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return *exists;
        }
        let exists = self.store.exists(path);
        self.existence
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), exists);
        exists
    }

    /// Pick the most specific product type with a product table.
    ///
    /// Tries `<product_type><suffix>` for each suffix in order, then the bare type.
    pub fn resolve_product_type(&self, product_type: &str, suffixes: &[String]) -> EnvisatResult<String> {
        let candidates = suffixes
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}{}", product_type, s))
            .chain(std::iter::once(product_type.to_string()));

        for candidate in candidates {
            if self.resource_exists(&product_table_path(&candidate)) {
                if candidate != product_type {
                    log::debug!("DDDB: product type {} resolved to {}", product_type, candidate);
                }
                return Ok(candidate);
            }
        }

        Err(EnvisatError::SchemaNotFound(format!(
            "no product table for product type '{}' in {}",
            product_type,
            self.store.describe()
        )))
    }

    pub fn product_info(&self, product_type: &str) -> EnvisatResult<Arc<ProductInfo>> {
        let path = product_table_path(product_type);
        cached(&self.products, &path, || self.read_product_info(&path))
    }

    fn read_product_info(&self, path: &str) -> EnvisatResult<ProductInfo> {
        let rows = parse_rows(&self.store.read(path)?);
        let mut rows = rows.iter();

        let header = rows
            .next()
            .ok_or_else(|| EnvisatError::SchemaIntegrity(format!("DDDB resource is empty: {}", path)))?;
        let mut info = ProductInfo {
            product_name: header[0].clone(),
            description: token_value(header, 1).map(str::to_string),
            datasets: Vec::new(),
        };

        for tokens in rows {
            let (Some(record_table), Some(dsd_name)) = (tokens.get(1), tokens.get(2)) else {
                continue;
            };
            if record_table.is_empty() || dsd_name.is_empty() {
                continue;
            }
            info.datasets.push(DatasetInfo {
                dataset_name: tokens[0].clone(),
                record_table: record_table
                    .strip_prefix("@/")
                    .unwrap_or(record_table)
                    .to_string(),
                dsd_name: dsd_name.clone(),
                description: tokens.get(3).cloned().unwrap_or_default(),
            });
        }

        if info.datasets.is_empty() {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "DDDB resource is empty or invalid: {}",
                path
            )));
        }
        log::debug!(
            "DDDB: product table {} with {} datasets",
            info.product_name,
            info.datasets.len()
        );
        Ok(info)
    }

    pub fn product_description(&self, product_type: &str) -> EnvisatResult<Option<String>> {
        Ok(self.product_info(product_type)?.description.clone())
    }

    /// Names of all binary datasets expected in a product of this type
    pub fn dataset_names(&self, product_type: &str) -> EnvisatResult<Vec<String>> {
        let info = self.product_info(product_type)?;
        if info.datasets.len() < FIRST_BINARY_DATASET_INDEX {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "illegal DDDB file content for product type '{}'",
                product_type
            )));
        }
        Ok(info.datasets[FIRST_BINARY_DATASET_INDEX..]
            .iter()
            .map(|d| d.dataset_name.clone())
            .collect())
    }

    pub fn dataset_info(&self, product_type: &str, dataset_name: &str) -> EnvisatResult<DatasetInfo> {
        self.product_info(product_type)?
            .dataset(dataset_name)
            .cloned()
            .ok_or_else(|| {
                EnvisatError::SchemaNotFound(format!(
                    "dataset information not found: product type '{}', dataset name '{}'",
                    product_type, dataset_name
                ))
            })
    }

    /// Name of the DSD carrying the given dataset in product files
    pub fn dsd_name(&self, product_type: &str, dataset_name: &str) -> EnvisatResult<String> {
        Ok(self.dataset_info(product_type, dataset_name)?.dsd_name)
    }

    /// Resolve the record layout of a dataset for the given size parameters
    pub fn read_record_schema(
        &self,
        product_type: &str,
        dataset_name: &str,
        params: &SchemaParams,
    ) -> EnvisatResult<RecordSchema> {
        let info = self.dataset_info(product_type, dataset_name)?;
        self.read_record_schema_path(&info.record_table, &info.dataset_name, params, 0)
    }

    /// Resolve a record table given by path relative to the database root
    pub fn read_record_schema_path(
        &self,
        path: &str,
        name: &str,
        params: &SchemaParams,
        depth: usize,
    ) -> EnvisatResult<RecordSchema> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "record table references nested too deeply at {}",
                path
            )));
        }

        let rows = cached(&self.record_tables, path, || Ok(parse_rows(&self.store.read(path)?)))?;
        let mut schema = RecordSchema::new(name);

        for tokens in rows.iter().skip(1) {
            let field_name = &tokens[0];
            let type_token = token_value(tokens, 1).ok_or_else(|| {
                EnvisatError::SchemaIntegrity(format!("{}: field {}: missing data type", path, field_name))
            })?;
            let column = |i: usize| tokens.get(i).map(String::as_str).unwrap_or("");
            let field_size = to_count(parse_integer_field(column(3), Some(params))?, path, field_name)?;
            let repeats = parse_integer_field(column(4), Some(params))?
                .checked_mul(parse_integer_field(column(5), Some(params))?)
                .ok_or_else(|| {
                    EnvisatError::SchemaIntegrity(format!("{}: field {}: size overflow", path, field_name))
                })?;
            let mut num_elems = to_count(repeats, path, field_name)?;

            if let Some(reference) = type_token.strip_prefix("@+") {
                let sub_path = match path.rfind('/') {
                    Some(pos) => format!("{}/{}", &path[..pos], reference),
                    None => reference.to_string(),
                };
                let sub = self.read_record_schema_path(&sub_path, type_token, params, depth + 1)?;
                let prefix = reference.strip_suffix(".dd").unwrap_or(reference);
                for n in 1..=num_elems {
                    if num_elems > 1 {
                        schema.add_record(&sub, &format!("{}.{}", prefix, n));
                    } else {
                        schema.add_record(&sub, prefix);
                    }
                }
                continue;
            }

            let data_type = DataType::from_dddb_name(type_token).ok_or_else(|| {
                EnvisatError::SchemaIntegrity(format!(
                    "{}: field {}: undefined DDDB data type '{}'",
                    path, field_name, type_token
                ))
            })?;

            let mut field_size = field_size;
            if type_token.eq_ignore_ascii_case("spare") && field_size > 0 && num_elems == 1 {
                num_elems = field_size;
                field_size = 1;
                log::trace!("DDDB: spares detected and adjusted: num_elems = {}", num_elems);
            }

            if data_type == DataType::Ascii {
                num_elems = field_size;
            } else if field_size != data_type.elem_size() {
                return Err(EnvisatError::SchemaIntegrity(format!(
                    "{}: field {}: field size mismatch: {} != {}",
                    path,
                    field_name,
                    field_size,
                    data_type.elem_size()
                )));
            }

            if num_elems.checked_mul(data_type.elem_size()).is_none() {
                return Err(EnvisatError::SchemaIntegrity(format!(
                    "{}: field {}: size overflow",
                    path, field_name
                )));
            }

            let mut field = FieldSchema::new(field_name.clone(), data_type, num_elems);
            field.unit = token_value(tokens, 2).map(str::to_string);
            field.description = token_value(tokens, 6).map(str::to_string);
            schema.add_field(field);
        }

        if schema.num_fields() == 0 {
            return Err(EnvisatError::SchemaIntegrity(format!(
                "database resource is empty: {}",
                path
            )));
        }
        Ok(schema)
    }

    /// Rows of the band table of a product type
    pub fn band_rows(&self, product_type: &str) -> EnvisatResult<Arc<Vec<BandRow>>> {
        let path = format!("bands/{}.dd", product_type);
        cached(&self.band_tables, &path, || {
            parse_rows(&self.store.read(&path)?)
                .iter()
                .skip(1)
                .map(|tokens| BandRow::parse(tokens, &path))
                .collect()
        })
    }

    /// Flag coding stored in the flag table at `path`
    pub fn read_flag_coding(&self, path: &str) -> EnvisatResult<Arc<FlagCoding>> {
        cached(&self.flag_codings, path, || {
            let rows = parse_rows(&self.store.read(path)?);
            let mut rows = rows.iter();
            let header = rows.next().ok_or_else(|| {
                EnvisatError::SchemaIntegrity(format!("database resource is empty: {}", path))
            })?;

            let mut coding = FlagCoding::new(header[0].clone());
            for tokens in rows {
                let mask = create_flag_mask(tokens.get(1).map(String::as_str).unwrap_or(""))?;
                coding.add_flag(tokens[0].clone(), mask, tokens.get(2).cloned().unwrap_or_default());
            }
            if coding.flags.is_empty() {
                return Err(EnvisatError::SchemaIntegrity(format!(
                    "database resource is empty: {}",
                    path
                )));
            }
            Ok(coding)
        })
    }
}

fn product_table_path(product_type: &str) -> String {
    format!("products/{}.dd", product_type)
}

fn to_count(value: i64, path: &str, field_name: &str) -> EnvisatResult<usize> {
    usize::try_from(value).map_err(|_| {
        EnvisatError::SchemaIntegrity(format!(
            "{}: field {}: negative size {}",
            path, field_name, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::resource::MemoryStore;

    fn test_dddb() -> Dddb {
        let store = MemoryStore::new()
            .with(
                "products/TST_LV_1P.dd",
                "TST_LV_1P|Test level 1 product\n\
                 MPH|*|MPH|main header\n\
                 SPH|*|SPH|specific header\n\
                 DSD|*|DSD|dataset descriptors\n\
                 Tie_Points|@/tst/tie_points.dd|Tie points ADS|*\n\
                 Samples|@/tst/samples.dd|Samples MDS|*\n",
            )
            .with(
                "tst/samples.dd",
                "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
                 # comment row\n\
                 dsr_time|@/types/UTC.dd|MJD|12|*|*|time\n\
                 quality|UChar|*|1|*|*|*\n\
                 spare_1|Spare|*|3|*|*|*\n\
                 samples|UShort|*|2|LINE_WIDTH|*|*\n",
            )
            .with(
                "tst/tie_points.dd",
                "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
                 num|ULong|*|4|*|*|*\n\
                 @+grid.dd|@+grid.dd|*|*|2|*|*\n",
            )
            .with(
                "tst/huge.dd",
                "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
                 f|UChar|*|1|4294967296|4294967296|*\n",
            )
            .with(
                "tst/grid.dd",
                "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
                 lat|SLong|deg|4|tiePointGridWidth|*|*\n",
            );
        Dddb::new(Arc::new(store))
    }

    #[test]
    fn test_product_table_lookups() {
        let dddb = test_dddb();
        assert_eq!(
            dddb.product_description("TST_LV_1P").unwrap().as_deref(),
            Some("Test level 1 product")
        );
        assert_eq!(dddb.dataset_names("TST_LV_1P").unwrap(), vec!["Tie_Points", "Samples"]);
        assert_eq!(dddb.dsd_name("TST_LV_1P", "samples").unwrap(), "Samples MDS");
        assert!(matches!(
            dddb.dsd_name("TST_LV_1P", "Unknown"),
            Err(EnvisatError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn test_nested_references_are_prefixed() {
        let dddb = test_dddb();
        let mut params = SchemaParams::new();
        params.insert("tiePointGridWidth".to_string(), 5);
        let schema = dddb.read_record_schema("TST_LV_1P", "Tie_Points", &params).unwrap();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["num", "grid.1.lat", "grid.2.lat"]);
        assert_eq!(schema.size_in_bytes(), 4 + 2 * 20);
    }

    #[test]
    fn test_spare_adjustment_and_sizes() {
        let dddb = test_dddb();
        let mut params = SchemaParams::new();
        params.insert("LINE_WIDTH".to_string(), 8);
        let schema = dddb.read_record_schema("TST_LV_1P", "Samples", &params).unwrap();

        assert_eq!(schema.num_fields(), 4);
        assert_eq!(schema.field_at(2).unwrap().num_elems, 3);
        assert_eq!(schema.field_at(2).unwrap().data_type, DataType::Int8);
        assert_eq!(schema.field_at(0).unwrap().unit.as_deref(), Some("MJD"));
        assert_eq!(schema.size_in_bytes(), 12 + 1 + 3 + 16);
    }

    #[test]
    fn test_product_type_fallback_chain() {
        let dddb = test_dddb();
        let suffixes = vec!["_V2".to_string(), "_V1".to_string()];
        assert_eq!(dddb.resolve_product_type("TST_LV_1P", &suffixes).unwrap(), "TST_LV_1P");
        assert!(matches!(
            dddb.resolve_product_type("XXX_LV_1P", &suffixes),
            Err(EnvisatError::SchemaNotFound(_))
        ));
        assert!(dddb.resource_exists("tst/grid.dd"));
        assert!(!dddb.resource_exists("tst/none.dd"));
    }

    #[test]
    fn test_oversized_repeat_counts_are_integrity_errors() {
        let dddb = test_dddb();
        match dddb.read_record_schema_path("tst/huge.dd", "Huge", &SchemaParams::new(), 0) {
            Err(EnvisatError::SchemaIntegrity(msg)) => assert!(msg.contains("overflow")),
            other => panic!("expected SchemaIntegrity, got {:?}", other.map(|s| s.size_in_bytes())),
        }
    }
}
