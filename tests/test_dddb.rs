//! DDDB resolution against in-memory and on-disk table sets

mod common;

use envisat::io::{DirectoryStore, MemoryStore};
use envisat::{DataType, Dddb, EnvisatError, SchemaParams};
use std::sync::Arc;

fn params(entries: &[(&str, i64)]) -> SchemaParams {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn line_width_dddb() -> Dddb {
    let store = MemoryStore::new()
        .with(
            "products/ASA_TST_1P.dd",
            "ASA_TST_1P|Line width test\n\
             MPH|*|MPH|*\n\
             SPH|*|SPH|*\n\
             DSD|*|DSD|*\n\
             Lines|@/asa_tst_1p/lines.dd|LINES MDS|*\n",
        )
        .with(
            "asa_tst_1p/lines.dd",
            "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
             dsr_time|@/types/UTC.dd|MJD|12|*|*|*\n\
             pixels|UShort|*|2|LINE_WIDTH|*|*\n\
             label|String|*|16|*|*|*\n",
        );
    Dddb::new(Arc::new(store))
}

#[test]
fn test_line_width_resolves_repeat_counts() {
    common::init_logging();
    let dddb = line_width_dddb();

    let schema = dddb
        .read_record_schema("ASA_TST_1P", "Lines", &params(&[("LINE_WIDTH", 512)]))
        .expect("schema should resolve");
    let pixels = schema.field_at(1).unwrap();
    assert_eq!(pixels.num_elems, 512);
    assert_eq!(pixels.data_type, DataType::UInt16);
    assert_eq!(schema.field_at(2).unwrap().num_elems, 16);
    assert_eq!(schema.size_in_bytes(), 12 + 1024 + 16);
    assert_eq!(schema.field_offset(2), 12 + 1024);
}

#[test]
fn test_undefined_size_name_is_integrity_error() {
    let dddb = line_width_dddb();
    match dddb.read_record_schema("ASA_TST_1P", "Lines", &params(&[("LINE_HEIGHT", 512)])) {
        Err(EnvisatError::SchemaIntegrity(msg)) => assert!(msg.contains("LINE_WIDTH")),
        other => panic!("expected SchemaIntegrity, got {:?}", other.map(|s| s.size_in_bytes())),
    }
}

#[test]
fn test_missing_tables_are_not_found() {
    let dddb = line_width_dddb();
    assert!(matches!(
        dddb.product_info("MER_RR__1P"),
        Err(EnvisatError::SchemaNotFound(_))
    ));
    assert!(matches!(
        dddb.read_record_schema("ASA_TST_1P", "Quality", &SchemaParams::new()),
        Err(EnvisatError::SchemaNotFound(_))
    ));
}

#[test]
fn test_directory_store_tables() {
    common::init_logging();
    let dir = tempfile::tempdir().expect("temp dir");
    common::write_tables(dir.path());
    let dddb = Dddb::new(Arc::new(DirectoryStore::new(dir.path())));

    assert_eq!(
        dddb.dataset_names("TST_LV__1P").unwrap(),
        vec!["Scaling_GADS", "Samples", "Tie_Points", "Missing"]
    );
    assert_eq!(dddb.dsd_name("TST_LV__1P", "tie_points").unwrap(), "Tie Points ADS");

    let rows = dddb.band_rows("TST_LV__1P").unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["radiance", "packed", "quality", "latitude", "ratio", "missing"]);
    assert_eq!(rows[2].flag_table.as_deref(), Some("flags/quality.dd"));

    let coding = dddb.read_flag_coding("flags/quality.dd").unwrap();
    assert_eq!(coding.name, "quality_flags");
    assert_eq!(coding.flag("HIGH").unwrap().mask, 0b11);
    assert_eq!(coding.flags_set(3), vec!["ODD", "HIGH"]);

    // cached instances are shared
    let again = dddb.read_flag_coding("flags/quality.dd").unwrap();
    assert!(Arc::ptr_eq(&coding, &again));

    let schema = dddb
        .read_record_schema("TST_LV__1P", "Samples", &params(&[("LINE_WIDTH", common::WIDTH as i64)]))
        .unwrap();
    assert_eq!(schema.size_in_bytes(), common::SAMPLES_RECORD_SIZE);
}
