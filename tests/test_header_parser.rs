//! Header parsing of a complete synthetic product

mod common;

use common::{build_product, DSD_SIZE, MPH_SIZE, PRODUCT_NAME, SPH_HEADER_SIZE};
use envisat::{DataType, DatasetType, Dsd, EnvisatError, HeaderParser};

#[test]
fn test_main_product_header() {
    common::init_logging();
    let bytes = build_product(PRODUCT_NAME);
    let mph = HeaderParser::parse("MPH", &bytes[..MPH_SIZE]).expect("MPH should parse");

    println!("{}", mph);
    assert_eq!(mph.name(), "MPH");
    assert_eq!(mph.param_string("PRODUCT").unwrap().trim_end(), PRODUCT_NAME);
    assert_eq!(mph.param_string("PROC_STAGE").unwrap(), "N");
    assert_eq!(mph.param_uint("NUM_DSD").unwrap(), 4);
    assert_eq!(mph.param_uint("SPH_SIZE").unwrap() as usize, SPH_HEADER_SIZE + 4 * DSD_SIZE);
    assert_eq!(mph.param("TOT_SIZE").unwrap().data_type(), DataType::UInt32);
    assert_eq!(mph.param("DSD_SIZE").unwrap().unit(), Some("bytes"));

    let start = mph.param_utc("SENSING_START").unwrap();
    assert_eq!((start.days, start.seconds, start.microseconds), (1230, 36_754, 123_456));

    assert!(matches!(
        mph.param_string("ORBIT"),
        Err(EnvisatError::HeaderEntryNotFound { .. })
    ));
}

#[test]
fn test_specific_header_and_descriptors() {
    let bytes = build_product(PRODUCT_NAME);
    let sph_bytes = &bytes[MPH_SIZE..MPH_SIZE + SPH_HEADER_SIZE];
    let sph = HeaderParser::parse("SPH", sph_bytes).unwrap();
    assert_eq!(sph.param_int("LINE_LENGTH").unwrap(), common::WIDTH as i32);
    assert_eq!(sph.param("line_length").unwrap().unit(), Some("samples"));
    assert_eq!(sph.param_int("SAMPLES_PER_TIE_PT").unwrap(), 4);

    let block_start = MPH_SIZE + SPH_HEADER_SIZE + DSD_SIZE;
    let dsd = Dsd::parse(1, &bytes[block_start..block_start + DSD_SIZE]).unwrap();
    assert_eq!(dsd.dataset_name, "Samples MDS");
    assert_eq!(dsd.dataset_type, DatasetType::Measurement);
    assert_eq!(dsd.dataset_offset as usize, common::samples_offset());
    assert_eq!(dsd.num_records, common::HEIGHT);
    assert_eq!(dsd.record_size, common::SAMPLES_RECORD_SIZE);

    let spare_start = MPH_SIZE + SPH_HEADER_SIZE + 2 * DSD_SIZE;
    let spare = Dsd::parse(2, &bytes[spare_start..spare_start + DSD_SIZE]).unwrap();
    assert!(spare.dataset_name.is_empty());
    assert!(spare.is_empty());
}
