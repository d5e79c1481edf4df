//! Synthetic products and DDDB tables shared by the integration tests
#![allow(dead_code)]

use envisat::io::MemoryStore;
use envisat::Dddb;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 4;
pub const MPH_SIZE: usize = 1247;
pub const DSD_SIZE: usize = 280;
pub const NUM_DSD: usize = 4;
pub const SPH_HEADER_SIZE: usize = 200;
pub const GADS_RECORD_SIZE: usize = 8;
pub const SAMPLES_RECORD_SIZE: usize = 12 + 1 + 3 + 2 * WIDTH + 2 * WIDTH;
pub const TIE_POINT_RECORD_SIZE: usize = 4 * 3;
pub const TIE_POINT_RECORDS: usize = 3;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// DDDB tables describing the `TST_LV__1P` product family
pub const TABLES: &[(&str, &str)] = &[
    (
        "products/TST_LV__1P.dd",
        "TST_LV__1P|Synthetic level 1 product\n\
         MPH|*|MPH|Main product header\n\
         SPH|*|SPH|Specific product header\n\
         DSD|*|DSD|Dataset descriptors\n\
         Scaling_GADS|@/tst_lv__1p/scaling.dd|Scaling GADS|Scaling factors\n\
         Samples|@/tst_lv__1p/samples.dd|Samples MDS|Measurement samples\n\
         Tie_Points|@/tst_lv__1p/tie_points.dd|Tie Points ADS|Tie point grid\n\
         Missing|@/tst_lv__1p/samples.dd|Missing MDS|Not present in products\n",
    ),
    (
        "tst_lv__1p/scaling.dd",
        "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
         gain|Float|*|4|*|*|Radiance gain\n\
         offset|Float|*|4|*|*|Radiance offset\n",
    ),
    (
        "tst_lv__1p/samples.dd",
        "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
         dsr_time|@/types/UTC.dd|MJD|12|*|*|Record time\n\
         quality|UChar|*|1|*|*|Quality flags\n\
         spare_1|Spare|*|3|*|*|*\n\
         samples|UShort|*|2|LINE_WIDTH|*|Raw samples\n\
         packed|UChar|*|1|LINE_WIDTH|2|Packed samples\n",
    ),
    (
        "tst_lv__1p/tie_points.dd",
        "Name|Type|Unit|Size|Rep1|Rep2|Description\n\
         lat|SLong|1e-6 deg|4|tiePointGridWidth|*|Latitudes\n",
    ),
    (
        "bands/TST_LV__1P.dd",
        "Band_Name|Dataset|Model|Type|Spectral|Scaling|Offset|Factor|Valid|Flags|Unit|Description\n\
         radiance|Samples.4|1OF1|UShort|1|Linear_Scale|Scaling_GADS.2|Scaling_GADS.1|*|*|mW|Radiance\n\
         packed|Samples.5|2TOF|UShort|*|*|*|*|*|*|*|Packed samples\n\
         quality|Samples.2|*|UChar|*|*|*|*|*|@/flags/quality.dd|*|Quality flags\n\
         latitude|Tie_Points.1|*|SLong|*|Linear_Scale|0.0|1.0E-6|*|*|deg|Latitude\n\
         ratio|=radiance / 2|*|Float|*|*|*|*|*|*|*|Half radiance\n\
         missing|Missing.4|*|UShort|*|*|*|*|*|*|*|Not present\n",
    ),
    (
        "flags/quality.dd",
        "quality_flags|Quality flags\n\
         ODD|0|Odd record\n\
         HIGH|1&0|High and odd\n",
    ),
];

pub fn test_store() -> MemoryStore {
    TABLES
        .iter()
        .fold(MemoryStore::new(), |store, (path, content)| store.with(*path, *content))
}

/// Write the DDDB tables below `root`
pub fn write_tables(root: &Path) {
    for (path, content) in TABLES {
        let file = root.join(path);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(file, content).unwrap();
    }
}

pub fn test_dddb() -> Arc<Dddb> {
    Arc::new(Dddb::new(Arc::new(test_store())))
}

fn pad_block(mut text: String, size: usize) -> Vec<u8> {
    while text.len() < size - 1 {
        text.push(' ');
    }
    text.push('\n');
    text.into_bytes()
}

fn dsd_block(name: &str, ds_type: char, offset: usize, num: usize, size: usize) -> Vec<u8> {
    let text = format!(
        "DS_NAME=\"{:<28}\"\nDS_TYPE={}\nFILENAME=\"{:<62}\"\n\
         DS_OFFSET=+{:020}<bytes>\nDS_SIZE=+{:020}<bytes>\n\
         NUM_DSR=+{:010}\nDSR_SIZE=+{:010}<bytes>\n",
        name,
        ds_type,
        "",
        offset,
        num * size,
        num,
        size
    );
    pad_block(text, DSD_SIZE)
}

/// Raw sample value of pixel `x` in record `r`
pub fn sample_value(r: usize, x: usize) -> u16 {
    (100 * r + x) as u16
}

/// Record time of record `r`
pub fn record_seconds(r: usize) -> i32 {
    36_754 + r as i32
}

pub const GAIN: f32 = 0.5;
pub const OFFSET: f32 = 10.0;

/// Byte offset of the first binary dataset
pub fn data_offset() -> usize {
    MPH_SIZE + SPH_HEADER_SIZE + NUM_DSD * DSD_SIZE
}

pub fn samples_offset() -> usize {
    data_offset() + GADS_RECORD_SIZE
}

pub fn samples_record(r: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(SAMPLES_RECORD_SIZE);
    bytes.extend_from_slice(&1230i32.to_be_bytes());
    bytes.extend_from_slice(&record_seconds(r).to_be_bytes());
    bytes.extend_from_slice(&0i32.to_be_bytes());
    bytes.push(r as u8);
    bytes.extend_from_slice(&[0, 0, 0]);
    for x in 0..WIDTH {
        bytes.extend_from_slice(&sample_value(r, x).to_be_bytes());
    }
    for x in 0..WIDTH {
        bytes.push(r as u8);
        bytes.push(x as u8);
    }
    bytes
}

/// A complete `TST_LV__1P` product of `WIDTH` x `HEIGHT` pixels
pub fn build_product(product_name: &str) -> Vec<u8> {
    let gads_offset = data_offset();
    let samples_offset = samples_offset();
    let tie_offset = samples_offset + HEIGHT * SAMPLES_RECORD_SIZE;
    let total = tie_offset + TIE_POINT_RECORDS * TIE_POINT_RECORD_SIZE;

    let mph = format!(
        "PRODUCT=\"{:<62}\"\nPROC_STAGE=N\n\
         SENSING_START=\"15-MAY-2003 10:12:34.123456\"\n\
         SENSING_STOP=\"15-MAY-2003 10:12:38.000000\"\n\
         TOT_SIZE=+{:020}<bytes>\nSPH_SIZE=+{:010}<bytes>\n\
         NUM_DSD=+{:010}\nDSD_SIZE=+{:010}<bytes>\nNUM_DATA_SETS=+{:010}\n",
        product_name,
        total,
        SPH_HEADER_SIZE + NUM_DSD * DSD_SIZE,
        NUM_DSD,
        DSD_SIZE,
        3
    );
    let sph = format!(
        "SPH_DESCRIPTOR=\"Synthetic SPH\"\nLINE_LENGTH=+{:05}<samples>\n\
         SAMPLES_PER_TIE_PT=+004\nLINES_PER_TIE_PT=+002\n",
        WIDTH
    );

    let mut bytes = pad_block(mph, MPH_SIZE);
    bytes.extend(pad_block(sph, SPH_HEADER_SIZE));
    bytes.extend(dsd_block("Scaling GADS", 'G', gads_offset, 1, GADS_RECORD_SIZE));
    bytes.extend(dsd_block("Samples MDS", 'M', samples_offset, HEIGHT, SAMPLES_RECORD_SIZE));
    bytes.extend(pad_block(String::new(), DSD_SIZE));
    bytes.extend(dsd_block("Tie Points ADS", 'A', tie_offset, TIE_POINT_RECORDS, TIE_POINT_RECORD_SIZE));
    assert_eq!(bytes.len(), gads_offset);

    bytes.extend_from_slice(&GAIN.to_be_bytes());
    bytes.extend_from_slice(&OFFSET.to_be_bytes());
    for r in 0..HEIGHT {
        bytes.extend(samples_record(r));
    }
    for r in 0..TIE_POINT_RECORDS {
        for k in 0..3 {
            bytes.extend_from_slice(&(((r * 3 + k) * 1_000_000) as i32).to_be_bytes());
        }
    }
    assert_eq!(bytes.len(), total);
    bytes
}

pub const PRODUCT_NAME: &str = "TST_LV__1PNPDK20030515_101234_000000042016_00022_06238_0000.N1";

/// Stream access log of a [`CountingReader`]
#[derive(Debug, Default)]
pub struct AccessLog {
    pub seeks: Vec<u64>,
    pub bytes_read: usize,
}

/// In-memory source recording every seek and read
pub struct CountingReader {
    inner: Cursor<Vec<u8>>,
    log: Arc<Mutex<AccessLog>>,
}

impl CountingReader {
    pub fn new(bytes: Vec<u8>) -> (Self, Arc<Mutex<AccessLog>>) {
        let log = Arc::new(Mutex::new(AccessLog::default()));
        (
            Self {
            inner: Cursor::new(bytes),
            log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Read for CountingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.log.lock().unwrap().bytes_read += n;
        Ok(n)
    }
}

impl Seek for CountingReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let position = self.inner.seek(pos)?;
        self.log.lock().unwrap().seeks.push(position);
        Ok(position)
    }
}
