//! Shared, mutex-guarded product stream

use crate::core::record::{Field, Record};
use crate::types::{EnvisatError, EnvisatResult};
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Mutex, MutexGuard};

/// Any seekable byte source a product can be read from
pub trait DataSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> DataSource for T {}

/// A product's binary stream. Every read is a seek plus a read performed
/// under one lock, so concurrent readers interleave at record granularity.
pub struct ProductStream {
    inner: Mutex<Box<dyn DataSource>>,
}

impl std::fmt::Debug for ProductStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductStream").finish_non_exhaustive()
    }
}

impl ProductStream {
    pub fn new<S: DataSource + 'static>(source: S) -> Self {
        Self {
            inner: Mutex::new(Box::new(source)),
        }
    }

    fn lock(&self) -> EnvisatResult<MutexGuard<'_, Box<dyn DataSource>>> {
        self.inner.lock().map_err(|_| {
            EnvisatError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "product stream lock poisoned",
            ))
        })
    }

    /// Read `buf.len()` bytes at `offset`
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> EnvisatResult<()> {
        let mut source = self.lock()?;
        source.seek(SeekFrom::Start(offset))?;
        source.read_exact(buf)?;
        Ok(())
    }

    /// Fill `record` from the bytes at `offset`
    pub fn read_record_at(&self, offset: u64, record: &mut Record) -> EnvisatResult<()> {
        let mut source = self.lock()?;
        source.seek(SeekFrom::Start(offset))?;
        record.read_from(&mut **source)?;
        Ok(())
    }

    /// Fill the first `count` raw elements of `field` from the bytes at `offset`
    pub fn read_field_at(&self, offset: u64, field: &mut Field, count: usize) -> EnvisatResult<()> {
        let mut source = self.lock()?;
        source.seek(SeekFrom::Start(offset))?;
        field.read_raw_elems(&mut **source, count)
    }

    /// Total stream length in bytes
    pub fn len(&self) -> EnvisatResult<u64> {
        let mut source = self.lock()?;
        Ok(source.seek(SeekFrom::End(0))?)
    }

    pub fn is_empty(&self) -> EnvisatResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn test_positioned_reads_are_independent() {
        let stream = Arc::new(ProductStream::new(Cursor::new((0u8..=255).collect::<Vec<_>>())));
        let handles: Vec<_> = (0..4u64)
            .map(|t| {
                let stream = Arc::clone(&stream);
                std::thread::spawn(move || {
                    let mut buf = [0u8; 8];
                    for _ in 0..100 {
                        stream.read_exact_at(t * 32, &mut buf).unwrap();
                        assert_eq!(buf[0], (t * 32) as u8);
                        assert_eq!(buf[7], (t * 32 + 7) as u8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stream.len().unwrap(), 256);
    }

    #[test]
    fn test_read_past_end_is_io_error() {
        let stream = ProductStream::new(Cursor::new(vec![0u8; 10]));
        let mut buf = [0u8; 4];
        assert!(matches!(stream.read_exact_at(8, &mut buf), Err(EnvisatError::Io(_))));
    }
}
