//! Local input files with transparent gzip decompression.
//!
//! The counter tracks *compressed* bytes pulled from disk, so progress can
//! be reported against the file size without knowing the decoded length.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::MultiGzDecoder;

/// Read buffer size (256 KiB)
const BUF_SIZE: usize = 256 * 1024;

/// Shared counter of raw bytes read from the input file
pub type ByteCounter = Arc<AtomicU64>;

/// Buffered, possibly decompressing reader over an input file
pub type InputReader = BufReader<Box<dyn Read + Send>>;

/// Reader wrapper that counts bytes passing through
struct CountingReader<R> {
    inner: R,
    counter: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Whether the path names a gzip member (`*.gz`)
pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Open an input file for streaming.
///
/// Returns `(reader, byte_counter, file_size)`. `.gz` files are decoded
/// with a multi-member decoder; anything else is read as-is.
pub fn open_input(path: &Path) -> io::Result<(InputReader, ByteCounter, u64)> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let counter: ByteCounter = Arc::new(AtomicU64::new(0));

    let counting = CountingReader {
        inner: file,
        counter: Arc::clone(&counter),
    };

    let inner: Box<dyn Read + Send> = if is_gzip(path) {
        Box::new(MultiGzDecoder::new(BufReader::with_capacity(
            BUF_SIZE, counting,
        )))
    } else {
        Box::new(counting)
    };

    Ok((BufReader::with_capacity(BUF_SIZE, inner), counter, file_size))
}
