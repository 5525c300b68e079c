use std::io::{Error, ErrorKind, Result, Write};

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

/// Compression primitive applied to every record payload independently.
///
/// The builder and the reader must agree on the implementation; the file
/// itself does not record which one was used.
pub trait ForkMapCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// zlib streams produced by `flate2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibCompression {
    level: u32,
}

impl ZlibCompression {
    /// Creates a zlib compressor with the given level, clamped to `0..=9`.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for ZlibCompression {
    fn default() -> Self {
        Self::new(6)
    }
}

impl ForkMapCompression for ZlibCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(
            Vec::with_capacity(data.len() / 2 + 16),
            Compression::new(self.level),
        );
        encoder.write_all(data)?;
        encoder.finish()
    }

    /// Inflates one complete zlib stream.
    ///
    /// A stream that ends before its trailer is an error, not a short read.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut inflater = Decompress::new(true);
        let mut output = Vec::with_capacity(data.len() * 2 + 64);
        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity());
            }
            let consumed = inflater.total_in();
            let produced = inflater.total_out();
            let status = inflater.decompress_vec(
                &data[consumed as usize..],
                &mut output,
                FlushDecompress::None,
            )?;
            if status == Status::StreamEnd {
                return Ok(output);
            }
            let stalled = inflater.total_in() == consumed && inflater.total_out() == produced;
            if stalled && output.len() < output.capacity() {
                return Err(Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("zlib stream truncated after {} bytes", consumed),
                ));
            }
        }
    }
}
