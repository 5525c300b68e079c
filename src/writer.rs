use std::fs::File;
use std::io::{BufWriter, Read, Result, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

/// Append-only scratch stream backed by an anonymous temporary file.
///
/// The stream counts the bytes written so far, which is exactly the running
/// prefix sum the offset tables record. The backing file has no name and is
/// reclaimed by the OS once the handle drops, on success and failure alike.
pub(crate) struct ScratchStream {
    writer: BufWriter<File>,
    written: u64,
}

impl ScratchStream {
    pub(crate) fn create(dir: Option<&Path>, buffer_size: usize) -> Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(Self {
            writer: BufWriter::with_capacity(buffer_size, file),
            written: 0,
        })
    }

    /// Number of bytes appended so far.
    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    pub(crate) fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub(crate) fn append_word(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.written += std::mem::size_of::<u64>() as u64;
        Ok(())
    }

    /// Copies the whole stream into `output` through a `chunk_size` buffer.
    ///
    /// Returns the number of bytes copied.
    pub(crate) fn copy_into<W: Write>(self, output: &mut W, chunk_size: usize) -> Result<u64> {
        let mut file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.seek(SeekFrom::Start(0))?;

        let mut buffer = vec![0u8; chunk_size.max(1)];
        let mut copied = 0u64;
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n])?;
            copied += n as u64;
        }

        if copied != self.written {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "scratch stream holds {} bytes, expected {}",
                    copied, self.written
                ),
            ));
        }
        Ok(copied)
    }
}
