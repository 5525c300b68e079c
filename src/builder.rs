use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::writer::ScratchStream;
use crate::{
    ForkMapCompression, ForkMapEncoder, ForkMapError, ForkMapInfo, HEADER_SIZE, Result,
    ZlibCompression,
};

/// Builder type for emitting forkmap files from entry streams.
///
/// The builder owns configuration such as the compression primitive, IO
/// buffering, the chunk size used when concatenating regions and the
/// directory used for temporary files. Entries are streamed one at a time:
/// keys, payloads and both offset tables go to four anonymous scratch files
/// that are stitched together once the input is exhausted, so memory use does
/// not grow with the dataset.
///
/// The compression type parameter `C` must match the one used by the
/// [`ForkMap`](crate::ForkMap) reading the file. Each builder instance is
/// consumed by a single call to [`build`](Self::build) or
/// [`build_to`](Self::build_to).
#[derive(Debug)]
pub struct ForkMapBuilder<C: ForkMapCompression = ZlibCompression> {
    compression: C,
    writer_buffer_size: usize,
    copy_chunk_size: usize,
    temp_dir: Option<PathBuf>,
}

impl<C: ForkMapCompression + Default> Default for ForkMapBuilder<C> {
    fn default() -> Self {
        Self {
            compression: C::default(),
            writer_buffer_size: 1 << 20, // 1 MiB
            copy_chunk_size: 4096,
            temp_dir: None,
        }
    }
}

impl ForkMapBuilder {
    /// Creates a new default forkmap builder with zlib compression.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        <Self as Default>::default()
    }
}

impl<C: ForkMapCompression> ForkMapBuilder<C> {
    /// Replaces the compression primitive applied to each payload.
    pub fn with_compression<D: ForkMapCompression>(self, compression: D) -> ForkMapBuilder<D> {
        ForkMapBuilder {
            compression,
            writer_buffer_size: self.writer_buffer_size,
            copy_chunk_size: self.copy_chunk_size,
            temp_dir: self.temp_dir,
        }
    }

    /// Adjusts the capacity of the buffered writers used while streaming data.
    pub fn with_writer_buffer_size(mut self, size: usize) -> Self {
        self.writer_buffer_size = size;
        self
    }

    /// Sets the chunk size used when concatenating scratch streams into the
    /// final file.
    pub fn with_copy_chunk_size(mut self, size: usize) -> Self {
        self.copy_chunk_size = size;
        self
    }

    /// Places scratch and output files in `dir` instead of the system
    /// temporary directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Consumes the builder and writes `entries` into a new temporary file.
    ///
    /// The file is kept on disk and its path returned in
    /// [`ForkMapInfo::path`]; deleting it is up to the caller. Entries are
    /// written in input order. Duplicate keys are allowed and the last one
    /// wins when the file is opened.
    ///
    /// # Errors
    ///
    /// Returns [`ForkMapError::Encoding`] if `encoder` fails for any entry
    /// and [`ForkMapError::Io`] on IO or compression failures. No file is
    /// left behind on error.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkmap::{ForkMap, ForkMapBuilder, Utf8Codec};
    ///
    /// # fn main() -> forkmap::Result<()> {
    /// let data = [("it", "works"), ("hello", "world")];
    /// let info = ForkMapBuilder::default().build(data.iter(), &Utf8Codec)?;
    /// assert_eq!(info.record_count, 2);
    ///
    /// let map = ForkMap::<Utf8Codec>::open(&info.path)?;
    /// assert_eq!(map.get("hello")?.as_deref(), Some("world"));
    /// # std::fs::remove_file(&info.path)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn build<E, P>(
        self,
        entries: impl IntoIterator<Item = E>,
        encoder: &P,
    ) -> Result<ForkMapInfo>
    where
        P: ForkMapEncoder<E>,
    {
        let output = self.create_output(self.temp_dir.as_deref())?;
        let mut info = self.write_records(output.as_file(), entries, encoder)?;
        info.path = output
            .into_temp_path()
            .keep()
            .map_err(|e| ForkMapError::Io(e.error))?;
        debug!(path = %info.path.display(), "published forkmap");
        Ok(info)
    }

    /// Like [`build`](Self::build), but publishes the file at `path`.
    ///
    /// The file is written next to `path` under a temporary name and renamed
    /// into place once complete, so readers never observe a partial file and
    /// an existing file at `path` survives a failed build.
    pub fn build_to<E, P>(
        self,
        path: impl AsRef<Path>,
        entries: impl IntoIterator<Item = E>,
        encoder: &P,
    ) -> Result<ForkMapInfo>
    where
        P: ForkMapEncoder<E>,
    {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let output = self.create_output(Some(dir))?;
        let mut info = self.write_records(output.as_file(), entries, encoder)?;
        output
            .persist(path)
            .map_err(|e| ForkMapError::Io(e.error))?;
        info.path = path.to_path_buf();
        debug!(path = %info.path.display(), "published forkmap");
        Ok(info)
    }

    fn create_output(&self, dir: Option<&Path>) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("forkmap-").suffix(".forkmap");
        let output = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(output)
    }

    fn write_records<E, P>(
        &self,
        output: &File,
        entries: impl IntoIterator<Item = E>,
        encoder: &P,
    ) -> Result<ForkMapInfo>
    where
        P: ForkMapEncoder<E>,
    {
        let dir = self.temp_dir.as_deref();
        let mut key_offsets = ScratchStream::create(dir, self.writer_buffer_size)?;
        let mut keys = ScratchStream::create(dir, self.writer_buffer_size)?;
        let mut value_offsets = ScratchStream::create(dir, self.writer_buffer_size)?;
        let mut values = ScratchStream::create(dir, self.writer_buffer_size)?;

        let mut record_count: u64 = 0;
        let mut raw_value_bytes: u64 = 0;
        for entry in entries {
            let index = record_count;
            // offsets point at the start of the record about to be written.
            key_offsets.append_word(keys.written())?;
            value_offsets.append_word(values.written())?;

            let key = encoder
                .key(&entry)
                .map_err(|source| ForkMapError::Encoding { index, source })?;
            let payload = encoder
                .encode(&entry)
                .map_err(|source| ForkMapError::Encoding { index, source })?;

            values.append(&self.compression.compress(&payload)?)?;
            keys.append(key.as_bytes())?;
            raw_value_bytes += payload.len() as u64;
            record_count += 1;
        }
        key_offsets.append_word(keys.written())?;
        value_offsets.append_word(values.written())?;

        let key_bytes = keys.written();
        let compressed_value_bytes = values.written();

        let mut writer = BufWriter::with_capacity(self.writer_buffer_size, output);
        writer.write_u64::<LittleEndian>(record_count)?;
        let mut file_length = HEADER_SIZE;
        for stream in [key_offsets, keys, value_offsets, values] {
            file_length += stream.copy_into(&mut writer, self.copy_chunk_size)?;
        }
        writer.flush()?;
        drop(writer);
        output.sync_all()?;

        let info = ForkMapInfo {
            path: PathBuf::new(),
            file_length,
            record_count,
            key_bytes,
            raw_value_bytes,
            compressed_value_bytes,
        };
        debug_assert_eq!(info.layout().file_length(), file_length);
        debug!(
            record_count,
            file_length, raw_value_bytes, compressed_value_bytes, "built forkmap"
        );
        Ok(info)
    }
}
