use std::path::PathBuf;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::{ForkMapError, Result};

/// Width of every integer stored in a forkmap file.
pub const WORD_SIZE: u64 = std::mem::size_of::<u64>() as u64;

/// Size of the header holding the record count.
pub const HEADER_SIZE: u64 = WORD_SIZE;

/// Region arithmetic of a forkmap file.
///
/// A file is laid out as five contiguous regions, every integer being a
/// little-endian `u64`:
///
/// ```text
/// [record_count]
/// [key offsets:   (record_count + 1) words]
/// [key blob:      key_bytes]
/// [value offsets: (record_count + 1) words]
/// [value blob:    value_bytes]
/// ```
///
/// Only `record_count` is stored explicitly; `key_bytes` and `value_bytes` are
/// the closing entries of the two offset tables. Every region start is derived
/// from these three numbers.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForkMapLayout {
    /// Number of records written, including shadowed duplicates.
    pub record_count: u64,
    /// Total length of the concatenated raw keys.
    pub key_bytes: u64,
    /// Total length of the concatenated compressed payloads.
    pub value_bytes: u64,
}

impl ForkMapLayout {
    /// Reads and validates the layout of `data`.
    ///
    /// Checks that the header and both offset tables fit, that each table
    /// starts at zero, and that the file length matches the layout exactly.
    /// Individual table entries are checked while the index is built.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let len = data.len() as u64;
        let record_count = read_word(data, 0)?;
        let table_size = Self::table_size(record_count)?;

        let keys_start = table_size
            .checked_add(HEADER_SIZE)
            .ok_or_else(|| overflow(record_count))?;
        if len < keys_start {
            return Err(ForkMapError::format(format!(
                "file has {} bytes, key offset table for {} records needs {}",
                len, record_count, keys_start
            )));
        }
        if read_word(data, HEADER_SIZE)? != 0 {
            return Err(ForkMapError::format("key offset table must start at 0"));
        }
        let key_bytes = read_word(data, keys_start - WORD_SIZE)?;

        let value_offsets_start = keys_start
            .checked_add(key_bytes)
            .ok_or_else(|| overflow(record_count))?;
        let values_start = value_offsets_start
            .checked_add(table_size)
            .ok_or_else(|| overflow(record_count))?;
        if len < values_start {
            return Err(ForkMapError::format(format!(
                "file has {} bytes, value offset table ends at {}",
                len, values_start
            )));
        }
        if read_word(data, value_offsets_start)? != 0 {
            return Err(ForkMapError::format("value offset table must start at 0"));
        }
        let value_bytes = read_word(data, values_start - WORD_SIZE)?;

        let layout = ForkMapLayout {
            record_count,
            key_bytes,
            value_bytes,
        };
        let expected = values_start
            .checked_add(value_bytes)
            .ok_or_else(|| overflow(record_count))?;
        if expected != len {
            return Err(ForkMapError::format(format!(
                "file has {} bytes, layout requires {}",
                len, expected
            )));
        }
        Ok(layout)
    }

    fn table_size(record_count: u64) -> Result<u64> {
        record_count
            .checked_add(1)
            .and_then(|n| n.checked_mul(WORD_SIZE))
            .ok_or_else(|| overflow(record_count))
    }

    /// Byte length of one offset table.
    ///
    /// This and the region starts below saturate at `u64::MAX`. Layouts
    /// returned by [`parse`](Self::parse) never reach it.
    pub fn offset_table_size(&self) -> u64 {
        self.record_count
            .saturating_add(1)
            .saturating_mul(WORD_SIZE)
    }

    pub fn key_offsets_start(&self) -> u64 {
        HEADER_SIZE
    }

    pub fn keys_start(&self) -> u64 {
        self.key_offsets_start()
            .saturating_add(self.offset_table_size())
    }

    pub fn value_offsets_start(&self) -> u64 {
        self.keys_start().saturating_add(self.key_bytes)
    }

    pub fn values_start(&self) -> u64 {
        self.value_offsets_start()
            .saturating_add(self.offset_table_size())
    }

    /// Exact length of a file with this layout.
    pub fn file_length(&self) -> u64 {
        self.values_start().saturating_add(self.value_bytes)
    }

    /// Reads entry `index` of the key offset table.
    ///
    /// Valid indices are `0..=record_count`; anything past the closing entry
    /// is a format error.
    pub fn key_offset(&self, data: &[u8], index: u64) -> Result<u64> {
        self.table_entry(data, self.key_offsets_start(), index)
    }

    /// Reads entry `index` of the value offset table.
    pub fn value_offset(&self, data: &[u8], index: u64) -> Result<u64> {
        self.table_entry(data, self.value_offsets_start(), index)
    }

    fn table_entry(&self, data: &[u8], table_start: u64, index: u64) -> Result<u64> {
        if index > self.record_count {
            return Err(ForkMapError::format(format!(
                "offset table index {} past closing entry {}",
                index, self.record_count
            )));
        }
        let position = index
            .checked_mul(WORD_SIZE)
            .and_then(|offset| offset.checked_add(table_start))
            .ok_or_else(|| overflow(self.record_count))?;
        read_word(data, position)
    }
}

/// Reads the little-endian word at `position`.
pub(crate) fn read_word(data: &[u8], position: u64) -> Result<u64> {
    let start = usize::try_from(position)
        .map_err(|_| ForkMapError::format(format!("offset {} out of range", position)))?;
    data.get(start..)
        .and_then(|tail| tail.get(..WORD_SIZE as usize))
        .map(LittleEndian::read_u64)
        .ok_or_else(|| {
            ForkMapError::format(format!(
                "unexpected end of file reading word at offset {}",
                position
            ))
        })
}

fn overflow(record_count: u64) -> ForkMapError {
    ForkMapError::format(format!(
        "layout for {} records overflows a 64-bit offset",
        record_count
    ))
}

/// Summary returned by [`ForkMapBuilder::build`](crate::ForkMapBuilder::build).
#[derive(Debug, Serialize, Default, Clone, PartialEq, Eq)]
pub struct ForkMapInfo {
    /// Location of the published file.
    pub path: PathBuf,
    /// Final size of the file in bytes.
    pub file_length: u64,
    /// Number of records written, including duplicates.
    pub record_count: u64,
    /// Total length of all keys.
    pub key_bytes: u64,
    /// Total length of all payloads before compression.
    pub raw_value_bytes: u64,
    /// Total length of all payloads after compression.
    pub compressed_value_bytes: u64,
}

impl ForkMapInfo {
    pub fn layout(&self) -> ForkMapLayout {
        ForkMapLayout {
            record_count: self.record_count,
            key_bytes: self.key_bytes,
            value_bytes: self.compressed_value_bytes,
        }
    }
}
