use std::fs::File;
use std::io::{Read, Result};
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

/// How a [`ForkMap`](crate::ForkMap) holds the bytes of its file.
///
/// Lookups behave identically in both modes. `InMemory` reads the file once
/// into a private heap buffer. `Mapped` maps it read-only, so the file is
/// never read wholesale and processes forked after opening, or opening the
/// same file independently, share the same page-cache pages. Prefer
/// `Mapped` for files too large, or too valuable to duplicate, to read into
/// every worker.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    InMemory,
    Mapped,
}

/// Read-only byte view over a forkmap file.
#[derive(Debug)]
pub enum ForkMapBytes {
    Buffer(Vec<u8>),
    Mapped(Mmap),
}

impl ForkMapBytes {
    /// Opens `path` in the requested mode.
    pub fn open(path: impl AsRef<Path>, mode: AccessMode) -> Result<Self> {
        let mut file = File::open(path)?;
        match mode {
            AccessMode::InMemory => {
                let mut buffer = Vec::with_capacity(file.metadata()?.len() as usize);
                file.read_to_end(&mut buffer)?;
                Ok(ForkMapBytes::Buffer(buffer))
            }
            AccessMode::Mapped => {
                // Zero-length mappings are rejected on some platforms.
                if file.metadata()?.len() == 0 {
                    return Ok(ForkMapBytes::Buffer(Vec::new()));
                }
                // SAFETY: forkmap files are immutable once published. The map
                // is read-only, so it can only be invalidated by an external
                // process truncating or rewriting the file.
                let mmap = unsafe { Mmap::map(&file)? };
                Ok(ForkMapBytes::Mapped(mmap))
            }
        }
    }

    pub fn access_mode(&self) -> AccessMode {
        match self {
            ForkMapBytes::Buffer(_) => AccessMode::InMemory,
            ForkMapBytes::Mapped(_) => AccessMode::Mapped,
        }
    }
}

impl Deref for ForkMapBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ForkMapBytes::Buffer(buffer) => buffer,
            ForkMapBytes::Mapped(mmap) => mmap,
        }
    }
}
