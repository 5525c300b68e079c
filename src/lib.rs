//! Read-only, compressed, string-keyed lookup tables persisted to flat files.
//!
//! The `forkmap` crate builds immutable maps into a single file and serves
//! point lookups from it. It targets servers that load a large table once and
//! then fork worker processes: instead of every worker ending up with its own
//! copy of an in-process map, each opens the file through a read-only memory
//! map and all of them share the same page-cache pages. Nothing is ever
//! written to those pages, so copy-on-write never kicks in.
//!
//! Every payload is compressed on its own, so a lookup decompresses exactly
//! one record. Keys are held in an in-memory index built when the file is
//! opened.
//!
//! Typical usage streams entries through a [`ForkMapBuilder`] and opens the
//! resulting file with [`ForkMap`] in each worker.
//!
//! ```
//! use forkmap::{AccessMode, ForkMap, ForkMapBuilder, Utf8Codec};
//!
//! # fn main() -> forkmap::Result<()> {
//! let entries = [("foo", "aaa"), ("bar", "bbbb"), ("baz", "ccccc")];
//! let info = ForkMapBuilder::default().build(entries.iter(), &Utf8Codec)?;
//!
//! let map = ForkMap::open_with(&info.path, AccessMode::Mapped, Utf8Codec)?;
//! assert_eq!(map.get("bar")?.as_deref(), Some("bbbb"));
//! assert_eq!(map.get("missing")?, None);
//! # std::fs::remove_file(&info.path)?;
//! # Ok(())
//! # }
//! ```
mod error;
pub use error::{ForkMapError, Result};

mod codec;
pub use codec::{
    CodecError, FnDecoder, FnEncoder, ForkMapDecoder, ForkMapEncoder, JsonCodec,
    MessagePackCodec, Utf8Codec,
};

mod compression;
pub use compression::{ForkMapCompression, ZlibCompression};

mod layout;
pub use layout::{ForkMapInfo, ForkMapLayout, HEADER_SIZE, WORD_SIZE};

mod reader;
pub use reader::{AccessMode, ForkMapBytes};

mod writer;

mod forkmap;
pub use forkmap::{ForkMap, ForkMapIter};

mod builder;
pub use builder::ForkMapBuilder;
