use std::collections::HashMap;
use std::collections::hash_map;
use std::ops::Range;
use std::path::Path;

use foldhash::fast::RandomState;
use tracing::{debug, trace, warn};

use crate::{
    AccessMode, ForkMapBytes, ForkMapCompression, ForkMapDecoder, ForkMapError, ForkMapLayout,
    Result, Utf8Codec, ZlibCompression,
};

/// Key to absolute byte range of the compressed payload in the backing view.
type PlainIndex = HashMap<String, Range<usize>, RandomState>;

/// Immutable string-keyed map backed by a forkmap file.
///
/// Opening a file reads its header and offset tables once and builds an
/// in-memory index from every key to the byte range of its compressed
/// payload. A lookup then touches exactly one record: the range is sliced
/// out of the backing view, decompressed and handed to the decoder.
///
/// The backing view is either a private buffer or a read-only memory map, as
/// selected by [`AccessMode`]. With a map, every process that opens the file
/// (or inherits an opened `ForkMap` across `fork`) reads the same page-cache
/// pages, and since nothing is ever written to them they are never copied.
///
/// # Type Parameters
/// - `D`: decoder turning decompressed payloads into values.
/// - `C`: compression primitive; must match the one the file was built with.
pub struct ForkMap<D: ForkMapDecoder = Utf8Codec, C: ForkMapCompression = ZlibCompression> {
    layout: ForkMapLayout,
    index: PlainIndex,
    bytes: ForkMapBytes,
    decoder: D,
    compression: C,
}

impl<D: ForkMapDecoder> ForkMap<D> {
    /// Reads `path` into memory and decodes values with the default decoder.
    pub fn open(path: impl AsRef<Path>) -> Result<Self>
    where
        D: Default,
    {
        Self::open_with(path, AccessMode::InMemory, D::default())
    }

    /// Opens `path` in the given access mode with a custom decoder.
    ///
    /// # Errors
    ///
    /// Returns [`ForkMapError::Format`] when the header or offset tables are
    /// truncated or inconsistent, or when the file length does not match
    /// them; IO failures are forwarded as [`ForkMapError::Io`].
    ///
    /// # Examples
    ///
    /// ```
    /// use forkmap::{AccessMode, ForkMap, ForkMapBuilder, Utf8Codec};
    ///
    /// # fn main() -> forkmap::Result<()> {
    /// let entries = [("apple", "red"), ("banana", "yellow")];
    /// let info = ForkMapBuilder::default().build(entries.iter(), &Utf8Codec)?;
    ///
    /// let map = ForkMap::open_with(&info.path, AccessMode::Mapped, Utf8Codec)?;
    /// assert_eq!(map.get("banana")?.as_deref(), Some("yellow"));
    /// assert_eq!(map.get("cherry")?, None);
    /// # std::fs::remove_file(&info.path)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_with(path: impl AsRef<Path>, mode: AccessMode, decoder: D) -> Result<Self> {
        Self::open_with_compression(path, mode, decoder, ZlibCompression::default())
    }
}

impl<D: ForkMapDecoder, C: ForkMapCompression> ForkMap<D, C> {
    /// Opens `path` with an explicit compression primitive.
    pub fn open_with_compression(
        path: impl AsRef<Path>,
        mode: AccessMode,
        decoder: D,
        compression: C,
    ) -> Result<Self> {
        let path = path.as_ref();
        let bytes = ForkMapBytes::open(path, mode)?;
        let map = Self::from_bytes(bytes, decoder, compression)?;
        debug!(
            path = %path.display(),
            mode = ?mode,
            record_count = map.layout.record_count,
            keys = map.index.len(),
            "opened forkmap"
        );
        Ok(map)
    }

    /// Builds a map over an already loaded byte view.
    pub fn from_bytes(bytes: ForkMapBytes, decoder: D, compression: C) -> Result<Self> {
        let layout = ForkMapLayout::parse(&bytes)?;
        let index = build_index(&bytes, &layout)?;
        Ok(ForkMap {
            layout,
            index,
            bytes,
            decoder,
            compression,
        })
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of records in the file, including shadowed duplicates.
    pub fn record_count(&self) -> u64 {
        self.layout.record_count
    }

    pub fn layout(&self) -> &ForkMapLayout {
        &self.layout
    }

    pub fn access_mode(&self) -> AccessMode {
        self.bytes.access_mode()
    }

    pub fn file_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates over the distinct keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Returns the compressed payload stored for `key` without decoding it.
    pub fn get_raw(&self, key: &str) -> Option<&[u8]> {
        self.index.get(key).map(|range| &self.bytes[range.clone()])
    }

    /// Looks up and decodes the value for `key`.
    ///
    /// A missing key yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ForkMapError::Decode`] if the stored payload fails to
    /// decompress or decode, so corruption is never mistaken for absence.
    pub fn get(&self, key: &str) -> Result<Option<D::Value>> {
        match self.index.get(key) {
            Some(range) => {
                trace!(key, bytes = range.len(), "forkmap hit");
                self.decode_range(key, range.clone()).map(Some)
            }
            None => {
                trace!(key, "forkmap miss");
                Ok(None)
            }
        }
    }

    /// Like [`get`](Self::get), but returns `default` when `key` is absent.
    pub fn get_or(&self, key: &str, default: D::Value) -> Result<D::Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Lenient lookup treating undecodable values like missing ones.
    ///
    /// Decode failures are logged at `warn` level and reported as `None`.
    pub fn get_lossy(&self, key: &str) -> Option<D::Value> {
        match self.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "dropping undecodable forkmap value");
                None
            }
        }
    }

    /// Performs multiple lookups, preserving the order of `keys`.
    ///
    /// # Errors
    ///
    /// Fails on the first value that cannot be decoded.
    pub fn batch_get<Q: AsRef<str>>(
        &self,
        keys: impl IntoIterator<Item = Q>,
    ) -> Result<Vec<Option<D::Value>>> {
        keys.into_iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// Creates an iterator over every distinct key and its decoded value.
    ///
    /// Order is unspecified. Each value is decoded when it is yielded.
    pub fn iter(&self) -> ForkMapIter<'_, D, C> {
        ForkMapIter {
            map: self,
            inner: self.index.iter(),
        }
    }

    fn decode_range(&self, key: &str, range: Range<usize>) -> Result<D::Value> {
        let data = self
            .compression
            .decompress(&self.bytes[range])
            .map_err(|e| ForkMapError::Decode {
                key: key.to_string(),
                source: Box::new(e),
            })?;
        self.decoder
            .decode(&data)
            .map_err(|source| ForkMapError::Decode {
                key: key.to_string(),
                source,
            })
    }
}

impl<D: ForkMapDecoder, C: ForkMapCompression> std::fmt::Debug for ForkMap<D, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkMap")
            .field("layout", &self.layout)
            .field("access_mode", &self.access_mode())
            .field("keys", &self.index.len())
            .finish()
    }
}

fn build_index(data: &[u8], layout: &ForkMapLayout) -> Result<PlainIndex> {
    let keys_start = layout.keys_start() as usize;
    let values_start = layout.values_start() as usize;

    let mut index = PlainIndex::with_capacity_and_hasher(
        layout.record_count as usize,
        RandomState::default(),
    );
    let mut key_begin = 0u64;
    let mut value_begin = 0u64;
    for i in 0..layout.record_count {
        let key_end = layout.key_offset(data, i + 1)?;
        if key_end < key_begin || key_end > layout.key_bytes {
            return Err(ForkMapError::format(format!(
                "key offset {} of record {} is out of order",
                key_end, i
            )));
        }
        let value_end = layout.value_offset(data, i + 1)?;
        if value_end < value_begin || value_end > layout.value_bytes {
            return Err(ForkMapError::format(format!(
                "value offset {} of record {} is out of order",
                value_end, i
            )));
        }

        let key = &data[keys_start + key_begin as usize..keys_start + key_end as usize];
        let key = std::str::from_utf8(key).map_err(|e| {
            ForkMapError::format(format!("key of record {} is not UTF-8: {}", i, e))
        })?;
        index.insert(
            key.to_string(),
            values_start + value_begin as usize..values_start + value_end as usize,
        );

        key_begin = key_end;
        value_begin = value_end;
    }
    Ok(index)
}

/// Iterator over all entries in a [`ForkMap`].
pub struct ForkMapIter<'a, D: ForkMapDecoder, C: ForkMapCompression> {
    map: &'a ForkMap<D, C>,
    inner: hash_map::Iter<'a, String, Range<usize>>,
}

impl<'a, D: ForkMapDecoder, C: ForkMapCompression> Iterator for ForkMapIter<'a, D, C> {
    type Item = Result<(&'a str, D::Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, range) = self.inner.next()?;
        Some(
            self.map
                .decode_range(key, range.clone())
                .map(|value| (key.as_str(), value)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    use rand::Rng;
    use rand::distr::Alphanumeric;
    use serde::{Deserialize, Serialize};

    use crate::*;

    const MODES: [AccessMode; 2] = [AccessMode::InMemory, AccessMode::Mapped];

    fn build_simple(dir: &Path) -> ForkMapInfo {
        let entries = [("foo", "aaa"), ("bar", "bbbb"), ("baz", "ccccc")];
        ForkMapBuilder::default()
            .with_temp_dir(dir)
            .build(entries.iter(), &Utf8Codec)
            .unwrap()
    }

    fn random_text(len: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    #[test]
    fn test_basic() {
        let dir = tempfile::tempdir().unwrap();
        let info = build_simple(dir.path());

        for mode in MODES {
            let map = ForkMap::open_with(&info.path, mode, Utf8Codec).unwrap();
            assert_eq!(map.access_mode(), mode);
            assert_eq!(map.len(), 3);
            assert_eq!(map.record_count(), 3);
            assert_eq!(map.file_length(), info.file_length);
            assert_eq!(map.layout(), &info.layout());
            assert_eq!(map.get("foo").unwrap().as_deref(), Some("aaa"));
            assert_eq!(map.get("bar").unwrap().as_deref(), Some("bbbb"));
            assert_eq!(map.get("baz").unwrap().as_deref(), Some("ccccc"));
            assert_eq!(map.get("missing").unwrap(), None);
            assert_eq!(map.get("").unwrap(), None);
            assert!(map.contains_key("foo"));
            assert!(!map.contains_key("fo"));
            assert_eq!(map.get_or("missing", "zzz".into()).unwrap(), "zzz");
            assert_eq!(map.get_or("foo", "zzz".into()).unwrap(), "aaa");
            assert_eq!(map.get_lossy("bar").as_deref(), Some("bbbb"));
            assert_eq!(map.get_lossy("missing"), None);

            let results = map.batch_get(["baz", "nope", "foo"]).unwrap();
            assert_eq!(
                results,
                vec![Some("ccccc".to_string()), None, Some("aaa".to_string())]
            );

            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            assert_eq!(keys, vec!["bar", "baz", "foo"]);

            let mut all: Vec<_> = map.iter().collect::<Result<Vec<_>>>().unwrap();
            all.sort();
            assert_eq!(
                all,
                vec![
                    ("bar", "bbbb".to_string()),
                    ("baz", "ccccc".to_string()),
                    ("foo", "aaa".to_string()),
                ]
            );
        }

        let map = ForkMap::<Utf8Codec>::open(&info.path).unwrap();
        assert_eq!(map.access_mode(), AccessMode::InMemory);
        assert_eq!(map.get("bar").unwrap().as_deref(), Some("bbbb"));
    }

    #[test]
    fn test_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(Vec::<(&str, &str)>::new(), &Utf8Codec)
            .unwrap();

        for mode in MODES {
            let map = ForkMap::open_with(&info.path, mode, Utf8Codec).unwrap();
            assert!(map.is_empty());
            assert_eq!(map.get("anything").unwrap(), None);
            assert_eq!(map.iter().count(), 0);
        }
    }

    #[test]
    fn test_duplicate_keys() {
        let dir = tempfile::tempdir().unwrap();
        let entries = [("k", "a"), ("other", "x"), ("k", "b")];
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(entries.iter(), &Utf8Codec)
            .unwrap();

        let map = ForkMap::<Utf8Codec>::open(&info.path).unwrap();
        assert_eq!(map.record_count(), 3);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("k").unwrap().as_deref(), Some("b"));
        assert_eq!(map.get("other").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_random_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        const N: usize = 10_000;
        let entries: BTreeMap<String, String> = (0..N)
            .map(|i| {
                let len = rand::random_range(0..64);
                (format!("key-{i}"), random_text(len))
            })
            .collect();

        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .with_writer_buffer_size(4096)
            .build(entries.iter(), &Utf8Codec)
            .unwrap();
        assert_eq!(info.record_count, N as u64);

        for mode in MODES {
            let map = ForkMap::open_with(&info.path, mode, Utf8Codec).unwrap();
            assert_eq!(map.len(), N);
            for _ in 0..100 {
                let i = rand::random_range(0..N);
                let key = format!("key-{i}");
                assert_eq!(map.get(&key).unwrap().as_ref(), entries.get(&key));
                assert_eq!(map.get(&format!("key-{}", i + N)).unwrap(), None);
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Document {
        title: String,
        body: String,
        sections: BTreeMap<String, Vec<String>>,
        score: Option<f64>,
    }

    fn documents() -> Vec<(String, Document)> {
        (0..20)
            .map(|i| {
                let sections = [
                    ("intro".to_string(), vec![format!("hello {i}")]),
                    ("notes".to_string(), vec!["ünïcödé".to_string(), String::new()]),
                ]
                .into_iter()
                .collect();
                let doc = Document {
                    title: format!("doc {i}"),
                    body: random_text(1000 + i * 100),
                    sections,
                    score: (i % 2 == 0).then_some(i as f64 / 2.0),
                };
                (format!("doc/{i}"), doc)
            })
            .collect()
    }

    #[test]
    fn test_custom_codecs() {
        let dir = tempfile::tempdir().unwrap();
        let docs = documents();

        let json = JsonCodec::<Document>::new();
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(docs.iter(), &json)
            .unwrap();
        for mode in MODES {
            let map = ForkMap::open_with(&info.path, mode, json.clone()).unwrap();
            for (key, doc) in &docs {
                assert_eq!(map.get(key).unwrap().as_ref(), Some(doc));
            }
            assert_eq!(map.get("doc/missing").unwrap(), None);
        }

        let msgpack = MessagePackCodec::<Document>::new().with_field_names(true);
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .with_compression(ZlibCompression::new(9))
            .build(docs.iter(), &msgpack)
            .unwrap();
        let map = ForkMap::open_with(&info.path, AccessMode::Mapped, msgpack).unwrap();
        for (key, doc) in &docs {
            assert_eq!(map.get(key).unwrap().as_ref(), Some(doc));
        }

        let encoder = FnEncoder::new(
            |entry: &(u32, Vec<u32>)| Ok(format!("id-{}", entry.0)),
            |entry| Ok(entry.1.iter().flat_map(|v| v.to_le_bytes()).collect()),
        );
        let decoder = FnDecoder::new(|data: &[u8]| {
            Ok(data
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect::<Vec<u32>>())
        });
        let entries: Vec<(u32, Vec<u32>)> = (0..50).map(|i| (i, (0..i).collect())).collect();
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(entries.clone(), &encoder)
            .unwrap();
        let map = ForkMap::open_with(&info.path, AccessMode::InMemory, decoder).unwrap();
        for (id, values) in &entries {
            assert_eq!(map.get(&format!("id-{id}")).unwrap().as_ref(), Some(values));
        }
    }

    #[test]
    fn test_large_payload_independence() {
        let dir = tempfile::tempdir().unwrap();
        let big = random_text(4 << 20);
        let entries = vec![
            ("small-1", "a".to_string()),
            ("big", big.clone()),
            ("small-2", "b".to_string()),
        ];
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(entries.iter(), &Utf8Codec)
            .unwrap();

        let data = std::fs::read(&info.path).unwrap();
        let layout = ForkMapLayout::parse(&data).unwrap();
        let big_start = layout.values_start() + layout.value_offset(&data, 1).unwrap();
        let big_end = layout.values_start() + layout.value_offset(&data, 2).unwrap();

        {
            let map = ForkMap::<Utf8Codec>::open(&info.path).unwrap();
            assert_eq!(map.get_raw("big").unwrap().len() as u64, big_end - big_start);
            assert!(map.get_raw("small-1").unwrap().len() < 64);
            assert_eq!(map.get("big").unwrap(), Some(big));
        }

        // wreck the large payload; its neighbours must stay readable.
        let mut corrupted = data.clone();
        corrupted[big_start as usize..big_start as usize + 2].copy_from_slice(b"!!");
        std::fs::write(&info.path, &corrupted).unwrap();

        for mode in MODES {
            let map = ForkMap::open_with(&info.path, mode, Utf8Codec).unwrap();
            assert_eq!(map.get("small-1").unwrap().as_deref(), Some("a"));
            assert_eq!(map.get("small-2").unwrap().as_deref(), Some("b"));
            match map.get("big").unwrap_err() {
                ForkMapError::Decode { key, .. } => assert_eq!(key, "big"),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(map.get_lossy("big"), None);
            map.get_or("big", String::new()).unwrap_err();
            map.batch_get(["small-1", "big"]).unwrap_err();
            assert!(map.iter().any(|item| item.is_err()));
        }
    }

    #[test]
    fn test_undecodable_value() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = FnEncoder::new(
            |entry: &(&'static str, Vec<u8>)| Ok(entry.0.to_string()),
            |entry| Ok(entry.1.clone()),
        );
        let entries = vec![("text", b"plain".to_vec()), ("binary", vec![0xff, 0xfe])];
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(entries, &encoder)
            .unwrap();

        let map = ForkMap::<Utf8Codec>::open(&info.path).unwrap();
        assert_eq!(map.get("text").unwrap().as_deref(), Some("plain"));
        assert!(matches!(
            map.get("binary"),
            Err(ForkMapError::Decode { .. })
        ));
        assert_eq!(map.get_lossy("binary"), None);
        assert_eq!(map.get_raw("binary").map(|raw| raw.is_empty()), Some(false));
    }

    #[test]
    fn test_truncated_files() {
        let dir = tempfile::tempdir().unwrap();
        let info = build_simple(dir.path());
        let data = std::fs::read(&info.path).unwrap();
        let layout = info.layout();
        let path = dir.path().join("truncated.forkmap");

        let mut cuts = vec![
            0,
            1,
            7,
            8,
            15,
            layout.keys_start() - 1,
            layout.keys_start(),
            layout.value_offsets_start() - 1,
            layout.value_offsets_start() + 4,
            layout.values_start() - 1,
            layout.values_start(),
            layout.file_length() - 1,
        ];
        cuts.extend(8..layout.keys_start());
        for cut in cuts {
            std::fs::write(&path, &data[..cut as usize]).unwrap();
            for mode in MODES {
                let err = ForkMap::open_with(&path, mode, Utf8Codec).unwrap_err();
                assert!(err.is_format(), "cut at {cut}: {err}");
            }
        }

        let mut padded = data.clone();
        padded.extend_from_slice(b"tail");
        std::fs::write(&path, &padded).unwrap();
        assert!(ForkMap::<Utf8Codec>::open(&path).unwrap_err().is_format());

        assert!(matches!(
            ForkMap::<Utf8Codec>::open(dir.path().join("missing.forkmap")),
            Err(ForkMapError::Io(_))
        ));
    }

    fn raw_file(words_before: &[u64], keys: &[u8], words_after: &[u64]) -> Vec<u8> {
        let mut data = Vec::new();
        for word in words_before {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data.extend_from_slice(keys);
        for word in words_after {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_inconsistent_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invalid.forkmap");

        // key offsets run backwards.
        let data = raw_file(&[2, 0, 5, 3], b"abc", &[0, 0, 0]);
        std::fs::write(&path, &data).unwrap();
        assert!(ForkMap::<Utf8Codec>::open(&path).unwrap_err().is_format());

        // value offsets run backwards.
        let mut data = raw_file(&[2, 0, 1, 2], b"ab", &[0, 4, 2]);
        data.extend_from_slice(b"zz");
        std::fs::write(&path, &data).unwrap();
        assert!(ForkMap::<Utf8Codec>::open(&path).unwrap_err().is_format());

        // key bytes are not UTF-8.
        let data = raw_file(&[1, 0, 1], &[0xff], &[0, 0]);
        std::fs::write(&path, &data).unwrap();
        assert!(ForkMap::<Utf8Codec>::open(&path).unwrap_err().is_format());

        // well-formed tables with an empty payload open fine; the payload
        // itself is only checked on lookup.
        let data = raw_file(&[1, 0, 1], b"k", &[0, 0]);
        std::fs::write(&path, &data).unwrap();
        let map = ForkMap::<Utf8Codec>::open(&path).unwrap();
        assert_eq!(map.get_raw("k"), Some(&[][..]));
        map.get("k").unwrap_err();
    }

    #[test]
    fn test_shared_between_threads() {
        let dir = tempfile::tempdir().unwrap();
        const N: u64 = 10_000;
        const P: u64 = 8;
        let entries = (0..N).map(|i| (i.to_string(), (i * 2).to_string()));
        let info = ForkMapBuilder::default()
            .with_temp_dir(dir.path())
            .build(entries, &Utf8Codec)
            .unwrap();

        let map = Arc::new(ForkMap::open_with(&info.path, AccessMode::Mapped, Utf8Codec).unwrap());
        let mut threads = Vec::with_capacity(P as usize);
        for i in 0..P {
            const CHUNK: u64 = N / P;
            let range = CHUNK * i..CHUNK * (i + 1);
            let map = map.clone();
            threads.push(std::thread::spawn(move || {
                for v in range {
                    let value = map.get(&v.to_string()).unwrap().unwrap();
                    assert_eq!(value, (v * 2).to_string());
                }
            }));
        }

        for thread in threads {
            thread.join().unwrap();
        }

        // independent readers over the same file agree with each other.
        let other = ForkMap::open_with(&info.path, AccessMode::InMemory, Utf8Codec).unwrap();
        assert_eq!(other.get("42").unwrap(), map.get("42").unwrap());
    }

    #[derive(Clone, Default)]
    struct LogSink(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_lookup_tracing() {
        let dir = tempfile::tempdir().unwrap();
        let info = build_simple(dir.path());
        let map: ForkMap = ForkMap::open(&info.path).unwrap();

        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(map.get("foo").unwrap().unwrap(), "aaa");
            assert_eq!(map.get("qux").unwrap(), None);
        });

        let logs = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        let hit = logs
            .lines()
            .find(|line| line.contains("forkmap hit"))
            .unwrap();
        assert!(hit.contains("foo"), "{hit}");
        let miss = logs
            .lines()
            .find(|line| line.contains("forkmap miss"))
            .unwrap();
        assert!(miss.contains("qux"), "{miss}");
    }
}
