//! Record codecs: how entries become keys and payloads, and how payloads
//! become values again.
//!
//! An encoder runs on the build side and a decoder on the read side. For a
//! given file the decoder must invert the encoder; the compression layer sits
//! between them and is transparent to both.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type returned by codec strategies.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Extracts the key and the uncompressed payload from an entry of type `E`.
pub trait ForkMapEncoder<E> {
    fn key(&self, entry: &E) -> Result<String, CodecError>;

    fn encode(&self, entry: &E) -> Result<Vec<u8>, CodecError>;
}

/// Turns a decompressed payload back into a value.
pub trait ForkMapDecoder {
    type Value;

    fn decode(&self, data: &[u8]) -> Result<Self::Value, CodecError>;
}

/// Default codec for `(key, text)` pairs.
///
/// The first element is the key and the second is stored as UTF-8. Decoding
/// yields a `String`; payloads that are not valid UTF-8 fail to decode.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Codec;

impl<K: AsRef<str>, V: AsRef<str>> ForkMapEncoder<(K, V)> for Utf8Codec {
    fn key(&self, entry: &(K, V)) -> Result<String, CodecError> {
        Ok(entry.0.as_ref().to_string())
    }

    fn encode(&self, entry: &(K, V)) -> Result<Vec<u8>, CodecError> {
        Ok(entry.1.as_ref().as_bytes().to_vec())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> ForkMapEncoder<&(K, V)> for Utf8Codec {
    fn key(&self, entry: &&(K, V)) -> Result<String, CodecError> {
        <Self as ForkMapEncoder<(K, V)>>::key(self, entry)
    }

    fn encode(&self, entry: &&(K, V)) -> Result<Vec<u8>, CodecError> {
        <Self as ForkMapEncoder<(K, V)>>::encode(self, entry)
    }
}

impl ForkMapDecoder for Utf8Codec {
    type Value = String;

    fn decode(&self, data: &[u8]) -> Result<String, CodecError> {
        Ok(std::str::from_utf8(data)?.to_string())
    }
}

/// Stores `(key, value)` pairs with the value serialized as JSON.
///
/// Encoding accepts any `Serialize` value; decoding produces `T`.
#[derive(Debug)]
pub struct JsonCodec<T> {
    phantom: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            phantom: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T, K: AsRef<str>, U: Serialize> ForkMapEncoder<(K, U)> for JsonCodec<T> {
    fn key(&self, entry: &(K, U)) -> Result<String, CodecError> {
        Ok(entry.0.as_ref().to_string())
    }

    fn encode(&self, entry: &(K, U)) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(&entry.1)?)
    }
}

impl<T, K: AsRef<str>, U: Serialize> ForkMapEncoder<&(K, U)> for JsonCodec<T> {
    fn key(&self, entry: &&(K, U)) -> Result<String, CodecError> {
        <Self as ForkMapEncoder<(K, U)>>::key(self, entry)
    }

    fn encode(&self, entry: &&(K, U)) -> Result<Vec<u8>, CodecError> {
        <Self as ForkMapEncoder<(K, U)>>::encode(self, entry)
    }
}

impl<T: DeserializeOwned> ForkMapDecoder for JsonCodec<T> {
    type Value = T;

    fn decode(&self, data: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Stores `(key, value)` pairs with the value serialized as MessagePack.
#[derive(Debug)]
pub struct MessagePackCodec<T> {
    field_names: bool,
    phantom: PhantomData<fn() -> T>,
}

impl<T> MessagePackCodec<T> {
    pub fn new() -> Self {
        Self {
            field_names: false,
            phantom: PhantomData,
        }
    }

    /// Controls whether structs are encoded as maps keyed by field name.
    ///
    /// Named payloads are larger but stay decodable after fields are
    /// reordered. Decoding accepts both forms.
    pub fn with_field_names(mut self, value: bool) -> Self {
        self.field_names = value;
        self
    }
}

impl<T> Default for MessagePackCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MessagePackCodec<T> {
    fn clone(&self) -> Self {
        Self::new().with_field_names(self.field_names)
    }
}

impl<T, K: AsRef<str>, U: Serialize> ForkMapEncoder<(K, U)> for MessagePackCodec<T> {
    fn key(&self, entry: &(K, U)) -> Result<String, CodecError> {
        Ok(entry.0.as_ref().to_string())
    }

    fn encode(&self, entry: &(K, U)) -> Result<Vec<u8>, CodecError> {
        let data = if self.field_names {
            rmp_serde::to_vec_named(&entry.1)?
        } else {
            rmp_serde::to_vec(&entry.1)?
        };
        Ok(data)
    }
}

impl<T, K: AsRef<str>, U: Serialize> ForkMapEncoder<&(K, U)> for MessagePackCodec<T> {
    fn key(&self, entry: &&(K, U)) -> Result<String, CodecError> {
        <Self as ForkMapEncoder<(K, U)>>::key(self, entry)
    }

    fn encode(&self, entry: &&(K, U)) -> Result<Vec<u8>, CodecError> {
        <Self as ForkMapEncoder<(K, U)>>::encode(self, entry)
    }
}

impl<T: DeserializeOwned> ForkMapDecoder for MessagePackCodec<T> {
    type Value = T;

    fn decode(&self, data: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

/// Encoder built from a key-extraction closure and a payload closure.
///
/// ```
/// use forkmap::{FnEncoder, ForkMapEncoder};
///
/// let encoder = FnEncoder::new(
///     |entry: &(u32, f64)| Ok(entry.0.to_string()),
///     |entry| Ok(entry.1.to_le_bytes().to_vec()),
/// );
/// assert_eq!(encoder.key(&(7, 0.5)).unwrap(), "7");
/// ```
pub struct FnEncoder<E, K, F> {
    key_of: K,
    encode: F,
    phantom: PhantomData<fn(&E)>,
}

impl<E, K, F> FnEncoder<E, K, F>
where
    K: Fn(&E) -> Result<String, CodecError>,
    F: Fn(&E) -> Result<Vec<u8>, CodecError>,
{
    pub fn new(key_of: K, encode: F) -> Self {
        Self {
            key_of,
            encode,
            phantom: PhantomData,
        }
    }
}

impl<E, K, F> ForkMapEncoder<E> for FnEncoder<E, K, F>
where
    K: Fn(&E) -> Result<String, CodecError>,
    F: Fn(&E) -> Result<Vec<u8>, CodecError>,
{
    fn key(&self, entry: &E) -> Result<String, CodecError> {
        (self.key_of)(entry)
    }

    fn encode(&self, entry: &E) -> Result<Vec<u8>, CodecError> {
        (self.encode)(entry)
    }
}

/// Decoder built from a closure.
pub struct FnDecoder<F, V> {
    decode: F,
    phantom: PhantomData<fn() -> V>,
}

impl<F, V> FnDecoder<F, V>
where
    F: Fn(&[u8]) -> Result<V, CodecError>,
{
    pub fn new(decode: F) -> Self {
        Self {
            decode,
            phantom: PhantomData,
        }
    }
}

impl<F, V> ForkMapDecoder for FnDecoder<F, V>
where
    F: Fn(&[u8]) -> Result<V, CodecError>,
{
    type Value = V;

    fn decode(&self, data: &[u8]) -> Result<V, CodecError> {
        (self.decode)(data)
    }
}
