//! Type-directed value codecs.
//!
//! Every stored field is bound to exactly one codec when its record type is
//! registered. The set is closed:
//!
//! | Codec | Field type | Stored bytes |
//! |---|---|---|
//! | [`BytesCodec`] | `Vec<u8>` | unchanged |
//! | [`TextCodec`] | `String` | UTF-8 |
//! | [`IdentityCodec`] | [`OwnerId`] | owner rendering |
//! | [`JsonCodec`] | any serde type | UTF-8 JSON |

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DecodeError;
use crate::owner::OwnerId;

/// Discriminant naming the codec a field was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    Bytes,
    Text,
    Identity,
    Json,
}

/// A codec, independent of the field type it is applied to.
pub trait Codec {
    const KIND: CodecKind;
}

/// Converts one field type to and from its stored bytes.
pub trait ValueCodec<T>: Codec {
    /// Encodes a field value.
    ///
    /// # Errors
    ///
    /// Only [`JsonCodec`] can fail, when the value's `Serialize` impl does.
    fn encode(value: &T) -> Result<Vec<u8>, serde_json::Error>;

    /// Decodes stored bytes into a field value.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the bytes do not parse into `T`.
    fn decode(data: &[u8]) -> Result<T, DecodeError>;
}

/// Raw byte pass-through.
pub struct BytesCodec;

impl Codec for BytesCodec {
    const KIND: CodecKind = CodecKind::Bytes;
}

impl ValueCodec<Vec<u8>> for BytesCodec {
    fn encode(value: &Vec<u8>) -> Result<Vec<u8>, serde_json::Error> {
        Ok(value.clone())
    }

    fn decode(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(data.to_vec())
    }
}

/// UTF-8 strings.
pub struct TextCodec;

impl Codec for TextCodec {
    const KIND: CodecKind = CodecKind::Text;
}

impl ValueCodec<String> for TextCodec {
    fn encode(value: &String) -> Result<Vec<u8>, serde_json::Error> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(data: &[u8]) -> Result<String, DecodeError> {
        Ok(String::from_utf8(data.to_vec())?)
    }
}

/// Owner identities, stored as their key rendering.
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    const KIND: CodecKind = CodecKind::Identity;
}

impl ValueCodec<OwnerId> for IdentityCodec {
    fn encode(value: &OwnerId) -> Result<Vec<u8>, serde_json::Error> {
        Ok(value.to_string().into_bytes())
    }

    fn decode(data: &[u8]) -> Result<OwnerId, DecodeError> {
        let text = String::from_utf8(data.to_vec())?;
        Ok(text.parse()?)
    }
}

/// JSON fallback for every other serde type.
pub struct JsonCodec;

impl Codec for JsonCodec {
    const KIND: CodecKind = CodecKind::Json;
}

impl<T> ValueCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(value: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(value)
    }

    fn decode(data: &[u8]) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(data)?)
    }
}
