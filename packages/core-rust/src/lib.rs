//! kvs core: composite keys, owner identities, record descriptors and value codecs.

pub mod codec;
pub mod entry;
pub mod error;
pub mod owner;
pub mod record;

pub use codec::{
    BytesCodec, Codec, CodecKind, IdentityCodec, JsonCodec, TextCodec, ValueCodec,
};
pub use entry::{parse_row_id, Entry};
pub use error::{CodecError, DecodeError};
pub use owner::OwnerId;
pub use record::{blank_entries, from_entries, load_entry, to_entries, Field, Record};
