pub mod codec;
pub mod registry;

pub use codec::{BinaryCodec, Codec, EncodeMode, Entries, JsonCodec, TextCodec};
pub use registry::{FileFormat, FormatEntry, FormatRegistry, OpenMode};
