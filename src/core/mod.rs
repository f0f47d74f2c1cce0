pub mod error;
pub mod value;

pub use error::{Result, StoreError};
pub use value::{CastFn, Key, OpaquePayload, TypeTag, Value, ValueKind, default_cast};
