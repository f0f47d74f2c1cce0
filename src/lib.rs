// ============================================================================
// synckv Library
// ============================================================================

//! Self-synchronizing key-value store.
//!
//! An in-memory mapping that mirrors its content to a single file and
//! writes back only when content has actually changed. Built for
//! application settings: defaults are merged with persisted overrides on
//! startup and flushed automatically on shutdown.
//!
//! Four on-disk formats are supported: compact MessagePack, verbose YAML
//! (both carry every value type, opaque payloads included), and compact or
//! pretty JSON (lossy: text keys only, JSON-expressible values only).
//!
//! ```no_run
//! use synckv::{FileFormat, Store, StoreOptions};
//!
//! fn main() -> synckv::Result<()> {
//!     let options = StoreOptions::new()
//!         .format(FileFormat::JsonPretty)
//!         .default("theme", "dark")
//!         .default("volume", 80i64);
//!
//!     let mut settings = Store::open_with("~/.config/app/settings.json", options)?;
//!     settings.insert("volume", 65i64)?;
//!
//!     // Writes only because volume changed; a clean store saves nothing.
//!     settings.save()?;
//!     settings.close()?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod facade;
pub mod format;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{CastFn, Key, OpaquePayload, Result, StoreError, TypeTag, Value, ValueKind};
pub use facade::{Store, StoreOptions};
pub use format::{Codec, EncodeMode, Entries, FileFormat, FormatEntry, FormatRegistry, OpenMode};
pub use storage::{ChangeTracker, PersistentHandle, SetDecision};
