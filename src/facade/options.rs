use crate::core::{CastFn, Key, Value, default_cast};
use crate::format::{FileFormat, FormatRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Policy flags and construction parameters for a [`Store`](crate::Store).
///
/// ```
/// use synckv::{FileFormat, StoreOptions};
///
/// let options = StoreOptions::new()
///     .format(FileFormat::JsonPretty)
///     .auto_cast(true)
///     .default("retries", 3i64);
/// assert!(options.track_changes);
/// ```
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// On-disk byte layout of the bound file.
    pub format: FileFormat,
    /// Load the file immediately when the store is opened with a path.
    pub auto_load: bool,
    /// Create missing parent directories (restrictive permissions) on bind.
    pub auto_mkdir: bool,
    /// Force-save on `close()` and on drop when a file is bound.
    pub save_on_close: bool,
    /// Track changes so clean saves become no-ops. Off means every save
    /// writes.
    pub track_changes: bool,
    /// Seed defaults even when the bound file exists and has content.
    pub include_defaults: bool,
    /// Expand a leading `~` in bound paths to the home directory.
    pub expand_home: bool,
    /// Coerce incoming text values back to the type they replace.
    pub auto_cast: bool,
    /// Seed content merged under per-open extras.
    pub default_content: HashMap<Key, Value>,
    /// Conversion function auto-cast calls, keyed by target type tag.
    pub cast: CastFn,
    /// Format table shared with other stores in the process.
    pub registry: Arc<FormatRegistry>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self {
            format: FileFormat::BinaryCompact,
            auto_load: true,
            auto_mkdir: true,
            save_on_close: true,
            track_changes: true,
            include_defaults: true,
            expand_home: true,
            auto_cast: false,
            default_content: HashMap::new(),
            cast: default_cast,
            registry: Arc::new(FormatRegistry::with_defaults()),
        }
    }

    pub fn format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn auto_load(mut self, on: bool) -> Self {
        self.auto_load = on;
        self
    }

    pub fn auto_mkdir(mut self, on: bool) -> Self {
        self.auto_mkdir = on;
        self
    }

    pub fn save_on_close(mut self, on: bool) -> Self {
        self.save_on_close = on;
        self
    }

    pub fn track_changes(mut self, on: bool) -> Self {
        self.track_changes = on;
        self
    }

    pub fn include_defaults(mut self, on: bool) -> Self {
        self.include_defaults = on;
        self
    }

    pub fn expand_home(mut self, on: bool) -> Self {
        self.expand_home = on;
        self
    }

    pub fn auto_cast(mut self, on: bool) -> Self {
        self.auto_cast = on;
        self
    }

    pub fn default(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.default_content.insert(key.into(), value.into());
        self
    }

    pub fn defaults(mut self, entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        self.default_content.extend(entries);
        self
    }

    pub fn cast(mut self, cast: CastFn) -> Self {
        self.cast = cast;
        self
    }

    pub fn registry(mut self, registry: Arc<FormatRegistry>) -> Self {
        self.registry = registry;
        self
    }
}
