use crate::core::{Result, StoreError};
use crate::format::codec::{BinaryCodec, Codec, JsonCodec, TextCodec};
use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::{Arc, RwLock};

/// On-disk byte layout of a bound file. Never auto-detected from content;
/// the caller must use the same format across load and save of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Compact MessagePack object graph. Full value-type coverage.
    BinaryCompact,
    /// Human-inspectable YAML object graph. Same coverage, larger output.
    TextVerbose,
    /// Compact JSON. Lossy: text keys only, JSON-expressible values only.
    JsonCompact,
    /// Indented JSON. Same coverage as `JsonCompact`.
    JsonPretty,
}

impl FileFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BinaryCompact => "binary-compact",
            Self::TextVerbose => "text-verbose",
            Self::JsonCompact => "json-compact",
            Self::JsonPretty => "json-pretty",
        }
    }

    /// Formats whose encoder consults shared registry state and therefore
    /// need the safe encode path when saving during teardown.
    pub fn needs_live_registry(&self) -> bool {
        matches!(self, Self::BinaryCompact)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Filesystem open mode a format requires. Every registered mode is
/// read+write with create-if-missing and truncation off; files are only
/// ever truncated inside save, never by opening them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
}

impl OpenMode {
    pub const fn append_style() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
            truncate: false,
        }
    }

    pub fn to_open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.read)
            .write(self.write)
            .create(self.create)
            .truncate(self.truncate);
        options
    }
}

#[derive(Clone)]
pub struct FormatEntry {
    pub open: OpenMode,
    pub codec: Arc<dyn Codec>,
}

impl fmt::Debug for FormatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatEntry")
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

/// Process-wide table mapping a format identifier to its open mode and
/// encode/decode capability. Shared between stores via `Arc`; an owning
/// scope may clear it during teardown, which is exactly the situation the
/// store's ark restore handles.
pub struct FormatRegistry {
    entries: RwLock<HashMap<FileFormat, FormatEntry>>,
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with all four built-in formats.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        // A freshly created lock cannot be poisoned; registration on a new
        // registry never fails.
        let _ = registry.register(
            FileFormat::BinaryCompact,
            FormatEntry {
                open: OpenMode::append_style(),
                codec: Arc::new(BinaryCodec),
            },
        );
        let _ = registry.register(
            FileFormat::TextVerbose,
            FormatEntry {
                open: OpenMode::append_style(),
                codec: Arc::new(TextCodec),
            },
        );
        let _ = registry.register(
            FileFormat::JsonCompact,
            FormatEntry {
                open: OpenMode::append_style(),
                codec: Arc::new(JsonCodec { pretty: false }),
            },
        );
        let _ = registry.register(
            FileFormat::JsonPretty,
            FormatEntry {
                open: OpenMode::append_style(),
                codec: Arc::new(JsonCodec { pretty: true }),
            },
        );
        registry
    }

    pub fn register(&self, format: FileFormat, entry: FormatEntry) -> Result<()> {
        self.entries.write()?.insert(format, entry);
        Ok(())
    }

    pub fn lookup(&self, format: FileFormat) -> Result<Option<FormatEntry>> {
        Ok(self.entries.read()?.get(&format).cloned())
    }

    /// Lookup that fails with a configuration error for unmapped formats.
    pub fn require(&self, format: FileFormat) -> Result<FormatEntry> {
        self.lookup(format)?
            .ok_or_else(|| StoreError::Configuration(format!("Unsupported format: {}", format)))
    }

    /// Drop every registered format. Stores bound while an entry existed
    /// keep their own ark copy and can restore it at teardown.
    pub fn clear(&self) -> Result<()> {
        self.entries.write()?.clear();
        Ok(())
    }

    /// Reinstall externally-kept entries, e.g. a store's ark during a
    /// teardown-time save.
    pub fn restore(&self, entries: &HashMap<FileFormat, FormatEntry>) -> Result<()> {
        let mut table = self.entries.write()?;
        for (format, entry) in entries {
            table.insert(*format, entry.clone());
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .map(|table| table.is_empty())
            .unwrap_or(false)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formats: Vec<FileFormat> = self
            .entries
            .read()
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default();
        f.debug_struct("FormatRegistry")
            .field("formats", &formats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_formats() {
        let registry = FormatRegistry::with_defaults();
        for format in [
            FileFormat::BinaryCompact,
            FileFormat::TextVerbose,
            FileFormat::JsonCompact,
            FileFormat::JsonPretty,
        ] {
            let entry = registry.require(format).unwrap();
            assert!(entry.open.read && entry.open.write && entry.open.create);
            assert!(!entry.open.truncate, "opening must never truncate");
        }
    }

    #[test]
    fn test_unmapped_format_is_configuration_error() {
        let registry = FormatRegistry::empty();
        assert!(matches!(
            registry.require(FileFormat::JsonCompact),
            Err(StoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_clear_and_restore() {
        let registry = FormatRegistry::with_defaults();
        let mut ark = HashMap::new();
        ark.insert(
            FileFormat::BinaryCompact,
            registry.lookup(FileFormat::BinaryCompact).unwrap().unwrap(),
        );

        registry.clear().unwrap();
        assert!(registry.is_empty());
        assert!(registry.lookup(FileFormat::BinaryCompact).unwrap().is_none());

        registry.restore(&ark).unwrap();
        assert!(registry.lookup(FileFormat::BinaryCompact).unwrap().is_some());
    }

    #[test]
    fn test_only_binary_needs_live_registry() {
        assert!(FileFormat::BinaryCompact.needs_live_registry());
        assert!(!FileFormat::TextVerbose.needs_live_registry());
        assert!(!FileFormat::JsonCompact.needs_live_registry());
        assert!(!FileFormat::JsonPretty.needs_live_registry());
    }
}
