use crate::core::{Key, Result, StoreError, Value, ValueKind};
use crate::facade::StoreOptions;
use crate::format::{EncodeMode, Entries, FileFormat, FormatEntry};
use crate::storage::{ChangeTracker, PersistentHandle, SetDecision};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Key-value store that mirrors its content to a single file and writes
/// back only when content has actually changed.
///
/// The in-memory snapshot is the single source of truth between loads and
/// saves; every save rewrites the whole file. One store owns at most one
/// open file handle.
///
/// ```no_run
/// use synckv::{Store, StoreOptions};
///
/// # fn main() -> synckv::Result<()> {
/// let options = StoreOptions::new()
///     .default("kind", "cfg")
///     .default("version", 2i64);
/// let mut store = Store::open_with("~/.config/app/settings.bin", options)?;
///
/// store.insert("version", 3i64)?;
/// assert!(store.is_dirty());
///
/// store.close()?; // force-saves and releases the file handle
/// # Ok(())
/// # }
/// ```
///
/// Dropping a store runs the same teardown best-effort; call [`close`]
/// explicitly when the save outcome matters.
///
/// [`close`]: Store::close
pub struct Store {
    options: StoreOptions,
    tracker: ChangeTracker,
    defaults: HashMap<Key, Value>,
    data: HashMap<Key, Value>,
    dirty: bool,
    handle: PersistentHandle,
    // Format entries captured at bind time so a teardown-time save can
    // survive a cleared registry.
    ark: HashMap<FileFormat, FormatEntry>,
    closing: bool,
}

impl Store {
    /// File-less store. Seeds the snapshot from the defaults when
    /// `auto_load` is on.
    pub fn new(options: StoreOptions) -> Result<Self> {
        let tracker = ChangeTracker {
            track_changes: options.track_changes,
            auto_cast: options.auto_cast,
            cast: options.cast,
        };
        let defaults = options.default_content.clone();
        let mut store = Self {
            options,
            tracker,
            defaults,
            data: HashMap::new(),
            dirty: false,
            handle: PersistentHandle::new(),
            ark: HashMap::new(),
            closing: false,
        };
        if store.options.auto_load {
            store.load()?;
        }
        Ok(store)
    }

    /// Store bound to `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, StoreOptions::new())
    }

    /// Store bound to `path`. Loads immediately when `auto_load` is on.
    pub fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let auto_load = options.auto_load;
        let mut store = Self::new(options.auto_load(false))?;
        store.options.auto_load = auto_load;
        store.bind_file(path)?;
        if auto_load {
            store.load()?;
        }
        Ok(store)
    }

    // ------------------------------------------------------------------
    // File binding
    // ------------------------------------------------------------------

    /// Currently bound path, if any.
    pub fn file(&self) -> Option<&Path> {
        self.handle.path()
    }

    pub fn format(&self) -> FileFormat {
        self.options.format
    }

    /// Bind the store to `path`, closing any previously bound file first.
    /// Expands a leading `~` when the policy flag is on. Binding the path
    /// that is already bound is a no-op and does not reopen the file.
    pub fn bind_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let resolved = self.resolve_path(path.as_ref());
        self.rebind(Some(resolved))
    }

    /// Close the bound file and leave the store file-less.
    pub fn unbind_file(&mut self) -> Result<()> {
        self.rebind(None)
    }

    fn rebind(&mut self, path: Option<PathBuf>) -> Result<()> {
        if path.as_deref() == self.handle.path() {
            return Ok(());
        }
        match path {
            Some(new_path) => {
                let entry = self.options.registry.require(self.options.format)?;
                self.ark.insert(self.options.format, entry.clone());
                self.handle
                    .bind(Some(new_path), &entry.open, self.options.auto_mkdir)
            }
            None => {
                self.handle.close();
                Ok(())
            }
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if self.options.expand_home {
            if let Ok(rest) = path.strip_prefix("~") {
                if let Some(home) = dirs::home_dir() {
                    return home.join(rest);
                }
            }
        }
        path.to_path_buf()
    }

    // ------------------------------------------------------------------
    // Mapping surface
    // ------------------------------------------------------------------

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        self.data.get(&key.into())
    }

    pub fn contains_key(&self, key: impl Into<Key>) -> bool {
        self.data.contains_key(&key.into())
    }

    /// Write a value through change tracking. May coerce text input back to
    /// the replaced value's type when auto-cast is on; a failed coercion
    /// aborts the set and leaves the slot untouched.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        match self
            .tracker
            .on_set(self.data.get(&key), self.dirty, value.into())?
        {
            SetDecision::Write { value, marks_dirty } => {
                if marks_dirty {
                    self.dirty = true;
                }
                self.data.insert(key, value);
            }
            SetDecision::Skip => {}
        }
        Ok(())
    }

    /// Bulk insert through the same tracking path as [`insert`](Store::insert).
    pub fn extend<K, V, I>(&mut self, entries: I) -> Result<()>
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.insert(key, value)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, key: impl Into<Key>) -> Option<Value> {
        let removed = self.data.remove(&key.into());
        if removed.is_some() && self.tracker.on_delete() {
            self.dirty = true;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.data.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    /// True when the snapshot diverged from disk since the last load/save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when any snapshot value is outside the immutable-comparable
    /// set. Such content may change in place without tripping the dirty
    /// flag, so equality-based tracking is unreliable for it.
    pub fn has_mutables(&self) -> bool {
        self.data.values().any(|v| v.kind() != ValueKind::Immutable)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Rebuild the snapshot: defaults are seeded when the policy asks for
    /// them, no file is bound, or the file is empty; a non-empty file is
    /// then decoded and overlaid on top. Always leaves the store clean.
    pub fn load(&mut self) -> Result<()> {
        self.data.clear();

        let file_empty = if self.handle.is_bound() {
            self.handle.is_empty()?
        } else {
            true
        };

        if self.options.include_defaults || !self.handle.is_bound() || file_empty {
            self.data
                .extend(self.defaults.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        if self.handle.is_bound() && !file_empty {
            let entry = self.options.registry.require(self.options.format)?;
            let bytes = self.handle.read_all()?;
            let entries = entry.codec.decode(&bytes)?;
            debug!(
                "loaded {} entries from {}",
                entries.len(),
                self.handle.path().unwrap_or(Path::new("?")).display()
            );
            self.data.extend(entries);
        }

        // A load always yields a synced state, by definition.
        self.dirty = false;
        Ok(())
    }

    /// Rebind to `path`, then load.
    pub fn load_from(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.bind_file(path)?;
        self.load()
    }

    /// Write the snapshot back when it diverged. A clean store with
    /// tracking on is a silent no-op.
    pub fn save(&mut self) -> Result<()> {
        self.save_inner(false)
    }

    /// Write the snapshot back regardless of the dirty flag.
    pub fn force_save(&mut self) -> Result<()> {
        self.save_inner(true)
    }

    /// Rebind to `path`, then save.
    pub fn save_to(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.bind_file(path)?;
        self.save_inner(false)
    }

    fn save_inner(&mut self, force: bool) -> Result<()> {
        if !self.handle.is_bound() {
            return Err(StoreError::Io(
                "No file location specified for save".to_string(),
            ));
        }

        if !(force || !self.options.track_changes || self.dirty) {
            return Ok(());
        }

        let format = self.options.format;
        let (entry, mode) = match self.options.registry.lookup(format)? {
            Some(entry) => (entry, EncodeMode::Fast),
            None if self.closing && format.needs_live_registry() => {
                // Teardown must not assume the shared registry is still
                // populated. Put the ark entries back and take the
                // registry-independent encode path.
                warn!("format registry lost {} during teardown, restoring ark", format);
                self.options.registry.restore(&self.ark)?;
                (self.options.registry.require(format)?, EncodeMode::Safe)
            }
            None => {
                return Err(StoreError::Configuration(format!(
                    "Unsupported format: {}",
                    format
                )));
            }
        };

        let entries: Entries = self
            .data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let bytes = entry.codec.encode(&entries, mode)?;
        self.handle.write_all(&bytes)?;
        debug!(
            "saved {} entries to {}",
            entries.len(),
            self.handle.path().unwrap_or(Path::new("?")).display()
        );

        self.dirty = false;
        Ok(())
    }

    /// Deterministic teardown: force-save when the policy asks for it and a
    /// file is bound, then release the handle and the snapshot. The handle
    /// is released even when the save fails. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.closing = true;

        let save_result = if self.options.save_on_close && self.handle.is_bound() {
            self.save_inner(true)
        } else {
            Ok(())
        };

        self.handle.close();
        self.data.clear();
        save_result
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("save on teardown failed: {}", e);
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("file", &self.handle.path())
            .field("format", &self.options.format)
            .field("entries", &self.data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
