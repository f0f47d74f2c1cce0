use crate::core::{Result, StoreError};
use crate::format::OpenMode;
use log::debug;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The single owned file resource of a store: at most one open handle,
/// tied to at most one path. Rebinding always closes the old handle before
/// opening the new one. Opening never truncates; truncation happens only
/// through `write_all` at save time.
#[derive(Debug, Default)]
pub struct PersistentHandle {
    path: Option<PathBuf>,
    file: Option<File>,
}

#[cfg(unix)]
fn create_parent_dirs(parent: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(parent)
}

#[cfg(not(unix))]
fn create_parent_dirs(parent: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(parent)
}

impl PersistentHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_bound(&self) -> bool {
        self.path.is_some()
    }

    /// Rebind to `path`. Equal path is a no-op; `None` closes the handle
    /// and leaves the store file-less.
    pub fn bind(&mut self, path: Option<PathBuf>, open: &OpenMode, auto_mkdir: bool) -> Result<()> {
        if self.path == path {
            return Ok(());
        }

        self.close();

        if let Some(new_path) = &path {
            if auto_mkdir {
                if let Some(parent) = new_path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        create_parent_dirs(parent).map_err(|e| {
                            StoreError::Io(format!(
                                "Failed to create parent directories for {}: {}",
                                new_path.display(),
                                e
                            ))
                        })?;
                    }
                }
            }

            let file = open.to_open_options().open(new_path).map_err(|e| {
                StoreError::Io(format!("Failed to open {}: {}", new_path.display(), e))
            })?;
            debug!("bound file {}", new_path.display());
            self.file = Some(file);
        }

        self.path = path;
        Ok(())
    }

    /// Close the open handle, keeping nothing. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(path) = self.path.take() {
            debug!("closed file {}", path.display());
        }
        self.file = None;
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| StoreError::Io("No file bound".to_string()))
    }

    /// True when the bound file holds zero bytes. Distinguishes a freshly
    /// created file from one with persisted content.
    pub fn is_empty(&mut self) -> Result<bool> {
        let end = self.file_mut()?.seek(SeekFrom::End(0))?;
        Ok(end == 0)
    }

    /// Read the full file content from the start.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Truncate and rewrite the whole file, then flush. There is no
    /// incremental write; every save rewrites the entire payload.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_mode() -> OpenMode {
        OpenMode::append_style()
    }

    #[test]
    fn test_bind_creates_parents_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/settings.bin");

        let mut handle = PersistentHandle::new();
        handle.bind(Some(path.clone()), &open_mode(), true).unwrap();

        assert!(path.exists());
        assert!(handle.is_bound());
        assert!(handle.is_empty().unwrap());
    }

    #[test]
    fn test_bind_without_mkdir_fails_on_missing_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing/settings.bin");

        let mut handle = PersistentHandle::new();
        let result = handle.bind(Some(path), &open_mode(), false);
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_write_read_and_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.bin");

        let mut handle = PersistentHandle::new();
        handle.bind(Some(path), &open_mode(), true).unwrap();

        handle.write_all(b"a longer first payload").unwrap();
        assert_eq!(handle.read_all().unwrap(), b"a longer first payload");

        // A shorter rewrite must not leave stale bytes behind.
        handle.write_all(b"short").unwrap();
        assert_eq!(handle.read_all().unwrap(), b"short");
        assert!(!handle.is_empty().unwrap());
    }

    #[test]
    fn test_opening_existing_file_does_not_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.bin");
        std::fs::write(&path, b"persisted").unwrap();

        let mut handle = PersistentHandle::new();
        handle.bind(Some(path), &open_mode(), true).unwrap();
        assert!(!handle.is_empty().unwrap());
        assert_eq!(handle.read_all().unwrap(), b"persisted");
    }

    #[test]
    fn test_rebind_same_path_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.bin");

        let mut handle = PersistentHandle::new();
        handle.bind(Some(path.clone()), &open_mode(), true).unwrap();
        handle.write_all(b"content").unwrap();

        handle.bind(Some(path), &open_mode(), true).unwrap();
        assert_eq!(handle.read_all().unwrap(), b"content");
    }

    #[test]
    fn test_bind_none_closes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.bin");

        let mut handle = PersistentHandle::new();
        handle.bind(Some(path), &open_mode(), true).unwrap();
        handle.bind(None, &open_mode(), true).unwrap();

        assert!(!handle.is_bound());
        assert!(matches!(handle.read_all(), Err(StoreError::Io(_))));
    }
}
