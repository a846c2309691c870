//! Filesystem primitives for tier roots.
//!
//! Layout inside a root:
//! - `{real_name}`: the content file,
//! - `{b64 tag}|...|{real_name}`: a symlink to it, present only when tagged.
//!
//! Symlinks are never followed for content. They exist so a plain directory
//! listing carries tag metadata. Every name passed in here must already have
//! been validated.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("file {0} not found")]
    NotFound(PathBuf),

    #[error("file {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("{entry} is not a symlink as expected for {target}")]
    ExpectedSymlink { entry: PathBuf, target: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One raw directory entry. Tagged images appear twice: once as the content
/// file and once as the symlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub modified: DateTime<Utc>,
}

/// Create the root directory if it does not exist yet.
pub fn ensure_root(root: &Path) -> Result<(), StorageError> {
    if root.is_dir() {
        return Ok(());
    }
    tracing::info!("Storage directory {} does not exist, creating it", root.display());
    fs::create_dir_all(root).map_err(|e| StorageError::io(root, e))
}

/// Read a stored file. Every failure, including permission and I/O errors,
/// is reported as absent.
pub fn read(root: &Path, name: &str) -> Option<Vec<u8>> {
    let path = root.join(name);
    match fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!("Could not read file {}: {}", path.display(), e);
            }
            None
        }
    }
}

/// Write a new content file. Fails with `AlreadyExists` instead of
/// overwriting; the existence check and the create are one syscall.
pub fn create_exclusive(root: &Path, name: &str, data: &[u8]) -> Result<(), StorageError> {
    let path = root.join(name);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.clone()),
            _ => StorageError::io(&path, e),
        })?;

    if let Err(e) = file.write_all(data).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(&path);
        return Err(StorageError::io(&path, e));
    }

    tracing::debug!("Stored {} ({} bytes)", path.display(), data.len());
    Ok(())
}

/// Create the tag-index symlink `stored_name -> real_name`. A no-op for
/// untagged files. If the link cannot be created the content file is
/// removed again so no untagged orphan is left behind.
pub fn link_tags(root: &Path, real_name: &str, stored_name: &str) -> Result<(), StorageError> {
    if stored_name == real_name {
        return Ok(());
    }

    let link = root.join(stored_name);
    // Relative target: the link resolves inside its own directory.
    if let Err(e) = std::os::unix::fs::symlink(real_name, &link) {
        let content = root.join(real_name);
        if let Err(cleanup) = fs::remove_file(&content) {
            tracing::error!(
                "Could not remove {} after failed tag link: {}",
                content.display(),
                cleanup
            );
        }
        return Err(StorageError::io(&link, e));
    }

    tracing::debug!("Linked {} -> {}", link.display(), real_name);
    Ok(())
}

/// Delete a content file and every tag-index symlink for it.
///
/// Any other entry whose name ends with `name` must be a symlink. A regular
/// file sharing the suffix means the directory is not in the expected shape,
/// so nothing is removed and `ExpectedSymlink` is returned.
pub fn delete(root: &Path, name: &str) -> Result<(), StorageError> {
    let target = root.join(name);
    match fs::metadata(&target) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StorageError::NotFound(target));
        }
        Err(e) => return Err(StorageError::io(&target, e)),
    }

    let mut links = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| StorageError::io(root, e))? {
        let entry = entry.map_err(|e| StorageError::io(root, e))?;
        let entry_name = entry.file_name();
        let Some(entry_name) = entry_name.to_str() else {
            continue;
        };
        if entry_name == name || !entry_name.ends_with(name) {
            continue;
        }

        let path = entry.path();
        let file_type = fs::symlink_metadata(&path)
            .map_err(|e| StorageError::io(&path, e))?
            .file_type();
        if !file_type.is_symlink() {
            tracing::error!(
                "{} is not a symlink as expected for {}",
                path.display(),
                target.display()
            );
            return Err(StorageError::ExpectedSymlink {
                entry: path,
                target,
            });
        }
        links.push(path);
    }

    fs::remove_file(&target).map_err(|e| StorageError::io(&target, e))?;
    for link in &links {
        fs::remove_file(link).map_err(|e| StorageError::io(link, e))?;
    }

    tracing::debug!(
        "Deleted {} and {} tag link(s)",
        target.display(),
        links.len()
    );
    Ok(())
}

/// Raw listing of a root. A root that does not exist yet lists as empty.
pub fn list(root: &Path) -> Result<Vec<StoredEntry>, StorageError> {
    let dir = match fs::read_dir(root) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(root, e)),
    };

    let mut entries = Vec::new();
    for entry in dir {
        let entry = entry.map_err(|e| StorageError::io(root, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 entry in {}", root.display());
            continue;
        };
        // DirEntry::metadata does not traverse symlinks.
        let metadata = entry.metadata().map_err(|e| StorageError::io(&entry.path(), e))?;
        let modified = metadata
            .modified()
            .map_err(|e| StorageError::io(&entry.path(), e))?;
        entries.push(StoredEntry {
            name,
            modified: DateTime::<Utc>::from(modified),
        });
    }
    Ok(entries)
}
