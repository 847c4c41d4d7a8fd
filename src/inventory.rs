//! Temporary inventory files.
//!
//! Inventory content supplied inline is written to a private temporary file
//! named `.inventory-<random>.yml` so it can be passed to the playbook binary
//! with `-i`. The file is readable only by the current user and is removed
//! when the [`TempInventory`] is dropped, unless it was kept.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Prefix of generated inventory file names
pub const INVENTORY_PREFIX: &str = ".inventory-";

/// Suffix of generated inventory file names
pub const INVENTORY_SUFFIX: &str = ".yml";

/// An inventory written to a temporary file.
#[derive(Debug)]
pub struct TempInventory {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl TempInventory {
    /// Write `content` to a new file in the system temp directory.
    pub fn create(content: &str) -> Result<Self> {
        Self::create_in(std::env::temp_dir(), content)
    }

    /// Write `content` to a new file in `dir`.
    pub fn create_in(dir: impl AsRef<Path>, content: &str) -> Result<Self> {
        let mut file = Builder::new()
            .prefix(INVENTORY_PREFIX)
            .suffix(INVENTORY_SUFFIX)
            .tempfile_in(dir)
            .map_err(|e| Error::Inventory(format!("failed to create inventory file: {e}")))?;

        restrict_permissions(file.path())?;

        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Error::Inventory(format!("failed to write inventory: {e}")))?;

        let path = file.path().to_path_buf();
        debug!(path = %path.display(), "Inventory was created");

        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Path of the inventory file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leave the file on disk after this value is dropped.
    pub fn keep(mut self) -> Result<PathBuf> {
        if let Some(file) = self.file.take() {
            file.keep()
                .map_err(|e| Error::Inventory(format!("failed to keep inventory file: {e}")))?;
        }
        Ok(self.path.clone())
    }

    /// Remove the file now, reporting a failure instead of ignoring it.
    pub fn remove(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => file.close().map_err(Error::from),
            None => Ok(()),
        }
    }
}

impl Drop for TempInventory {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.close() {
                warn!(path = %self.path.display(), error = %e, "Failed to remove inventory file");
            }
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| Error::Inventory(format!("failed to restrict inventory permissions: {e}")))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
