//! Per-request scratch copies of uploaded files.
//!
//! Intake stages uploads under `<scratch_root>/<request_id>/`; the returned
//! [`ScratchInputs`] owns that directory and removes it when dropped, which
//! covers every way a run can end (including a job that never runs).

use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::filesystem::FileStorage;

#[derive(Debug, Clone)]
pub struct ScratchSpace {
    storage: FileStorage,
}

/// One staged upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub original_name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct ScratchInputs {
    directory: PathBuf,
    files: Vec<StagedFile>,
}

impl ScratchSpace {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            storage: FileStorage::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    /// Writes `(name, bytes)` pairs into the request's scratch directory.
    ///
    /// On failure everything written so far is removed again.
    pub fn stage<'a, I>(&self, request_id: &str, files: I) -> Result<ScratchInputs, StorageError>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut inputs = ScratchInputs {
            directory: self.storage.root().join(request_id),
            files: Vec::new(),
        };

        for (name, bytes) in files {
            let path = self.storage.store(bytes, request_id, name)?;
            inputs.files.push(StagedFile {
                original_name: name.to_string(),
                path,
            });
        }

        Ok(inputs)
    }
}

impl ScratchInputs {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }
}

impl Drop for ScratchInputs {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.directory) {
            Ok(()) => log::debug!("Removed scratch directory {}", self.directory.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove scratch directory {}: {}",
                self.directory.display(),
                e
            ),
        }
    }
}
