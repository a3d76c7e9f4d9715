use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Write-once blob storage rooted at one directory.
///
/// Files are created with `create_new`, so an existing blob is never
/// overwritten; a clashing name gets a `_N` suffix before the extension.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `content` as `<root>/<relative_directory>/<file_name>` and
    /// returns the path actually written.
    pub fn store(
        &self,
        content: &[u8],
        relative_directory: &str,
        file_name: &str,
    ) -> Result<PathBuf, StorageError> {
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name.chars().all(|c| c == '.')
        {
            return Err(StorageError::InvalidFileName(file_name.to_string()));
        }

        let dir_path = self.root.join(relative_directory);
        ensure_directory(&dir_path)?;

        let (base, ext) = match file_name.rfind('.') {
            Some(dot_pos) if dot_pos > 0 => (&file_name[..dot_pos], Some(&file_name[dot_pos..])),
            _ => (file_name, None),
        };

        for counter in 1..=1000 {
            let candidate = if counter == 1 {
                file_name.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };
            let candidate_path = dir_path.join(&candidate);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .and_then(|_| file.sync_all())
                        .map_err(|e| StorageError::WriteFile {
                            path: candidate_path.clone(),
                            source: e,
                        })?;
                    return Ok(candidate_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: candidate_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(file_name)))
    }

    /// Reads a stored blob. `Ok(None)` when the file is gone.
    pub fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

pub(crate) fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}
