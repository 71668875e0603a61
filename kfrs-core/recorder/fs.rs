use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::RecorderError;

/// Filesystem seam the recorder writes through, so tests can run against an in-memory
/// filesystem instead of touching disk.
#[async_trait]
pub trait MirrorFs: Send + Sync {
    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), RecorderError>;
    async fn remove(&self, path: &Path) -> Result<(), RecorderError>;
    async fn list_yaml_files(&self, dir: &Path) -> Result<HashSet<PathBuf>, RecorderError>;
}

/// Writes through the real filesystem: write-temp-then-rename within the target directory,
/// mode 0600, so a crash mid-write never leaves a half-written mirror file in place.
pub struct RealFs;

#[async_trait]
impl MirrorFs for RealFs {
    async fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), RecorderError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).await.map_err(|source| io_error(dir, source))?;

        let temp_path = dir.join(format!(".{}.tmp", file_name(path)));
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|source| io_error(&temp_path, source))?;
            file.write_all(contents.as_bytes())
                .await
                .map_err(|source| io_error(&temp_path, source))?;
            file.flush().await.map_err(|source| io_error(&temp_path, source))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let permissions = std::fs::Permissions::from_mode(0o600);
                file.set_permissions(permissions).await.map_err(|source| io_error(&temp_path, source))?;
            }
        }

        fs::rename(&temp_path, path).await.map_err(|source| io_error(path, source))
    }

    async fn remove(&self, path: &Path) -> Result<(), RecorderError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error(path, error)),
        }
    }

    async fn list_yaml_files(&self, dir: &Path) -> Result<HashSet<PathBuf>, RecorderError> {
        let mut found = HashSet::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(error) => return Err(io_error(dir, error)),
        };

        while let Some(entry) = entries.next_entry().await.map_err(|source| io_error(dir, source))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                found.insert(path);
            }
        }

        Ok(found)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn io_error(path: &Path, source: std::io::Error) -> RecorderError {
    RecorderError::Io {
        path: path.to_owned(),
        source,
    }
}

/// In-memory [`MirrorFs`] for tests, mirroring the Go program's `afero.MemMapFs` substitution
/// in its recorder tests. `failing()` makes every mutating call return an io error, so tests
/// can exercise the "read-only filesystem" path without touching disk.
#[cfg(test)]
pub struct MockFs {
    files: std::sync::Mutex<HashSet<PathBuf>>,
    fail: bool,
}

#[cfg(test)]
impl MockFs {
    pub fn new() -> Self {
        Self {
            files: std::sync::Mutex::new(HashSet::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            files: std::sync::Mutex::new(HashSet::new()),
            fail: true,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl MirrorFs for MockFs {
    async fn write_atomic(&self, path: &Path, _contents: &str) -> Result<(), RecorderError> {
        if self.fail {
            return Err(io_error(path, std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem")));
        }
        self.files.lock().unwrap().insert(path.to_owned());
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<(), RecorderError> {
        if self.fail {
            return Err(io_error(path, std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem")));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn list_yaml_files(&self, _dir: &Path) -> Result<HashSet<PathBuf>, RecorderError> {
        Ok(self.files.lock().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pod-default-web.yaml");

        RealFs.write_atomic(&path, "kind: Pod\n").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "kind: Pod\n");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.yaml");

        RealFs.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn list_yaml_files_ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        RealFs.write_atomic(&dir.path().join("a.yaml"), "a").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "keep me").await.unwrap();

        let found = RealFs.list_yaml_files(dir.path()).await.unwrap();

        assert_eq!(found.len(), 1);
        assert!(found.contains(&dir.path().join("a.yaml")));
    }
}
