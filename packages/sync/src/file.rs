//! Backend storing the record as a local JSON file

use crate::backend::{AuthInfo, Backend, BackendError, Fetched, StoredRecord};
use async_trait::async_trait;
use bindery_common::{Action, PermissionGate};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub struct FileBackend {
    id: String,
    path: PathBuf,
    permissions: PermissionGate,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let permissions = PermissionGate::new();
        permissions.on(&[
            Action::Read,
            Action::Edit,
            Action::Add,
            Action::Delete,
            Action::Save,
        ]);

        Self {
            id: path.display().to_string(),
            path,
            permissions,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, e: std::io::Error) -> BackendError {
    if e.kind() == ErrorKind::NotFound {
        BackendError::not_found(format!("{} does not exist", path.display()))
    } else {
        BackendError::new(format!("{}: {}", path.display(), e))
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    async fn ready(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get(&self) -> Result<Fetched, BackendError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = content.len(), "File read");
        Ok(Fetched::Text(content))
    }

    async fn put(&self, record: StoredRecord) -> Result<StoredRecord, BackendError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(&self.path, &record.data_string)
            .await
            .map_err(|e| io_error(&self.path, e))?;

        debug!(path = %self.path.display(), "File written");
        Ok(record)
    }

    async fn login(&self) -> Result<Option<AuthInfo>, BackendError> {
        Ok(None)
    }

    fn logout(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("data.json"));

        let err = backend.get().await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status, Some(404));
    }

    #[tokio::test]
    async fn test_put_creates_file() {
        let dir = TempDir::new().unwrap();
        let backend = FileBackend::new(dir.path().join("nested").join("data.json"));

        backend
            .put(StoredRecord {
                data: json!([1]),
                data_string: "[1]".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(backend.get().await.unwrap(), Fetched::Text("[1]".to_string()));
    }
}
