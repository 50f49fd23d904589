//! File selection collaborator.
//!
//! The job lifecycle never reads files itself; it asks a `FilePicker` for a
//! `SelectedFile`. `PathPicker` is the file-system implementation used by the
//! command line front end.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Spreadsheet extensions the scoring service accepts.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Errors that can occur while selecting a file.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported file type: {0} (expected .xlsx or .xls)")]
    UnsupportedType(String),

    #[error("File is empty: {0}")]
    Empty(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// A file chosen by the user, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    /// File name without directories.
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl SelectedFile {
    /// Build a selection from raw bytes, enforcing the acceptance rules.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, SelectionError> {
        let name = name.into();
        let mime_type = mime_type_for(&name)
            .ok_or_else(|| SelectionError::UnsupportedType(name.clone()))?;
        if data.is_empty() {
            return Err(SelectionError::Empty(name));
        }
        Ok(Self {
            name,
            mime_type: mime_type.to_string(),
            data,
        })
    }
}

/// MIME type for an accepted spreadsheet name, `None` if the extension is not accepted.
pub fn mime_type_for(name: &str) -> Option<&'static str> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();

    match extension.as_str() {
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "xls" => Some("application/vnd.ms-excel"),
        _ => None,
    }
}

/// Source of user file selections.
#[async_trait]
pub trait FilePicker: Send + Sync {
    /// Ask for a file. `Ok(None)` means the user cancelled.
    async fn pick(&self) -> Result<Option<SelectedFile>, SelectionError>;
}

/// Picks a fixed path from the file system.
#[derive(Debug, Clone)]
pub struct PathPicker {
    path: PathBuf,
}

impl PathPicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FilePicker for PathPicker {
    async fn pick(&self) -> Result<Option<SelectedFile>, SelectionError> {
        let shown = self.path.display().to_string();
        let name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SelectionError::NotFound(shown.clone()))?
            .to_string();

        if mime_type_for(&name).is_none() {
            return Err(SelectionError::UnsupportedType(name));
        }

        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SelectionError::NotFound(shown));
            }
            Err(e) => return Err(e.into()),
        };

        debug!(path = %shown, size = data.len(), "Selected file");
        SelectedFile::from_bytes(name, data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, TempDir};

    #[test]
    fn test_mime_type_for() {
        assert_eq!(
            mime_type_for("answers.xlsx"),
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
        );
        assert_eq!(mime_type_for("OLD.XLS"), Some("application/vnd.ms-excel"));
        assert_eq!(mime_type_for("answers.csv"), None);
        assert_eq!(mime_type_for("xlsx"), None);
    }

    #[test]
    fn test_from_bytes_rejects_empty() {
        let result = SelectedFile::from_bytes("a.xlsx", Vec::new());
        assert!(matches!(result, Err(SelectionError::Empty(_))));
    }

    #[tokio::test]
    async fn test_path_picker_reads_file() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(b"PK\x03\x04sheet").unwrap();

        let picked = PathPicker::new(file.path()).pick().await.unwrap().unwrap();
        assert!(picked.name.ends_with(".xlsx"));
        assert_eq!(picked.data, b"PK\x03\x04sheet");
        assert_eq!(picked.mime_type, mime_type_for("x.xlsx").unwrap());
    }

    #[tokio::test]
    async fn test_path_picker_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = PathPicker::new(dir.path().join("missing.xlsx")).pick().await;
        assert!(matches!(result, Err(SelectionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_picker_wrong_extension() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"a,b").unwrap();

        let result = PathPicker::new(file.path()).pick().await;
        assert!(matches!(result, Err(SelectionError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_path_picker_empty_file() {
        let file = Builder::new().suffix(".xls").tempfile().unwrap();
        let result = PathPicker::new(file.path()).pick().await;
        assert!(matches!(result, Err(SelectionError::Empty(_))));
    }
}
