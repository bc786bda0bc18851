//! Diagnostic artifact persistence
//!
//! Screenshots taken after each step are handed to a sink. Sinks report
//! failures, but callers only ever log them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::common::{Error, Result};

/// Destination for diagnostic captures
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Store `bytes` under `label`, returning where it went
    async fn persist(&self, label: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes captures into a directory, created on first use
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path a label will be written to
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(file_name_for(label))
    }
}

#[async_trait]
impl DiagnosticSink for DirectorySink {
    async fn persist(&self, label: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::capture_failed(label, &e.to_string()))?;

        let path = self.path_for(label);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::capture_failed(label, &e.to_string()))?;

        tracing::info!("Saved screenshot: {}", path.display());
        Ok(path)
    }
}

/// Discards captures
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl DiagnosticSink for NullSink {
    async fn persist(&self, label: &str, _bytes: &[u8]) -> Result<PathBuf> {
        Ok(PathBuf::from(file_name_for(label)))
    }
}

/// Reduce a label to a single file name, defaulting the extension to `.png`
fn file_name_for(label: &str) -> String {
    let name: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let name = name.trim_start_matches('.');
    let name = if name.is_empty() { "capture" } else { name };

    if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.png", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("auth_0_launch.png"), "auth_0_launch.png");
        assert_eq!(file_name_for("cart home"), "cart home.png");
        assert_eq!(file_name_for("../escape/me"), "_escape_me.png");
        assert_eq!(file_name_for("   "), "capture.png");
    }

    #[tokio::test]
    async fn test_directory_sink_creates_dir_on_demand() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("docs").join("results");
        let sink = DirectorySink::new(&dir);
        assert!(!dir.exists());

        let path = sink.persist("auth_1_package", b"png").await.unwrap();

        assert_eq!(path, dir.join("auth_1_package.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_directory_sink_reports_unwritable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = DirectorySink::new(blocker.join("nested"));

        let err = sink.persist("shot", b"png").await.unwrap_err();
        assert!(matches!(err, Error::DiagnosticCapture { .. }));
    }
}
