use indexmap::IndexSet;
use log::{info, warn};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a bulk deletion; failures carry the reason.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DeletionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_urls(&self) -> Vec<String> {
        self.failed.iter().map(|(url, _)| url.clone()).collect()
    }
}

#[rocket::async_trait]
pub trait FileStore: Send + Sync {
    /// Persists the bytes and returns the public URL.
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, StorageError>;
    async fn delete(&self, urls: &[String]) -> DeletionReport;
    /// Whether `url` names a file this store can delete.
    fn manages(&self, url: &str) -> bool;
}

/// Files on local disk, served by Rocket under `/uploads`.
pub struct LocalFileStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalFileStore {
    pub fn new(root: impl AsRef<Path>, public_base_url: &str) -> Self {
        LocalFileStore {
            root: root.as_ref().to_path_buf(),
            url_prefix: format!("{}/uploads/", public_base_url.trim_end_matches('/')),
        }
    }

    fn path_for(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(&self.url_prefix)?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(self.root.join(name))
    }
}

#[rocket::async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, bytes: &[u8], extension: &str) -> Result<String, StorageError> {
        fs::create_dir_all(&self.root).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(self.root.join(&filename), bytes).await?;

        info!("Stored upload {} ({} bytes)", filename, bytes.len());
        Ok(format!("{}{}", self.url_prefix, filename))
    }

    async fn delete(&self, urls: &[String]) -> DeletionReport {
        let mut report = DeletionReport::default();

        for url in urls {
            let Some(path) = self.path_for(url) else {
                warn!("Cannot delete {}: not a file this server stores", url);
                report.failed.push((url.clone(), "unmanaged location".to_string()));
                continue;
            };

            match fs::remove_file(&path).await {
                Ok(()) => report.deleted.push(url.clone()),
                // Already gone is as good as deleted.
                Err(e) if e.kind() == ErrorKind::NotFound => report.deleted.push(url.clone()),
                Err(e) => {
                    warn!("Failed to delete {}: {}", path.display(), e);
                    report.failed.push((url.clone(), e.to_string()));
                }
            }
        }

        report
    }

    fn manages(&self, url: &str) -> bool {
        self.path_for(url).is_some()
    }
}

/// Every string in `value`, at any depth, that names a file `files` manages.
/// Order of first appearance, no duplicates.
pub fn collect_storage_urls(value: &Value, files: &dyn FileStore) -> Vec<String> {
    let mut found = IndexSet::new();
    walk(value, files, &mut found);
    found.into_iter().collect()
}

fn walk(value: &Value, files: &dyn FileStore, found: &mut IndexSet<String>) {
    match value {
        Value::String(s) => {
            if files.manages(s) {
                found.insert(s.clone());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| walk(v, files, found)),
        Value::Object(map) => map.values().for_each(|v| walk(v, files, found)),
        _ => {}
    }
}
