use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::favorites_store::{FavoritesStore, StoreError};
use crate::model::FavoriteRecord;

const PAGE_SIZE: usize = 100;
const FILE_PREFIX: &str = "favorites.";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode backup page: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to list backup directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct BackupEntry {
    key: String,
    #[serde(rename = "type", default)]
    item_type: Option<String>,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    launch_count: u32,
    #[serde(default)]
    pin_position: u32,
    searchable: String,
    #[serde(default)]
    weight: Option<f64>,
}

impl From<FavoriteRecord> for BackupEntry {
    fn from(value: FavoriteRecord) -> Self {
        Self {
            key: value.key,
            item_type: Some(value.item_type),
            hidden: value.hidden,
            launch_count: value.launch_count,
            pin_position: value.pin_position,
            searchable: value.serialized,
            weight: Some(value.weight),
        }
    }
}

impl BackupEntry {
    fn into_record(self) -> Option<FavoriteRecord> {
        let item_type = self.item_type.filter(|t| !t.trim().is_empty())?;
        Some(FavoriteRecord {
            key: self.key,
            item_type,
            serialized: self.searchable,
            launch_count: self.launch_count,
            pin_position: if self.hidden { 0 } else { self.pin_position },
            hidden: self.hidden,
            weight: self.weight.filter(|w| w.is_finite()).unwrap_or(0.0),
        })
    }
}

/// Writes the whole table as `favorites.0000`, `favorites.0001`, ... with at
/// most 100 records per page. Returns the number of exported records.
pub fn export(store: &FavoritesStore, dir: &Path) -> Result<usize, BackupError> {
    std::fs::create_dir_all(dir).map_err(|source| BackupError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut page = 0;
    let mut exported = 0;
    loop {
        let records = store.page(PAGE_SIZE, page * PAGE_SIZE)?;
        let count = records.len();
        let entries: Vec<BackupEntry> = records.into_iter().map(BackupEntry::from).collect();
        let encoded = serde_json::to_string(&entries)?;

        let path = dir.join(page_file_name(page));
        std::fs::write(&path, encoded).map_err(|source| BackupError::Io { path, source })?;

        exported += count;
        page += 1;
        if count < PAGE_SIZE {
            break;
        }
    }

    info!(dir = %dir.display(), exported, "exported favorites");
    Ok(exported)
}

/// Replaces the table with the contents of every `favorites.*` page in
/// `dir`. Unreadable pages are skipped, as are entries without a type. A
/// missing directory imports nothing and leaves the table empty.
pub fn import(store: &FavoritesStore, dir: &Path) -> Result<usize, BackupError> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "backup directory missing; favorites will be wiped");
    }

    let mut records = Vec::new();
    for path in page_files(dir)? {
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable backup page");
                continue;
            }
        };
        match serde_json::from_str::<Vec<BackupEntry>>(&raw) {
            Ok(entries) => records.extend(entries.into_iter().filter_map(BackupEntry::into_record)),
            Err(error) => warn!(path = %path.display(), %error, "skipping malformed backup page"),
        }
    }

    let imported = store.replace_all(&records)?;
    info!(dir = %dir.display(), imported, "imported favorites");
    Ok(imported)
}

fn page_file_name(page: usize) -> String {
    format!("{FILE_PREFIX}{page:04}")
}

fn page_files(dir: &Path) -> Result<Vec<PathBuf>, BackupError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        let is_page = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(FILE_PREFIX));
        if is_page {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::{page_file_name, BackupEntry};

    #[test]
    fn page_names_are_zero_padded() {
        assert_eq!(page_file_name(0), "favorites.0000");
        assert_eq!(page_file_name(12), "favorites.0012");
    }

    #[test]
    fn entry_without_type_is_dropped() {
        let entry: BackupEntry = serde_json::from_str(
            r#"{"key":"app://a","hidden":false,"launchCount":3,"pinPosition":0,"searchable":"{}"}"#,
        )
        .unwrap();
        assert!(entry.into_record().is_none());
    }

    #[test]
    fn hidden_entry_loses_pin_position() {
        let entry: BackupEntry = serde_json::from_str(
            r#"{"key":"app://a","type":"app","hidden":true,"launchCount":3,"pinPosition":4,"searchable":"{}","weight":0.5}"#,
        )
        .unwrap();
        let record = entry.into_record().unwrap();
        assert_eq!(record.pin_position, 0);
        assert!(record.hidden);
        assert_eq!(record.weight, 0.5);
    }
}
