//! Local JSON forecast store, one file per granularity.
//!
//! Layout: `{dir}/{granularity}.json` holding the stored rows as a JSON
//! array. Writes go to `.json.tmp` and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{ForecastStore, StorageError};
use crate::domain::{ForecastRecord, Granularity};

#[derive(Debug, Clone)]
pub struct FileForecastStore {
    dir: PathBuf,
}

impl FileForecastStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, granularity: Granularity) -> PathBuf {
        self.dir.join(format!("{granularity}.json"))
    }

    fn load(&self, granularity: Granularity) -> Result<Vec<ForecastRecord>, StorageError> {
        let path = self.path(granularity);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(format!("read {}: {e}", path.display()))),
        };
        serde_json::from_str(&text)
            .map_err(|e| StorageError::Malformed(format!("{}: {e}", path.display())))
    }

    fn save(&self, granularity: Granularity, rows: &[ForecastRecord]) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StorageError::Io(format!("create {}: {e}", self.dir.display())))?;

        let path = self.path(granularity);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(rows)
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        fs::write(&tmp_path, json)
            .map_err(|e| StorageError::Io(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Io(format!("atomic rename failed: {e}"))
        })
    }
}

impl ForecastStore for FileForecastStore {
    fn name(&self) -> &str {
        "file"
    }

    fn delete(&self, granularity: Granularity) -> Result<(), StorageError> {
        match fs::remove_file(self.path(granularity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!("delete {granularity}: {e}"))),
        }
    }

    fn insert(&self, record: &ForecastRecord) -> Result<ForecastRecord, StorageError> {
        let mut rows = self.load(record.granularity)?;
        rows.push(record.clone());
        self.save(record.granularity, &rows)?;
        Ok(record.clone())
    }

    fn get_latest(&self, granularity: Granularity) -> Result<Option<ForecastRecord>, StorageError> {
        Ok(self
            .load(granularity)?
            .into_iter()
            .max_by_key(|r| r.generated_at))
    }
}
