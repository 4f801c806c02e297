use super::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Records that live one-per-file in a [`JsonStore`].
pub trait Storable: Serialize + DeserializeOwned {
    /// File stem for this record. Must be safe to use as a file name.
    fn id(&self) -> String;
}

/// JSON-file-per-record store rooted at one directory.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _phantom: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.file_path(id).exists()
    }

    /// Write a record, replacing any previous version.
    ///
    /// The record is written to a sibling temp file and renamed into place so
    /// a crash never leaves a half-written record behind.
    pub fn save(&self, data: &T) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let id = data.id();
        let path = self.file_path(&id);
        let tmp = self.dir.join(format!(".{}.json.tmp", id));
        std::fs::write(&tmp, serde_json::to_vec_pretty(data)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load every record in the directory, skipping files that fail to parse.
    pub fn load_all(&self) -> Result<Vec<T>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<T>(&contents) {
                    Ok(data) => items.push(data),
                    Err(e) => tracing::warn!(path = %path.display(), "Skipping unreadable record: {}", e),
                },
                Err(e) => {
                    tracing::warn!("Failed to read file {:?}: {}", path, e);
                }
            }
        }
        Ok(items)
    }
}
