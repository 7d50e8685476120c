//! Local done-set cache backed by `sled`, an embedded, crash-resilient
//! key-value store.

use std::path::{Path, PathBuf};

use crate::ClientError;

/// Records which resource names are known to be done, so `Client::acquire`
/// can short-circuit without a round trip. A soft cache: its contents need
/// not survive across `Client` instances, since [`Client::connect`]'s
/// done-catchup step rebuilds it from the service on every startup.
pub struct Cache {
    db: sled::Db,
    dir: PathBuf,
}

impl Cache {
    /// Opens a fresh cache under `dir` (a directory dedicated to this
    /// `Client` instance; the caller owns its lifetime).
    pub fn open(dir: &Path) -> Result<Self, ClientError> {
        let db = sled::open(dir).map_err(|err| ClientError::Cache(Box::new(err)))?;
        Ok(Self {
            db,
            dir: dir.to_path_buf(),
        })
    }

    pub fn contains(&self, name: &str) -> Result<bool, ClientError> {
        self.db
            .contains_key(name)
            .map_err(|err| ClientError::Cache(Box::new(err)))
    }

    pub fn add(&self, name: &str) -> Result<(), ClientError> {
        self.db
            .insert(name, Vec::new())
            .map_err(|err| ClientError::Cache(Box::new(err)))?;
        Ok(())
    }

    pub fn add_batch(&self) -> BatchWriter<'_> {
        BatchWriter {
            db: &self.db,
            batch: sled::Batch::default(),
        }
    }

    /// Releases the underlying database and removes its directory. Cache
    /// contents are disposable, so a failed removal is not an error.
    pub fn close(self) {
        drop(self.db);
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Accumulates inserts for [`Cache::add_batch`]; entries become visible to
/// [`Cache::contains`] only after [`BatchWriter::flush`].
pub struct BatchWriter<'a> {
    db: &'a sled::Db,
    batch: sled::Batch,
}

impl BatchWriter<'_> {
    pub fn add(&mut self, name: &str) {
        self.batch.insert(name.as_bytes(), Vec::new());
    }

    pub fn flush(self) -> Result<(), ClientError> {
        self.db
            .apply_batch(self.batch)
            .map_err(|err| ClientError::Cache(Box::new(err)))
    }

    /// Drops the accumulated batch without writing anything.
    pub fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        assert!(!cache.contains("res").unwrap());
        cache.add("res").unwrap();
        assert!(cache.contains("res").unwrap());
    }

    #[test]
    fn batch_is_invisible_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        let mut batch = cache.add_batch();
        batch.add("a");
        batch.add("b");
        assert!(!cache.contains("a").unwrap());
        batch.flush().unwrap();
        assert!(cache.contains("a").unwrap());
        assert!(cache.contains("b").unwrap());
    }

    #[test]
    fn discarded_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::open(dir.path()).unwrap();
        let mut batch = cache.add_batch();
        batch.add("a");
        batch.discard();
        assert!(!cache.contains("a").unwrap());
    }
}
