use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::identity::domain::identity_store::IdentityStore;
use crate::perception::domain::embedding::Embedding;
use crate::shared::store_error::{write_atomically, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredIdentities {
    identities: Vec<StoredIdentity>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    name: String,
    embedding: Embedding,
}

/// Keeps all identities in a single JSON document.
///
/// Registration rewrites the file atomically; concurrent registrations from
/// one process are serialized by an internal lock.
pub struct JsonIdentityStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredIdentities, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredIdentities::default())
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }
}

impl IdentityStore for JsonIdentityStore {
    fn load(&self) -> Result<Vec<(String, Embedding)>, StoreError> {
        Ok(self
            .read()?
            .identities
            .into_iter()
            .map(|i| (i.name, i.embedding))
            .collect())
    }

    fn register(&self, name: &str, embedding: &Embedding) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stored = self.read()?;
        match stored.identities.iter_mut().find(|i| i.name == name) {
            Some(existing) => existing.embedding = embedding.clone(),
            None => stored.identities.push(StoredIdentity {
                name: name.to_string(),
                embedding: embedding.clone(),
            }),
        }
        let json = serde_json::to_vec_pretty(&stored)?;
        write_atomically(&self.path, &json)?;
        log::info!("Registered identity '{name}' ({} known)", stored.identities.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, JsonIdentityStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonIdentityStore::new(dir.path().join("embeddings.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_register_persists_in_order() {
        let (_dir, store) = store();
        store.register("Anna", &Embedding::new(vec![1.0, 0.0])).unwrap();
        store.register("Bruno", &Embedding::new(vec![0.0, 1.0])).unwrap();

        let reopened = JsonIdentityStore::new(store.path());
        let names: Vec<_> = reopened.load().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Anna", "Bruno"]);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let (_dir, store) = store();
        store.register("Anna", &Embedding::new(vec![1.0])).unwrap();
        store.register("Anna", &Embedding::new(vec![2.0])).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, vec![("Anna".to_string(), Embedding::new(vec![2.0]))]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = store();
        std::fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.load(), Err(StoreError::Corrupt { .. })));
    }
}
