use std::sync::Arc;

use crate::perception::domain::embedding::Embedding;
use crate::shared::store_error::StoreError;

use super::identity_store::IdentityStore;
use super::known_identities::KnownIdentities;

/// Registers new identities in memory and on disk together.
#[derive(Clone)]
pub struct IdentityRegistry {
    known: KnownIdentities,
    store: Arc<dyn IdentityStore>,
}

impl IdentityRegistry {
    pub fn new(known: KnownIdentities, store: Arc<dyn IdentityStore>) -> Self {
        Self { known, store }
    }

    /// Loads the persisted identities into a fresh in-memory set.
    pub fn open(store: Arc<dyn IdentityStore>) -> Result<Self, StoreError> {
        let known = KnownIdentities::new(store.load()?);
        log::info!("Loaded {} known identities", known.len());
        Ok(Self { known, store })
    }

    pub fn known(&self) -> &KnownIdentities {
        &self.known
    }

    /// The in-memory set is updated even when persisting fails, so the face
    /// is recognized for the rest of the session.
    pub fn register(&self, name: &str, embedding: Embedding) -> Result<(), StoreError> {
        let persisted = self.store.register(name, &embedding);
        self.known.register(name, embedding);
        persisted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        saved: Mutex<Vec<String>>,
        fail: bool,
    }

    impl IdentityStore for FakeStore {
        fn load(&self) -> Result<Vec<(String, Embedding)>, StoreError> {
            Ok(vec![("Anna".into(), Embedding::new(vec![1.0]))])
        }

        fn register(&self, name: &str, _embedding: &Embedding) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Write {
                    path: "/readonly".into(),
                    source: std::io::Error::other("read-only"),
                });
            }
            self.saved.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_open_loads_persisted_identities() {
        let registry = IdentityRegistry::open(Arc::new(FakeStore::default())).unwrap();
        assert_eq!(registry.known().names(), vec!["Anna"]);
    }

    #[test]
    fn test_register_updates_memory_and_store() {
        let store = Arc::new(FakeStore::default());
        let registry = IdentityRegistry::open(store.clone()).unwrap();
        registry.register("Bruno", Embedding::new(vec![2.0])).unwrap();

        assert_eq!(registry.known().names(), vec!["Anna", "Bruno"]);
        assert_eq!(*store.saved.lock().unwrap(), vec!["Bruno"]);
    }

    #[test]
    fn test_store_failure_still_updates_memory() {
        let store = Arc::new(FakeStore {
            fail: true,
            ..Default::default()
        });
        let registry = IdentityRegistry::open(store).unwrap();
        assert!(registry.register("Bruno", Embedding::new(vec![2.0])).is_err());
        assert!(registry.known().names().contains(&"Bruno".to_string()));
    }
}
