use crate::perception::domain::embedding::Embedding;
use crate::shared::store_error::StoreError;

/// Persistent name → embedding mapping.
pub trait IdentityStore: Send + Sync {
    /// All identities in registration order. A missing store is empty.
    fn load(&self) -> Result<Vec<(String, Embedding)>, StoreError>;

    /// Adds a name or overwrites its embedding, persisting the whole set.
    fn register(&self, name: &str, embedding: &Embedding) -> Result<(), StoreError>;
}
