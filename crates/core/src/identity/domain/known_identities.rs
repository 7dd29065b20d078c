use std::sync::{Arc, RwLock};

use crate::perception::domain::embedding::Embedding;

/// Insertion-ordered name → embedding set, shared between the resolver on
/// the capture thread and conversations that register new names.
///
/// Re-registering a name overwrites its embedding in place, keeping its
/// position.
#[derive(Clone, Default)]
pub struct KnownIdentities {
    entries: Arc<RwLock<Vec<(String, Embedding)>>>,
}

impl KnownIdentities {
    pub fn new(entries: Vec<(String, Embedding)>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    /// Adds or overwrites an identity. Returns `true` when the name was new.
    pub fn register(&self, name: &str, embedding: Embedding) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => {
                entry.1 = embedding;
                false
            }
            None => {
                entries.push((name.to_string(), embedding));
                true
            }
        }
    }

    /// Runs `f` over the entries in insertion order while holding the read lock.
    pub fn with_entries<R>(&self, f: impl FnOnce(&[(String, Embedding)]) -> R) -> R {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        f(&entries)
    }

    pub fn names(&self) -> Vec<String> {
        self.with_entries(|entries| entries.iter().map(|(n, _)| n.clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(v: f32) -> Embedding {
        Embedding::new(vec![v])
    }

    #[test]
    fn test_register_appends_in_order() {
        let known = KnownIdentities::default();
        assert!(known.register("Anna", emb(1.0)));
        assert!(known.register("Bruno", emb(2.0)));
        assert_eq!(known.names(), vec!["Anna", "Bruno"]);
    }

    #[test]
    fn test_reregistration_overwrites_in_place() {
        let known = KnownIdentities::new(vec![("Anna".into(), emb(1.0)), ("Bruno".into(), emb(2.0))]);
        assert!(!known.register("Anna", emb(9.0)));

        known.with_entries(|entries| {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0], ("Anna".to_string(), emb(9.0)));
        });
    }

    #[test]
    fn test_clones_share_entries() {
        let known = KnownIdentities::default();
        let other = known.clone();
        other.register("Carla", emb(0.5));
        assert_eq!(known.len(), 1);
    }
}
