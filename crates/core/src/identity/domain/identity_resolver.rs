use crate::perception::domain::embedding::Embedding;

use super::identity::Identity;
use super::known_identities::KnownIdentities;

/// Matches fresh embeddings against the known identities.
///
/// The first identity, in registration order, whose Euclidean distance is
/// strictly below the threshold wins. When several identities are within
/// the threshold the earliest registered one is returned, not the nearest.
#[derive(Clone)]
pub struct IdentityResolver {
    known: KnownIdentities,
    threshold: f32,
}

impl IdentityResolver {
    pub fn new(known: KnownIdentities, threshold: f32) -> Self {
        Self { known, threshold }
    }

    pub fn resolve(&self, embedding: &Embedding) -> Identity {
        self.known.with_entries(|entries| {
            entries
                .iter()
                .find(|(_, stored)| stored.distance(embedding) < self.threshold)
                .map(|(name, _)| Identity::Known(name.clone()))
                .unwrap_or(Identity::Unknown)
        })
    }

    pub fn known(&self) -> &KnownIdentities {
        &self.known
    }
}
