use crate::tracking::domain::track::TrackId;

/// Outcome of comparing an embedding against the known identities.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn name(&self) -> Option<&str> {
        match self {
            Identity::Known(name) => Some(name),
            Identity::Unknown => None,
        }
    }
}

/// Deduplication key for conversations: the resolved name, or the track
/// that produced an unresolved face.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKey {
    Name(String),
    Track(TrackId),
}

impl InteractionKey {
    pub fn for_identity(identity: &Identity, track_id: TrackId) -> Self {
        match identity {
            Identity::Known(name) => InteractionKey::Name(name.clone()),
            Identity::Unknown => InteractionKey::Track(track_id),
        }
    }
}

impl std::fmt::Display for InteractionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionKey::Name(name) => write!(f, "{name}"),
            InteractionKey::Track(id) => write!(f, "unknown face {id}"),
        }
    }
}
