use crate::shared::store_error::StoreError;

use super::conversation_turn::ConversationTurn;
use super::profile::Profile;

/// Append-only per-person log of conversation turns.
pub trait ConversationLog: Send + Sync {
    fn append(&self, name: &str, turn: &ConversationTurn) -> Result<(), StoreError>;

    /// The last `window` turns, oldest first. Missing or unreadable logs
    /// yield an empty history.
    fn recent(&self, name: &str, window: usize) -> Vec<ConversationTurn>;
}

/// Per-person long-term profile.
pub trait ProfileStore: Send + Sync {
    /// The stored profile, or a fresh one when none exists or it cannot be
    /// read.
    fn load(&self, name: &str) -> Profile;

    fn save(&self, profile: &Profile) -> Result<(), StoreError>;
}
