use std::sync::Arc;

use super::conversation_turn::ConversationTurn;
use super::memory_store::{ConversationLog, ProfileStore};
use super::profile::Profile;

/// What the dialogue model knows about a person before replying.
#[derive(Clone, Debug, PartialEq)]
pub struct DialogueContext {
    pub profile: Profile,
    pub history: Vec<ConversationTurn>,
}

/// Gathers profile and recent history for a reply.
#[derive(Clone)]
pub struct ContextAssembler {
    profiles: Arc<dyn ProfileStore>,
    log: Arc<dyn ConversationLog>,
    history_window: usize,
}

impl ContextAssembler {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        log: Arc<dyn ConversationLog>,
        history_window: usize,
    ) -> Self {
        Self {
            profiles,
            log,
            history_window,
        }
    }

    pub fn assemble(&self, name: &str) -> DialogueContext {
        DialogueContext {
            profile: self.profiles.load(name),
            history: self.log.recent(name, self.history_window),
        }
    }
}
