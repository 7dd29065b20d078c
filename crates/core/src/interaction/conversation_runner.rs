use crate::identity::domain::identity::{Identity, InteractionKey};
use crate::perception::domain::embedding::Embedding;
use crate::tracking::domain::track::TrackId;

pub type RunnerError = Box<dyn std::error::Error + Send + Sync>;

/// Everything a conversation needs to know about the face that triggered it.
#[derive(Clone, Debug)]
pub struct ConversationRequest {
    pub key: InteractionKey,
    pub identity: Identity,
    pub embedding: Embedding,
    pub track_id: TrackId,
}

/// Runs one whole conversation, blocking the calling thread until it ends.
pub trait ConversationRunner: Send + Sync {
    fn run(&self, request: ConversationRequest) -> Result<(), RunnerError>;
}
