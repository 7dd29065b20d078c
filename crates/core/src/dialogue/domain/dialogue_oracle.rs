use crate::conversation::domain::conversation_state::ConversationState;
use crate::memory::domain::context_assembler::DialogueContext;
use crate::memory::domain::conversation_turn::ConversationTurn;
use crate::memory::domain::profile::Profile;

pub type OracleError = Box<dyn std::error::Error + Send + Sync>;

/// Input for one reply from the dialogue model.
#[derive(Clone, Debug)]
pub struct DialogueRequest {
    pub name: String,
    pub utterance: String,
    pub state: ConversationState,
    pub is_first_turn: bool,
    pub context: DialogueContext,
}

/// External language model producing replies and session summaries.
///
/// Calls block until the model answers; transport failures are errors.
pub trait DialogueOracle: Send + Sync {
    fn reply(&self, request: &DialogueRequest) -> Result<String, OracleError>;

    /// Raw model output describing the session; expected to contain a JSON
    /// object with summary fields.
    fn summarize(
        &self,
        name: &str,
        profile: &Profile,
        session: &[ConversationTurn],
    ) -> Result<String, OracleError>;
}
