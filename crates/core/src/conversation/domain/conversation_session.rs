use crate::identity::domain::identity::InteractionKey;
use crate::memory::domain::conversation_turn::ConversationTurn;

use super::conversation_state::ConversationState;
use super::intent_classifier::{Intent, IntentClassifier};

/// What the engine should do after hearing one transcript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnAction {
    /// Nothing was said; listen again.
    KeepListening,
    /// Too many consecutive silent turns; end without a farewell.
    EndSilent,
    /// Ask for a reply in the given state and keep talking.
    Reply(ConversationState),
    /// Speak a closing reply and end.
    Farewell,
}

/// Turn-taking state of one conversation, independent of any I/O.
///
/// `Greeting` moves to `FreeTalk` on the first substantive utterance and
/// never returns; a closing utterance moves to the terminal `Farewell`.
#[derive(Debug)]
pub struct ConversationSession {
    key: InteractionKey,
    state: ConversationState,
    turns: u32,
    silent_turns: u32,
    max_silent_turns: u32,
    transcript: Vec<ConversationTurn>,
}

impl ConversationSession {
    pub fn new(key: InteractionKey, max_silent_turns: u32) -> Self {
        Self {
            key,
            state: ConversationState::Greeting,
            turns: 0,
            silent_turns: 0,
            max_silent_turns: max_silent_turns.max(1),
            transcript: Vec::new(),
        }
    }

    pub fn key(&self) -> &InteractionKey {
        &self.key
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn silent_turns(&self) -> u32 {
        self.silent_turns
    }

    pub fn is_first_turn(&self) -> bool {
        self.turns == 0
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn transcript(&self) -> &[ConversationTurn] {
        &self.transcript
    }

    /// Advances the state machine with one (possibly empty) transcript.
    pub fn on_transcript(&mut self, text: &str, classifier: &dyn IntentClassifier) -> TurnAction {
        if self.is_finished() {
            return TurnAction::Farewell;
        }

        let text = text.trim();
        if text.is_empty() {
            self.silent_turns += 1;
            if self.silent_turns >= self.max_silent_turns {
                return TurnAction::EndSilent;
            }
            return TurnAction::KeepListening;
        }
        self.silent_turns = 0;

        let next = match (self.state, classifier.classify(text)) {
            (_, Intent::Close) => ConversationState::Farewell,
            (ConversationState::Greeting, Intent::LightGreeting) => ConversationState::Greeting,
            _ => ConversationState::FreeTalk,
        };
        if next != self.state {
            log::info!("Conversation with {}: {} -> {}", self.key, self.state, next);
            self.state = next;
        }

        if next.is_terminal() {
            TurnAction::Farewell
        } else {
            TurnAction::Reply(next)
        }
    }

    /// Records a completed exchange. Counts towards `is_first_turn`.
    pub fn record_turn(&mut self, turn: ConversationTurn) {
        self.turns += 1;
        self.transcript.push(turn);
    }
}
