use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::conversation::domain::conversation_session::{ConversationSession, TurnAction};
use crate::conversation::domain::conversation_state::ConversationState;
use crate::conversation::domain::intent_classifier::{IntentClassifier, KeywordIntentClassifier};
use crate::conversation::domain::name_extractor::NameExtractor;
use crate::conversation::domain::reply_cleaner::clean_reply;
use crate::conversation::infrastructure::task_queue::{TaskError, TaskQueue};
use crate::dialogue::domain::dialogue_oracle::{DialogueOracle, DialogueRequest};
use crate::identity::domain::identity_registry::IdentityRegistry;
use crate::interaction::conversation_runner::{ConversationRequest, ConversationRunner, RunnerError};
use crate::memory::domain::context_assembler::ContextAssembler;
use crate::memory::domain::conversation_turn::ConversationTurn;
use crate::memory::domain::memory_store::{ConversationLog, ProfileStore};
use crate::memory::domain::profile_summary::ProfileSummary;
use crate::shared::settings::ConversationSettings;
use crate::shared::shutdown::ShutdownSignal;
use crate::speech::domain::speech_recognizer::{ListenPolicy, SpeechRecognizer};
use crate::speech::domain::speech_synthesizer::SpeechSynthesizer;

/// Attempts at getting a name from an unknown face before giving up.
const NAME_ATTEMPTS: usize = 2;

const ASK_NAME: &str = "Ciao, piacere di conoscerti! Come ti chiami?";
const ASK_NAME_AGAIN: &str = "Scusa, non ho capito. Come ti chiami?";

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("speech output failed: {0}")]
    Speak(String),
}

/// How a conversation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationOutcome {
    Farewell,
    SilenceTimeout,
    Interrupted,
    /// An unknown face never told us its name.
    NoName,
}

/// Collaborators a conversation talks to.
#[derive(Clone)]
pub struct ConversationServices {
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub oracle: Arc<dyn DialogueOracle>,
    pub identities: IdentityRegistry,
    pub profiles: Arc<dyn ProfileStore>,
    pub log: Arc<dyn ConversationLog>,
}

/// Runs the turn-based voice dialogue for one face.
///
/// Speech calls go through `speech_queue` and model calls through
/// `oracle_queue`; every wait is bounded by a timeout so a hung collaborator
/// only costs one turn.
pub struct ConversationEngine {
    services: ConversationServices,
    speech_queue: Arc<TaskQueue>,
    oracle_queue: Arc<TaskQueue>,
    context: ContextAssembler,
    classifier: Box<dyn IntentClassifier>,
    names: NameExtractor,
    settings: ConversationSettings,
    shutdown: ShutdownSignal,
}

impl ConversationEngine {
    pub fn new(
        services: ConversationServices,
        speech_queue: Arc<TaskQueue>,
        oracle_queue: Arc<TaskQueue>,
        settings: ConversationSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        let context = ContextAssembler::new(
            services.profiles.clone(),
            services.log.clone(),
            settings.history_window,
        );
        Self {
            services,
            speech_queue,
            oracle_queue,
            context,
            classifier: Box::new(KeywordIntentClassifier::new()),
            names: NameExtractor::new(),
            settings,
            shutdown,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn converse(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationOutcome, ConversationError> {
        let name = match request.identity.name() {
            Some(name) => {
                self.say(&format!("Ciao {name}!"))?;
                name.to_string()
            }
            None => match self.learn_name(request)? {
                Some(name) => name,
                None => return Ok(ConversationOutcome::NoName),
            },
        };
        pause(self.settings.greeting_pause());

        let mut session = ConversationSession::new(request.key.clone(), self.settings.max_silent_turns);
        let listen = ListenPolicy::new(self.settings.listen_max());

        let outcome = loop {
            if self.shutdown.is_triggered() {
                break ConversationOutcome::Interrupted;
            }
            let transcript = self.listen(listen);
            match session.on_transcript(&transcript, self.classifier.as_ref()) {
                TurnAction::KeepListening => continue,
                TurnAction::EndSilent => {
                    log::info!("No speech from {name} for {} turns", session.silent_turns());
                    break ConversationOutcome::SilenceTimeout;
                }
                TurnAction::Reply(state) => {
                    self.respond(&name, &transcript, state, &mut session)?;
                    pause(self.settings.reply_pause());
                }
                TurnAction::Farewell => {
                    self.respond(&name, &transcript, ConversationState::Farewell, &mut session)?;
                    break ConversationOutcome::Farewell;
                }
            }
        };

        log::info!(
            "Conversation with {} ended after {} turns: {outcome:?}",
            session.key(),
            session.turns()
        );
        if self.settings.summarize {
            self.summarize(&name, session.transcript());
        }
        Ok(outcome)
    }

    /// Asks an unknown face for its name and registers it with the embedding
    /// that triggered the conversation.
    fn learn_name(&self, request: &ConversationRequest) -> Result<Option<String>, ConversationError> {
        self.say(ASK_NAME)?;
        let policy = ListenPolicy::new(self.settings.name_listen_max());

        for attempt in 1..=NAME_ATTEMPTS {
            if self.shutdown.is_triggered() {
                return Ok(None);
            }
            let transcript = self.listen(policy);
            if let Some(name) = self.names.extract(&transcript) {
                if let Err(e) = self.services.identities.register(&name, request.embedding.clone()) {
                    log::warn!("Failed to persist identity {name}: {e}");
                }
                log::info!("Registered new identity {name} from {}", request.track_id);
                self.say(&format!("Piacere, {name}!"))?;
                return Ok(Some(name));
            }
            if attempt < NAME_ATTEMPTS {
                self.say(ASK_NAME_AGAIN)?;
            }
        }
        log::info!("No name obtained for {}", request.key);
        Ok(None)
    }

    fn respond(
        &self,
        name: &str,
        utterance: &str,
        state: ConversationState,
        session: &mut ConversationSession,
    ) -> Result<(), ConversationError> {
        let request = DialogueRequest {
            name: name.to_string(),
            utterance: utterance.to_string(),
            state,
            is_first_turn: session.is_first_turn(),
            context: self.context.assemble(name),
        };
        let oracle = self.services.oracle.clone();
        let raw = match self
            .oracle_queue
            .submit(move || oracle.reply(&request))
            .wait(self.settings.reply_timeout())
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("Dialogue model failed for {name}: {e}");
                String::new()
            }
            Err(e) => {
                log::warn!("Dialogue model for {name}: {e}");
                String::new()
            }
        };

        let reply = clean_reply(&raw, state, session.is_first_turn());
        if reply.is_empty() {
            return Ok(());
        }
        self.say(&reply)?;

        let turn = ConversationTurn::now(utterance, reply);
        if let Err(e) = self.services.log.append(name, &turn) {
            log::warn!("Failed to log turn for {name}: {e}");
        }
        session.record_turn(turn);
        Ok(())
    }

    /// A speak that outlives its deadline only costs the current line; a
    /// failing or vanished speech output ends the conversation.
    fn say(&self, text: &str) -> Result<(), ConversationError> {
        let synthesizer = self.services.synthesizer.clone();
        let owned = text.to_string();
        let deadline = self.settings.speak_timeout();
        match self
            .speech_queue
            .submit(move || synthesizer.speak(&owned))
            .wait(deadline)
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConversationError::Speak(e.to_string())),
            Err(TaskError::Timeout(_)) => {
                log::warn!("Speech output timed out after {deadline:?}");
                Ok(())
            }
            Err(e) => Err(ConversationError::Speak(e.to_string())),
        }
    }

    /// A failed or timed-out listen counts as silence.
    fn listen(&self, policy: ListenPolicy) -> String {
        let recognizer = self.services.recognizer.clone();
        let deadline = self.settings.listen_timeout(policy.max_duration);
        match self
            .speech_queue
            .submit(move || recognizer.listen(&policy))
            .wait(deadline)
        {
            Ok(Ok(text)) => text.trim().to_string(),
            Ok(Err(e)) => {
                log::warn!("Speech recognition failed: {e}");
                String::new()
            }
            Err(TaskError::Timeout(_)) => {
                log::warn!("Speech recognition timed out after {deadline:?}");
                String::new()
            }
            Err(e) => {
                log::warn!("Speech recognition: {e}");
                String::new()
            }
        }
    }

    /// Folds the session into the long-term profile. Failures are logged.
    fn summarize(&self, name: &str, session: &[ConversationTurn]) {
        if session.is_empty() {
            return;
        }
        let mut profile = self.services.profiles.load(name);
        let oracle = self.services.oracle.clone();
        let (owned_name, owned_profile, owned_session) =
            (name.to_string(), profile.clone(), session.to_vec());
        let response = match self
            .oracle_queue
            .submit(move || oracle.summarize(&owned_name, &owned_profile, &owned_session))
            .wait(self.settings.reply_timeout())
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("Summary for {name} failed: {e}");
                return;
            }
            Err(e) => {
                log::warn!("Summary for {name}: {e}");
                return;
            }
        };

        let Some(summary) = ProfileSummary::from_response(&response) else {
            log::warn!("Summary for {name} contained no JSON object");
            return;
        };
        profile.merge_summary(&summary, session, chrono::Local::now().naive_local());
        match self.services.profiles.save(&profile) {
            Ok(()) => log::info!("Updated profile for {name}"),
            Err(e) => log::warn!("Failed to save profile for {name}: {e}"),
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

impl ConversationRunner for ConversationEngine {
    fn run(&self, request: ConversationRequest) -> Result<(), RunnerError> {
        log::info!("Starting conversation with {}", request.key);
        self.converse(&request)?;
        Ok(())
    }
}
