pub mod conversation_session;
pub mod conversation_state;
pub mod intent_classifier;
pub mod name_extractor;
pub mod reply_cleaner;
