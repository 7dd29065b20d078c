pub mod conversation_runner;
pub mod conversation_slot;
pub mod interaction_dispatcher;
