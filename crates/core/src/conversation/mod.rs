pub mod conversation_engine;
pub mod domain;
pub mod infrastructure;
