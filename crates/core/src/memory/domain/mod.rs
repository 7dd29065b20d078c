pub mod context_assembler;
pub mod conversation_turn;
pub mod memory_store;
pub mod profile;
pub mod profile_summary;
