pub mod json_conversation_log;
pub mod json_profile_store;
pub mod store_paths;
