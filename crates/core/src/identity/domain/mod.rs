pub mod identity;
pub mod identity_registry;
pub mod identity_resolver;
pub mod identity_store;
pub mod known_identities;
