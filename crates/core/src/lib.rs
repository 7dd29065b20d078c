pub mod conversation;
pub mod dialogue;
pub mod identity;
pub mod interaction;
pub mod memory;
pub mod perception;
pub mod pipeline;
pub mod shared;
pub mod speech;
pub mod tracking;
pub mod video;
