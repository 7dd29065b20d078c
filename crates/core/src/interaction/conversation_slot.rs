use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-occupancy slot serializing conversations process-wide.
#[derive(Clone, Default)]
pub struct ConversationSlot {
    occupied: Arc<AtomicBool>,
}

/// Holds the slot until dropped.
#[must_use = "the slot is released as soon as the guard is dropped"]
pub struct SlotGuard {
    occupied: Arc<AtomicBool>,
}

impl ConversationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the slot without waiting. `None` when another conversation holds it.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.occupied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard {
                occupied: self.occupied.clone(),
            })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.occupied.store(false, Ordering::Release);
    }
}
