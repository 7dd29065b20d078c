//! Decides whether a recognized face starts a new conversation.
//!
//! All bookkeeping (active registry and greeting timestamps) sits behind one
//! mutex. Conversations additionally hold the global [`ConversationSlot`] for
//! their whole lifetime, so at most one runs at a time. The capture loop only
//! ever *tries* to start one and never waits for a conversation to finish.
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::identity::domain::identity::InteractionKey;
use crate::shared::shutdown::ShutdownSignal;

use super::conversation_runner::{ConversationRequest, ConversationRunner};
use super::conversation_slot::{ConversationSlot, SlotGuard};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn conversation thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("shutting down, no new conversations")]
    ShuttingDown,
}

/// What the dispatcher did with a recognized face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchDecision {
    /// A new conversation was spawned.
    Started,
    /// A conversation for the same key is still running; only its greeting
    /// timestamp was refreshed.
    AlreadyActive,
    /// The key was greeted too recently.
    CoolingDown,
    /// Another conversation holds the global slot; try again on a later frame.
    SlotBusy,
}

struct ActiveInteraction {
    generation: u64,
    /// `None` while the thread is being spawned.
    _handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct DispatcherState {
    active: HashMap<InteractionKey, ActiveInteraction>,
    greeted: HashMap<InteractionKey, Instant>,
    next_generation: u64,
}

struct Shared {
    state: Mutex<DispatcherState>,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

type ThreadMain = Box<dyn FnOnce() + Send + 'static>;
type Spawner = fn(String, ThreadMain) -> std::io::Result<JoinHandle<()>>;

fn spawn_named(name: String, main: ThreadMain) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new().name(name).spawn(main)
}

pub struct InteractionDispatcher {
    shared: Arc<Shared>,
    slot: ConversationSlot,
    runner: Arc<dyn ConversationRunner>,
    cooldown: Duration,
    shutdown: ShutdownSignal,
    spawner: Spawner,
}

impl InteractionDispatcher {
    pub fn new(
        runner: Arc<dyn ConversationRunner>,
        cooldown: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DispatcherState::default()),
                idle: Condvar::new(),
            }),
            slot: ConversationSlot::new(),
            runner,
            cooldown,
            shutdown,
            spawner: spawn_named,
        }
    }

    #[cfg(test)]
    fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn dispatch(&self, request: ConversationRequest) -> Result<DispatchDecision, DispatchError> {
        self.dispatch_at(request, Instant::now())
    }

    /// Same as [`dispatch`](Self::dispatch) with an explicit clock reading.
    pub fn dispatch_at(
        &self,
        request: ConversationRequest,
        now: Instant,
    ) -> Result<DispatchDecision, DispatchError> {
        if self.shutdown.is_triggered() {
            return Err(DispatchError::ShuttingDown);
        }

        let mut state = self.shared.lock();
        let key = request.key.clone();

        if state.active.contains_key(&key) {
            state.greeted.insert(key, now);
            return Ok(DispatchDecision::AlreadyActive);
        }

        if let Some(&last) = state.greeted.get(&key) {
            if now.saturating_duration_since(last) <= self.cooldown {
                return Ok(DispatchDecision::CoolingDown);
            }
        }

        let Some(slot_guard) = self.slot.try_acquire() else {
            log::debug!("Conversation slot busy, deferring {key}");
            return Ok(DispatchDecision::SlotBusy);
        };

        // Reserve the key, then spawn with the lock released: a failed spawn
        // drops the thread's `Registration`, which takes the lock itself.
        let generation = state.next_generation;
        state.next_generation += 1;
        state.active.insert(
            key.clone(),
            ActiveInteraction {
                generation,
                _handle: None,
            },
        );
        let previous_greeting = self.remember_greeting(&mut state, key.clone(), now);
        drop(state);

        match self.spawn_conversation(request, generation, slot_guard) {
            Ok(handle) => {
                let mut state = self.shared.lock();
                if let Some(active) = state.active.get_mut(&key) {
                    if active.generation == generation {
                        active._handle = Some(handle);
                    }
                }
                log::info!("Starting conversation with {key}");
                Ok(DispatchDecision::Started)
            }
            Err(e) => {
                let mut state = self.shared.lock();
                match previous_greeting {
                    Some(last) => state.greeted.insert(key, last),
                    None => state.greeted.remove(&key),
                };
                Err(e.into())
            }
        }
    }

    /// Records a greeting and forgets every greeting whose cooldown has run
    /// out. Returns the key's previous timestamp.
    fn remember_greeting(
        &self,
        state: &mut DispatcherState,
        key: InteractionKey,
        now: Instant,
    ) -> Option<Instant> {
        let cooldown = self.cooldown;
        state
            .greeted
            .retain(|_, last| now.saturating_duration_since(*last) <= cooldown);
        state.greeted.insert(key, now)
    }

    pub fn is_active(&self, key: &InteractionKey) -> bool {
        self.shared.lock().active.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.shared.lock().active.len()
    }

    /// Blocks until no conversation is registered, or `timeout` elapses.
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, _) = self
            .shared
            .idle
            .wait_timeout_while(state, timeout, |s| !s.active.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        state.active.is_empty()
    }

    fn spawn_conversation(
        &self,
        request: ConversationRequest,
        generation: u64,
        slot_guard: SlotGuard,
    ) -> Result<JoinHandle<()>, std::io::Error> {
        let registration = Registration {
            shared: self.shared.clone(),
            key: request.key.clone(),
            generation,
        };
        let runner = self.runner.clone();

        (self.spawner)(
            format!("conversation-{generation}"),
            Box::new(move || {
                // Dropped in reverse order: the slot is freed before the
                // registry entry disappears.
                let _registration = registration;
                let _slot = slot_guard;
                run_guarded(&*runner, request);
            }),
        )
    }
}

/// Runs the conversation, logging errors and panics instead of letting them
/// escape the task.
fn run_guarded(runner: &dyn ConversationRunner, request: ConversationRequest) {
    let key = request.key.clone();
    match std::panic::catch_unwind(AssertUnwindSafe(|| runner.run(request))) {
        Ok(Ok(())) => log::info!("Conversation with {key} finished"),
        Ok(Err(e)) => log::error!("Conversation with {key} failed: {e}"),
        Err(_) => log::error!("Conversation with {key} panicked"),
    }
}

/// Removes the registry entry when the conversation thread ends, however it
/// ends.
struct Registration {
    shared: Arc<Shared>,
    key: InteractionKey,
    generation: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let owned = state
            .active
            .get(&self.key)
            .is_some_and(|a| a.generation == self.generation);
        if owned {
            state.active.remove(&self.key);
        }
        drop(state);
        self.shared.idle.notify_all();
    }
}
