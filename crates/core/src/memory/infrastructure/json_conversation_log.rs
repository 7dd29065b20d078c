use std::path::PathBuf;
use std::sync::Mutex;

use crate::memory::domain::conversation_turn::ConversationTurn;
use crate::memory::domain::memory_store::ConversationLog;
use crate::shared::store_error::{write_atomically, StoreError};

use super::store_paths::person_file;

/// One JSON array of turns per person under `dir`.
pub struct JsonConversationLog {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonConversationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self, name: &str) -> Result<Vec<ConversationTurn>, StoreError> {
        let path = person_file(&self.dir, name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt { path, source })
    }
}

impl ConversationLog for JsonConversationLog {
    fn append(&self, name: &str, turn: &ConversationTurn) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut turns = match self.read_all(name) {
            Ok(turns) => turns,
            Err(StoreError::Corrupt { path, source }) => {
                log::warn!("Starting a new log, {} is unreadable: {source}", path.display());
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        turns.push(turn.clone());
        let json = serde_json::to_vec_pretty(&turns)?;
        write_atomically(&person_file(&self.dir, name), &json)
    }

    fn recent(&self, name: &str, window: usize) -> Vec<ConversationTurn> {
        match self.read_all(name) {
            Ok(turns) => {
                let start = turns.len().saturating_sub(window);
                turns[start..].to_vec()
            }
            Err(e) => {
                log::warn!("Ignoring conversation history of {name}: {e}");
                Vec::new()
            }
        }
    }
}
