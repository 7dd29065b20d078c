use std::path::PathBuf;

use crate::memory::domain::memory_store::ProfileStore;
use crate::memory::domain::profile::Profile;
use crate::shared::store_error::{write_atomically, StoreError};

use super::store_paths::person_file;

/// One pretty-printed JSON profile per person under `dir`.
pub struct JsonProfileStore {
    dir: PathBuf,
}

impl JsonProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn fresh(name: &str) -> Profile {
        Profile::new(name, chrono::Local::now().date_naive())
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self, name: &str) -> Profile {
        let path = person_file(&self.dir, name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::fresh(name),
            Err(e) => {
                log::warn!("Cannot read profile {}: {e}", path.display());
                return Self::fresh(name);
            }
        };
        match serde_json::from_str::<Profile>(&content) {
            Ok(mut profile) => {
                if profile.name.is_empty() {
                    profile.name = name.to_string();
                }
                profile
            }
            Err(e) => {
                log::warn!("Corrupt profile {}: {e}", path.display());
                Self::fresh(name)
            }
        }
    }

    fn save(&self, profile: &Profile) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(profile)?;
        write_atomically(&person_file(&self.dir, &profile.name), &json)
    }
}
