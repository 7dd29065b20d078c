use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{
    APP_DIR_NAME, EMBEDDING_INTERVAL_SECS, IDENTITY_MATCH_THRESHOLD, IOU_MATCH_THRESHOLD,
    MAX_COAST_FRAMES, MAX_SILENT_TURNS, REGREET_COOLDOWN_SECS, SAMPLE_RATE, TRACKER_MAX_LOST,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tracking: TrackingSettings,
    pub perception: PerceptionSettings,
    pub interaction: InteractionSettings,
    pub conversation: ConversationSettings,
    pub audio: AudioSettings,
    pub oracle: OracleSettings,
    pub storage: StorageSettings,
    pub models: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub max_lost_frames: u32,
    pub iou_threshold: f64,
    pub embedding_interval_secs: f64,
    pub max_coast_frames: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSettings {
    pub detection_request_capacity: usize,
    pub detection_result_capacity: usize,
    pub embedding_request_capacity: usize,
    pub embedding_result_capacity: usize,
    pub min_face_size: i32,
    pub min_confidence: f64,
    pub embedding_margin: i32,
    pub dequeue_timeout_ms: u64,
    pub frame_width: u32,
    pub frame_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    pub regreet_cooldown_secs: f64,
    pub match_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    pub max_silent_turns: u32,
    pub listen_max_secs: f64,
    pub name_listen_max_secs: f64,
    pub reply_timeout_secs: f64,
    pub speak_timeout_secs: f64,
    pub listen_slack_secs: f64,
    pub greeting_pause_ms: u64,
    pub reply_pause_ms: u64,
    pub history_window: usize,
    pub summarize: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub silence_limit_secs: f64,
    pub silence_hangover_secs: f64,
    pub speech_max_secs: f64,
    pub energy_threshold: f32,
    pub capture_command: Vec<String>,
    pub speak_command: Vec<String>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub url: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root for identities, profiles and conversation logs. Defaults to the
    /// platform data directory.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Directory searched for model files before the download cache.
    pub model_dir: Option<PathBuf>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            max_lost_frames: TRACKER_MAX_LOST,
            iou_threshold: IOU_MATCH_THRESHOLD,
            embedding_interval_secs: EMBEDDING_INTERVAL_SECS,
            max_coast_frames: MAX_COAST_FRAMES,
        }
    }
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            detection_request_capacity: 1,
            detection_result_capacity: 4,
            embedding_request_capacity: 4,
            embedding_result_capacity: 8,
            min_face_size: 80,
            min_confidence: 0.9,
            embedding_margin: 10,
            dequeue_timeout_ms: 100,
            frame_width: 640,
            frame_height: 480,
        }
    }
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            regreet_cooldown_secs: REGREET_COOLDOWN_SECS,
            match_threshold: IDENTITY_MATCH_THRESHOLD,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            max_silent_turns: MAX_SILENT_TURNS,
            listen_max_secs: 6.0,
            name_listen_max_secs: 8.0,
            reply_timeout_secs: 20.0,
            speak_timeout_secs: 30.0,
            listen_slack_secs: 5.0,
            greeting_pause_ms: 1500,
            reply_pause_ms: 1200,
            history_window: 7,
            summarize: true,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            silence_limit_secs: 3.2,
            silence_hangover_secs: 0.8,
            speech_max_secs: 20.0,
            energy_threshold: 0.02,
            capture_command: ["arecord", "-q", "-t", "raw", "-f", "S16_LE", "-c", "1", "-r", "16000"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            speak_command: ["espeak-ng", "-v", "it"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            language: "it".to_string(),
        }
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "llama3".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl TrackingSettings {
    pub fn embedding_interval(&self) -> Duration {
        Duration::from_secs_f64(self.embedding_interval_secs)
    }
}

impl PerceptionSettings {
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }
}

impl InteractionSettings {
    pub fn regreet_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.regreet_cooldown_secs)
    }
}

impl ConversationSettings {
    pub fn listen_max(&self) -> Duration {
        Duration::from_secs_f64(self.listen_max_secs)
    }

    pub fn name_listen_max(&self) -> Duration {
        Duration::from_secs_f64(self.name_listen_max_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.reply_timeout_secs)
    }

    pub fn speak_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.speak_timeout_secs)
    }

    /// Deadline for a listen call: the capture window plus transcription slack.
    pub fn listen_timeout(&self, max_duration: Duration) -> Duration {
        max_duration + Duration::from_secs_f64(self.listen_slack_secs)
    }

    pub fn greeting_pause(&self) -> Duration {
        Duration::from_millis(self.greeting_pause_ms)
    }

    pub fn reply_pause(&self) -> Duration {
        Duration::from_millis(self.reply_pause_ms)
    }
}

impl StorageSettings {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME)
        })
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads settings from an explicit file. Missing fields take defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from the platform config directory, falling back to
    /// defaults when the file is absent or unusable.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings file: {e}");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=1.0).contains(&self.tracking.iou_threshold) {
            return Err(SettingsError::Invalid {
                field: "tracking.iou_threshold",
                reason: format!("must be within 0.0-1.0, got {}", self.tracking.iou_threshold),
            });
        }
        if self.perception.detection_request_capacity == 0
            || self.perception.embedding_request_capacity == 0
        {
            return Err(SettingsError::Invalid {
                field: "perception",
                reason: "request queue capacities must be at least 1".to_string(),
            });
        }
        if self.conversation.max_silent_turns == 0 {
            return Err(SettingsError::Invalid {
                field: "conversation.max_silent_turns",
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, secs) in [
            ("tracking.embedding_interval_secs", self.tracking.embedding_interval_secs),
            ("interaction.regreet_cooldown_secs", self.interaction.regreet_cooldown_secs),
            ("conversation.listen_max_secs", self.conversation.listen_max_secs),
            ("conversation.name_listen_max_secs", self.conversation.name_listen_max_secs),
            ("conversation.reply_timeout_secs", self.conversation.reply_timeout_secs),
            ("conversation.speak_timeout_secs", self.conversation.speak_timeout_secs),
            ("conversation.listen_slack_secs", self.conversation.listen_slack_secs),
            ("audio.silence_limit_secs", self.audio.silence_limit_secs),
            ("audio.silence_hangover_secs", self.audio.silence_hangover_secs),
            ("audio.speech_max_secs", self.audio.speech_max_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: format!("must be a non-negative number of seconds, got {secs}"),
                });
            }
        }
        if self.audio.capture_command.is_empty() || self.audio.speak_command.is_empty() {
            return Err(SettingsError::Invalid {
                field: "audio",
                reason: "capture_command and speak_command must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
