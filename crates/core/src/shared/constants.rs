pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

pub const WHISPER_MODEL_NAME: &str = "ggml-small.bin";
pub const WHISPER_MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin";

pub const APP_DIR_NAME: &str = "FaceTalk";

/// Layout of the data directory.
pub const IDENTITIES_FILE: &str = "embeddings.json";
pub const PROFILES_DIR: &str = "profiles";
pub const CONVERSATIONS_DIR: &str = "conversations";

/// Consecutive lost frames after which a track is removed.
pub const TRACKER_MAX_LOST: u32 = 15;
pub const IOU_MATCH_THRESHOLD: f64 = 0.3;
pub const EMBEDDING_INTERVAL_SECS: f64 = 20.0;
/// Frames a track may be carried by prediction alone before prediction fails.
pub const MAX_COAST_FRAMES: u32 = 5;

pub const REGREET_COOLDOWN_SECS: f64 = 30.0;
/// Euclidean distance under which two embeddings are the same person.
pub const IDENTITY_MATCH_THRESHOLD: f32 = 1.0;

pub const MAX_SILENT_TURNS: u32 = 3;
pub const SAMPLE_RATE: u32 = 16000;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
