use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};

use facetalk_core::conversation::conversation_engine::{ConversationEngine, ConversationServices};
use facetalk_core::conversation::infrastructure::task_queue::TaskQueue;
use facetalk_core::dialogue::infrastructure::ollama_oracle::OllamaOracle;
use facetalk_core::identity::domain::identity_registry::IdentityRegistry;
use facetalk_core::identity::domain::identity_resolver::IdentityResolver;
use facetalk_core::identity::domain::identity_store::IdentityStore;
use facetalk_core::identity::infrastructure::json_identity_store::JsonIdentityStore;
use facetalk_core::interaction::interaction_dispatcher::InteractionDispatcher;
use facetalk_core::memory::infrastructure::json_conversation_log::JsonConversationLog;
use facetalk_core::memory::infrastructure::json_profile_store::JsonProfileStore;
use facetalk_core::perception::domain::face_detector::FaceDetector;
use facetalk_core::perception::domain::face_embedder::FaceEmbedder;
use facetalk_core::perception::infrastructure::filtered_face_detector::FilteredFaceDetector;
use facetalk_core::perception::infrastructure::onnx_face_detector::{
    OnnxFaceDetector, DEFAULT_CONFIDENCE,
};
use facetalk_core::perception::infrastructure::onnx_face_embedder::OnnxFaceEmbedder;
use facetalk_core::perception::infrastructure::onnx_session::default_intra_threads;
use facetalk_core::perception::infrastructure::perception_worker::{
    DetectionTask, EmbeddingTask, PerceptionWorker, WorkerConfig,
};
use facetalk_core::pipeline::frame_processor::FrameProcessor;
use facetalk_core::pipeline::recognition_loop::{RecognitionContext, RecognitionLoop};
use facetalk_core::shared::constants::{
    CONVERSATIONS_DIR, DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EMBEDDING_MODEL_NAME,
    EMBEDDING_MODEL_URL, IDENTITIES_FILE, IMAGE_EXTENSIONS, PROFILES_DIR, WHISPER_MODEL_NAME,
    WHISPER_MODEL_URL,
};
use facetalk_core::shared::model_resolver::ModelResolver;
use facetalk_core::shared::settings::Settings;
use facetalk_core::shared::shutdown::ShutdownSignal;
use facetalk_core::speech::domain::speech_recognizer::SpeechRecognizer;
use facetalk_core::speech::domain::speech_synthesizer::SpeechSynthesizer;
use facetalk_core::speech::infrastructure::command_speech_synthesizer::CommandSpeechSynthesizer;
use facetalk_core::speech::infrastructure::console_speech::{ConsoleInput, ConsoleSpeech};
use facetalk_core::speech::infrastructure::microphone_recognizer::MicrophoneRecognizer;
use facetalk_core::speech::infrastructure::whisper_transcriber::WhisperTranscriber;
use facetalk_core::tracking::domain::box_predictor::VelocityPredictor;
use facetalk_core::tracking::domain::embedding_rate_limiter::EmbeddingRateLimiter;
use facetalk_core::tracking::domain::track_manager::{TrackManager, TrackManagerConfig};
use facetalk_core::video::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facetalk_core::video::infrastructure::image_loader::load_image_frame;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Listen time per turn when replies are typed rather than spoken.
const TEXT_MODE_LISTEN_SECS: f64 = 30.0;

/// Recognizes faces from a camera and holds voice conversations with them.
///
/// Type `q` and Enter to quit.
#[derive(Parser)]
#[command(name = "facetalk")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Settings file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding identities, profiles and conversation logs.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory searched for model files before the download cache.
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Camera device or video file (default: the platform's first camera).
    #[arg(long)]
    input: Option<String>,

    /// Capture demuxer, e.g. v4l2, avfoundation or dshow.
    #[arg(long)]
    input_format: Option<String>,

    /// Read replies from the terminal and print the robot's lines instead of
    /// using microphone and speaker.
    #[arg(long)]
    text_mode: bool,

    /// Language model used for replies.
    #[arg(long)]
    llm: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the largest face in an image under a name.
    Register {
        /// Name to greet the person with.
        name: String,
        /// Image containing the person's face.
        image: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    let resolver = ModelResolver::with_default_cache(settings.models.model_dir.clone())?;

    match &cli.command {
        Some(Command::Register { name, image }) => register(&settings, &resolver, name, image),
        None => run_live(&cli, settings, &resolver),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings, BoxError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    if let Some(dir) = &cli.data_dir {
        settings.storage.data_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.model_dir {
        settings.models.model_dir = Some(dir.clone());
    }
    if let Some(model) = &cli.llm {
        settings.oracle.model = model.clone();
    }
    if cli.text_mode {
        let conversation = &mut settings.conversation;
        conversation.listen_max_secs = conversation.listen_max_secs.max(TEXT_MODE_LISTEN_SECS);
        conversation.name_listen_max_secs =
            conversation.name_listen_max_secs.max(TEXT_MODE_LISTEN_SECS);
    }
    settings.validate()?;
    Ok(settings)
}

fn register(
    settings: &Settings,
    resolver: &ModelResolver,
    name: &str,
    image: &Path,
) -> Result<(), BoxError> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name must not be empty".into());
    }
    if !is_image(image) {
        return Err(format!(
            "Unsupported image {}, expected one of: {}",
            image.display(),
            IMAGE_EXTENSIONS.join(", ")
        )
        .into());
    }
    let frame = load_image_frame(image)?;

    let mut detector = build_detector(settings, resolver)?;
    let detections = detector.detect(&frame)?;
    let face = detections
        .iter()
        .max_by(|a, b| a.region.area().total_cmp(&b.region.area()))
        .ok_or_else(|| format!("No face found in {}", image.display()))?;
    if detections.len() > 1 {
        log::warn!(
            "{} faces found in {}, using the largest",
            detections.len(),
            image.display()
        );
    }

    let mut embedder = build_embedder(settings, resolver)?;
    let embedding = embedder.embed(&frame, &face.region)?;

    let registry = open_identities(settings)?;
    registry.register(name, embedding)?;
    log::info!(
        "Registered {name} ({} known identities)",
        registry.known().len()
    );
    Ok(())
}

fn run_live(
    cli: &Cli,
    settings: Settings,
    resolver: &ModelResolver,
) -> Result<(), BoxError> {
    let shutdown = ShutdownSignal::new();
    let data_dir = settings.storage.resolved_data_dir();
    log::info!("Data directory: {}", data_dir.display());

    let identities = open_identities(&settings)?;
    if identities.known().is_empty() {
        log::info!("No known identities yet, every face starts as unknown");
    } else {
        log::info!("Known identities: {}", identities.known().names().join(", "));
    }

    let perception = &settings.perception;
    let detection = PerceptionWorker::spawn(
        "detection",
        DetectionTask::new(build_detector(&settings, resolver)?),
        WorkerConfig {
            request_capacity: perception.detection_request_capacity,
            result_capacity: perception.detection_result_capacity,
            dequeue_timeout: perception.dequeue_timeout(),
        },
        shutdown.clone(),
    )?;
    let embedding = PerceptionWorker::spawn(
        "embedding",
        EmbeddingTask::new(build_embedder(&settings, resolver)?),
        WorkerConfig {
            request_capacity: perception.embedding_request_capacity,
            result_capacity: perception.embedding_result_capacity,
            dequeue_timeout: perception.dequeue_timeout(),
        },
        shutdown.clone(),
    )?;

    let (synthesizer, recognizer, console) = build_speech(cli.text_mode, &settings, resolver)?;
    let oracle = OllamaOracle::new(
        &settings.oracle.url,
        &settings.oracle.model,
        Duration::from_secs(settings.oracle.request_timeout_secs),
    )?;
    log::info!("Dialogue model {} at {}", oracle.model(), settings.oracle.url);

    let services = ConversationServices {
        synthesizer,
        recognizer,
        oracle: Arc::new(oracle),
        identities: identities.clone(),
        profiles: Arc::new(JsonProfileStore::new(data_dir.join(PROFILES_DIR))),
        log: Arc::new(JsonConversationLog::new(data_dir.join(CONVERSATIONS_DIR))),
    };
    let speech_queue = Arc::new(TaskQueue::spawn("speech")?);
    let oracle_queue = Arc::new(TaskQueue::spawn("oracle")?);
    let engine = ConversationEngine::new(
        services,
        speech_queue.clone(),
        oracle_queue.clone(),
        settings.conversation.clone(),
        shutdown.clone(),
    );
    let dispatcher = Arc::new(InteractionDispatcher::new(
        Arc::new(engine),
        settings.interaction.regreet_cooldown(),
        shutdown.clone(),
    ));

    let tracking = &settings.tracking;
    let processor = FrameProcessor::new(
        TrackManager::new(
            TrackManagerConfig {
                max_lost_frames: tracking.max_lost_frames,
                iou_threshold: tracking.iou_threshold,
            },
            Box::new(VelocityPredictor::new(tracking.max_coast_frames)),
        ),
        EmbeddingRateLimiter::new(tracking.embedding_interval()),
        IdentityResolver::new(identities.known().clone(), settings.interaction.match_threshold),
    );

    let (location, input_format) = match &cli.input {
        Some(input) => (input.clone(), cli.input_format.clone()),
        None => {
            let (device, format) = default_camera();
            (
                device.to_string(),
                cli.input_format.clone().or(Some(format.to_string())),
            )
        }
    };
    let source = FfmpegFrameSource::new(
        location,
        input_format,
        perception.frame_width,
        perception.frame_height,
    );

    spawn_input_listener(shutdown.clone(), console)?;
    if cli.text_mode {
        eprintln!("Text mode: type your replies, `q` to quit.");
    } else {
        eprintln!("Type `q` and Enter to quit.");
    }

    let context = RecognitionContext {
        shutdown,
        detection,
        embedding,
        dispatcher,
        task_queues: vec![speech_queue, oracle_queue],
    };
    RecognitionLoop::new(context, processor, Box::new(source)).run()?;
    Ok(())
}

fn open_identities(settings: &Settings) -> Result<IdentityRegistry, BoxError> {
    let path = settings.storage.resolved_data_dir().join(IDENTITIES_FILE);
    let store: Arc<dyn IdentityStore> = Arc::new(JsonIdentityStore::new(path));
    Ok(IdentityRegistry::open(store)?)
}

fn build_detector(
    settings: &Settings,
    resolver: &ModelResolver,
) -> Result<Box<dyn FaceDetector>, BoxError> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let path = resolver.resolve(
        DETECTOR_MODEL_NAME,
        DETECTOR_MODEL_URL,
        Some(Box::new(|done, total| download_progress("face detection", done, total))),
    )?;
    let base = OnnxFaceDetector::new(&path, DEFAULT_CONFIDENCE, default_intra_threads())?;
    Ok(Box::new(FilteredFaceDetector::new(
        Box::new(base),
        settings.perception.min_face_size,
        settings.perception.min_confidence,
    )))
}

fn build_embedder(
    settings: &Settings,
    resolver: &ModelResolver,
) -> Result<Box<dyn FaceEmbedder>, BoxError> {
    log::info!("Resolving model: {EMBEDDING_MODEL_NAME}");
    let path = resolver.resolve(
        EMBEDDING_MODEL_NAME,
        EMBEDDING_MODEL_URL,
        Some(Box::new(|done, total| download_progress("face embedding", done, total))),
    )?;
    Ok(Box::new(OnnxFaceEmbedder::new(
        &path,
        settings.perception.embedding_margin,
        default_intra_threads(),
    )?))
}

type SpeechAdapters = (
    Arc<dyn SpeechSynthesizer>,
    Arc<dyn SpeechRecognizer>,
    Option<ConsoleInput>,
);

fn build_speech(
    text_mode: bool,
    settings: &Settings,
    resolver: &ModelResolver,
) -> Result<SpeechAdapters, BoxError> {
    if text_mode {
        let console = Arc::new(ConsoleSpeech::new());
        let input = console.input();
        let synthesizer: Arc<dyn SpeechSynthesizer> = console.clone();
        let recognizer: Arc<dyn SpeechRecognizer> = console;
        return Ok((synthesizer, recognizer, Some(input)));
    }

    log::info!("Resolving model: {WHISPER_MODEL_NAME}");
    let whisper_path = resolver.resolve(
        WHISPER_MODEL_NAME,
        WHISPER_MODEL_URL,
        Some(Box::new(|done, total| download_progress("speech recognition", done, total))),
    )?;
    let transcriber = WhisperTranscriber::new(&whisper_path, &settings.audio.language)?;
    let recognizer = MicrophoneRecognizer::new(&settings.audio, Box::new(transcriber))?;
    let synthesizer = CommandSpeechSynthesizer::new(&settings.audio.speak_command)?;
    Ok((Arc::new(synthesizer), Arc::new(recognizer), None))
}

/// Reads stdin lines: `q`/`quit` requests shutdown, anything else is a
/// typed reply when running in text mode.
fn spawn_input_listener(
    shutdown: ShutdownSignal,
    console: Option<ConsoleInput>,
) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let line = line.trim();
                if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
                    log::info!("Quit requested, shutting down");
                    shutdown.trigger();
                    break;
                }
                if let Some(console) = &console {
                    console.send_line(line);
                }
            }
        })?;
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Capture device and demuxer used when `--input` is not given.
fn default_camera() -> (&'static str, &'static str) {
    if cfg!(target_os = "macos") {
        ("0", "avfoundation")
    } else if cfg!(target_os = "windows") {
        ("video=Integrated Camera", "dshow")
    } else {
        ("/dev/video0", "v4l2")
    }
}

fn download_progress(what: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {what} model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {what} model... {downloaded} bytes");
    }
}
