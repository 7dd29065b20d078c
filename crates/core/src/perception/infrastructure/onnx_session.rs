use std::path::Path;

use crate::perception::domain::face_detector::PerceptionError;

/// Opens an ONNX Runtime session with the platform's preferred accelerator.
///
/// Intra-op threads are capped so the detection and embedding workers do not
/// starve the capture loop of cores.
pub fn open_session(
    model_path: &Path,
    intra_threads: usize,
) -> Result<ort::session::Session, PerceptionError> {
    let session = ort::session::Session::builder()
        .map_err(to_perception_error)?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(to_perception_error)?
        .with_intra_threads(intra_threads.max(1))
        .map_err(to_perception_error)?
        .with_execution_providers(preferred_execution_providers())
        .map_err(to_perception_error)?
        .commit_from_file(model_path)
        .map_err(|e| format!("Failed to load model {}: {e}", model_path.display()))?;
    Ok(session)
}

/// Half of the available cores, at least one.
pub fn default_intra_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}

pub(crate) fn to_perception_error(e: impl std::fmt::Display) -> PerceptionError {
    e.to_string().into()
}

fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intra_threads_is_positive() {
        assert!(default_intra_threads() >= 1);
    }

    #[test]
    fn test_missing_model_errors() {
        assert!(open_session(Path::new("/nonexistent/model.onnx"), 1).is_err());
    }
}
