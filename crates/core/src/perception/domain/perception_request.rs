use std::sync::Arc;

use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::tracking::domain::track::TrackId;

use super::embedding::Embedding;

/// Work item for the embedding worker: one tracked face in one frame.
#[derive(Clone, Debug)]
pub struct EmbeddingRequest {
    pub track_id: TrackId,
    pub frame: Arc<Frame>,
    pub region: Region,
}

/// Output of the embedding worker, tied to the track that asked for it.
///
/// `embedding` is `None` when inference failed.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingResult {
    pub track_id: TrackId,
    pub embedding: Option<Embedding>,
}
