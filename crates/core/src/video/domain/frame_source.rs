use crate::shared::frame::Frame;

pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub description: String,
}

/// A live or recorded stream of frames.
///
/// Implementations hand out frames with strictly increasing sequence ids.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<SourceInfo, SourceError>;

    /// Blocks until the next frame is available. `None` marks end of stream.
    fn next_frame(&mut self) -> Option<Result<Frame, SourceError>>;

    /// Releases the capture device or file.
    fn close(&mut self);
}
