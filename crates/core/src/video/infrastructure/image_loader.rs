use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::SourceError;

/// Decodes a still image into an RGB [`Frame`] with sequence id 0.
pub fn load_image_frame(path: &Path) -> Result<Frame, SourceError> {
    let img = image::open(path)
        .map_err(|e| format!("Failed to open image {}: {e}", path.display()))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, 0))
}
