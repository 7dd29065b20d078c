use crate::shared::region::Region;

/// One detected face box with the model's confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub region: Region,
    pub confidence: f64,
}

impl Detection {
    pub fn new(region: Region, confidence: f64) -> Self {
        Self { region, confidence }
    }
}

/// Output of the detection worker for a single frame.
///
/// `detections` is `None` when inference failed for that frame. An empty
/// vector means the frame was processed and contained no faces.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionResult {
    pub frame_sequence: u64,
    pub detections: Option<Vec<Detection>>,
}

impl DetectionResult {
    pub fn found(frame_sequence: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_sequence,
            detections: Some(detections),
        }
    }

    pub fn failed(frame_sequence: u64) -> Self {
        Self {
            frame_sequence,
            detections: None,
        }
    }

    /// Boxes in detection order, empty for a failed result.
    pub fn regions(&self) -> Vec<Region> {
        self.detections
            .as_ref()
            .map(|dets| dets.iter().map(|d| d.region).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_preserve_detection_order() {
        let result = DetectionResult::found(
            3,
            vec![
                Detection::new(Region::new(50, 0, 10, 10), 0.95),
                Detection::new(Region::new(0, 0, 10, 10), 0.99),
            ],
        );
        assert_eq!(
            result.regions(),
            vec![Region::new(50, 0, 10, 10), Region::new(0, 0, 10, 10)]
        );
    }

    #[test]
    fn test_failed_result_has_no_regions() {
        let result = DetectionResult::failed(7);
        assert!(result.detections.is_none());
        assert!(result.regions().is_empty());
    }
}
