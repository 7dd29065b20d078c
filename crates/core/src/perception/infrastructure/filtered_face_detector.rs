use crate::perception::domain::detection::Detection;
use crate::perception::domain::face_detector::{FaceDetector, PerceptionError};
use crate::shared::frame::Frame;

/// Decorator that discards detections too small or too uncertain to embed.
///
/// A box survives only when both sides reach `min_size` pixels and its
/// confidence is strictly above `min_confidence`.
pub struct FilteredFaceDetector {
    inner: Box<dyn FaceDetector>,
    min_size: i32,
    min_confidence: f64,
}

impl FilteredFaceDetector {
    pub fn new(inner: Box<dyn FaceDetector>, min_size: i32, min_confidence: f64) -> Self {
        Self {
            inner,
            min_size,
            min_confidence,
        }
    }

    fn keeps(&self, detection: &Detection) -> bool {
        detection.region.width >= self.min_size
            && detection.region.height >= self.min_size
            && detection.confidence > self.min_confidence
    }
}

impl FaceDetector for FilteredFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
        let detections = self.inner.detect(frame)?;
        Ok(detections.into_iter().filter(|d| self.keeps(d)).collect())
    }

    fn warm_up(&mut self) -> Result<(), PerceptionError> {
        self.inner.warm_up()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::region::Region;
    use rstest::rstest;

    struct FakeDetector {
        detections: Vec<Detection>,
        warmed_up: bool,
    }

    impl FaceDetector for FakeDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, PerceptionError> {
            Ok(self.detections.clone())
        }

        fn warm_up(&mut self) -> Result<(), PerceptionError> {
            self.warmed_up = true;
            Ok(())
        }
    }

    fn filtered(detections: Vec<Detection>) -> FilteredFaceDetector {
        FilteredFaceDetector::new(
            Box::new(FakeDetector {
                detections,
                warmed_up: false,
            }),
            80,
            0.9,
        )
    }

    #[rstest]
    #[case::large_and_confident(80, 80, 0.95, true)]
    #[case::too_narrow(79, 120, 0.95, false)]
    #[case::too_short(120, 79, 0.95, false)]
    #[case::confidence_at_threshold(100, 100, 0.9, false)]
    #[case::low_confidence(100, 100, 0.5, false)]
    fn test_filters_by_size_and_confidence(
        #[case] width: i32,
        #[case] height: i32,
        #[case] confidence: f64,
        #[case] kept: bool,
    ) {
        let det = Detection::new(Region::new(0, 0, width, height), confidence);
        let mut detector = filtered(vec![det]);
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 0);

        let result = detector.detect(&frame).unwrap();
        assert_eq!(result.len(), usize::from(kept));
    }

    #[test]
    fn test_keeps_detection_order() {
        let a = Detection::new(Region::new(200, 0, 90, 90), 0.95);
        let b = Detection::new(Region::new(0, 0, 10, 10), 0.99);
        let c = Detection::new(Region::new(0, 0, 100, 100), 0.97);
        let mut detector = filtered(vec![a, b, c]);
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 0);

        assert_eq!(detector.detect(&frame).unwrap(), vec![a, c]);
    }

    #[test]
    fn test_warm_up_delegates() {
        let mut detector = filtered(Vec::new());
        detector.warm_up().unwrap();
    }
}
