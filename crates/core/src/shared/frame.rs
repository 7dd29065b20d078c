use std::time::Instant;

use ndarray::ArrayView3;

use super::region::Region;

/// A captured video frame: contiguous RGB bytes in row-major order.
///
/// Frames are read-only once created. The sequence id increases
/// monotonically per source and is what detection results refer back to.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        Self::captured(data, width, height, channels, sequence, Instant::now())
    }

    pub fn captured(
        data: Vec<u8>,
        width: u32,
        height: u32,
        channels: u8,
        sequence: u64,
        captured_at: Instant,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
            captured_at,
        }
    }

    /// Deterministic pseudo-random RGB frame, used to warm up models.
    pub fn noise(width: u32, height: u32, seed: u64) -> Self {
        let len = width as usize * height as usize * 3;
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let data = (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect();
        Self::new(data, width, height, 3, 0)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels under `region` (clamped to the frame) into a new frame.
    ///
    /// Returns `None` when the clamped region is empty.
    pub fn crop(&self, region: &Region) -> Option<Frame> {
        let clamped = region.expanded_within(0, self.width, self.height);
        if clamped.is_degenerate() {
            return None;
        }

        let (x1, y1) = (clamped.x as usize, clamped.y as usize);
        let (x2, y2) = (clamped.right() as usize, clamped.bottom() as usize);
        let channels = self.channels as usize;
        let row_stride = self.width as usize * channels;

        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * channels);
        for row in y1..y2 {
            let start = row * row_stride + x1 * channels;
            let end = row * row_stride + x2 * channels;
            data.extend_from_slice(&self.data[start..end]);
        }

        Some(Frame::captured(
            data,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
            self.channels,
            self.sequence,
            self.captured_at,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.sequence(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3, 0);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let mut data = vec![0u8; 12];
        data[6] = 255; // row=1, col=0, R
        let frame = Frame::new(data, 2, 2, 3, 0);
        let arr = frame.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
    }

    #[test]
    fn test_crop_copies_region_pixels() {
        // 4x2 frame, pixel value = column index
        let mut data = Vec::new();
        for _row in 0..2 {
            for col in 0..4u8 {
                data.extend_from_slice(&[col, col, col]);
            }
        }
        let frame = Frame::new(data, 4, 2, 3, 9);
        let crop = frame.crop(&Region::new(1, 0, 2, 2)).unwrap();

        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.sequence(), 9);
        assert_eq!(crop.data(), &[1, 1, 1, 2, 2, 2, 1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        let crop = frame.crop(&Region::new(-5, 8, 10, 10)).unwrap();
        assert_eq!((crop.width(), crop.height()), (5, 2));
    }

    #[test]
    fn test_crop_outside_frame_is_none() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        assert!(frame.crop(&Region::new(20, 20, 5, 5)).is_none());
    }

    #[test]
    fn test_noise_is_deterministic() {
        let a = Frame::noise(8, 8, 1);
        let b = Frame::noise(8, 8, 1);
        assert_eq!(a.data(), b.data());
        assert_eq!(a.data().len(), 8 * 8 * 3);
        assert!(a.data().iter().any(|&v| v != a.data()[0]));
    }
}
