/// Axis-aligned face box in frame pixel coordinates: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a region from `[x1, y1, x2, y2]` corner coordinates, rounding
    /// toward the enclosed area.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let x = x1.round() as i32;
        let y = y1.round() as i32;
        Self {
            x,
            y,
            width: x2.round() as i32 - x,
            height: y2.round() as i32 - y,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        if self.is_degenerate() {
            return 0.0;
        }
        self.width as f64 * self.height as f64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection-over-union. Symmetric, in `[0, 1]`, 0 when the union is empty.
    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Moves the region by a (possibly fractional) offset, rounding to pixels.
    pub fn translated(&self, dx: f64, dy: f64) -> Region {
        Region {
            x: self.x + dx.round() as i32,
            y: self.y + dy.round() as i32,
            ..*self
        }
    }

    /// Grows the region by `margin` on every side and clamps it to the frame.
    pub fn expanded_within(&self, margin: i32, frame_w: u32, frame_h: u32) -> Region {
        let x1 = (self.x - margin).max(0);
        let y1 = (self.y - margin).max(0);
        let x2 = (self.right() + margin).min(frame_w as i32);
        let y2 = (self.bottom() + margin).min(frame_h as i32);
        Region {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// True when at least part of the region lies inside a `frame_w` × `frame_h` frame.
    pub fn overlaps_frame(&self, frame_w: u32, frame_h: u32) -> bool {
        !self.is_degenerate()
            && self.right() > 0
            && self.bottom() > 0
            && self.x < frame_w as i32
            && self.y < frame_h as i32
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}
