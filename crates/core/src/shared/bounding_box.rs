/// An axis-aligned box in frame pixel coordinates.
///
/// Raw detector and tracker output may extend past the frame; call `clip`
/// before cropping. A clipped box satisfies `x1 <= x2, y1 <= y2` within
/// frame bounds; degenerate boxes report `is_empty`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds from top-left corner plus width/height, the convention most
    /// short-term trackers report in.
    pub fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + w,
            y2: y + h,
        }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Box area relative to a frame of the given dimensions, in [0, 1]
    /// for clipped boxes.
    pub fn area_ratio(&self, frame_width: u32, frame_height: u32) -> f32 {
        let frame_area = frame_width as i64 * frame_height as i64;
        if frame_area == 0 {
            return 0.0;
        }
        self.area() as f32 / frame_area as f32
    }

    /// Clamps all corners to `[0, width] x [0, height]`.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Self {
        let w = frame_width as i32;
        let h = frame_height as i32;
        let x1 = self.x1.clamp(0, w);
        let y1 = self.y1.clamp(0, h);
        Self {
            x1,
            y1,
            x2: self.x2.clamp(x1, w),
            y2: self.y2.clamp(y1, h),
        }
    }

    /// Multiplies all coordinates by `factor`, e.g. to map boxes detected on
    /// a downscaled frame back to full-frame coordinates.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            x1: (self.x1 as f64 * factor) as i32,
            y1: (self.y1 as f64 * factor) as i32,
            x2: (self.x2 as f64 * factor) as i32,
            y2: (self.y2 as f64 * factor) as i32,
        }
    }
}
