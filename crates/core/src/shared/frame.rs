use ndarray::{ArrayView3, ArrayViewMut3};

use crate::shared::bounding_box::BoundingBox;

/// A single captured frame: contiguous RGB bytes in row-major order.
///
/// Owned transiently by the capture loop for one tick; crops taken from it
/// are independent copies, so downstream consumers never alias a buffer the
/// capture loop keeps mutating.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
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
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
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

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the region under `bbox` into a new frame. The box is clipped
    /// to frame bounds first; a degenerate box yields an empty frame.
    pub fn crop(&self, bbox: BoundingBox) -> Frame {
        let b = bbox.clip(self.width, self.height);
        let w = b.width() as usize;
        let h = b.height() as usize;
        let c = self.channels as usize;
        let mut data = Vec::with_capacity(w * h * c);
        let src_stride = self.width as usize * c;
        for row in 0..h {
            let start = (b.y1 as usize + row) * src_stride + b.x1 as usize * c;
            data.extend_from_slice(&self.data[start..start + w * c]);
        }
        Frame::new(data, w as u32, h as u32, self.channels)
    }

    /// Nearest-neighbor resize, sampling pixel centers.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Frame {
        let dst_w = new_width as usize;
        let dst_h = new_height as usize;
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let c = self.channels as usize;

        let mut data = Vec::with_capacity(dst_w * dst_h * c);
        if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
            return Frame::new(data, 0, 0, self.channels);
        }

        for y in 0..dst_h {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / dst_h as f64) as usize).min(src_h - 1);
            for x in 0..dst_w {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / dst_w as f64) as usize).min(src_w - 1);
                let offset = (src_y * src_w + src_x) * c;
                data.extend_from_slice(&self.data[offset..offset + c]);
            }
        }
        Frame::new(data, new_width, new_height, self.channels)
    }

    /// Uniformly scales both dimensions, rounding down with a floor of 1 px.
    pub fn scaled(&self, factor: f64) -> Frame {
        if self.is_empty() {
            return self.clone();
        }
        let w = ((self.width as f64 * factor) as u32).max(1);
        let h = ((self.height as f64 * factor) as u32).max(1);
        self.resize(w, h)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
