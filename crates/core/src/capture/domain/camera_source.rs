use thiserror::Error;

use crate::shared::constants::CAMERA_FALLBACK_INDICES;
use crate::shared::frame::Frame;

/// An opened capture device delivering frames on demand.
///
/// `read` blocks until the next frame is available. A read error is fatal
/// for the current run; the capture loop does not retry.
pub trait CameraSource: Send {
    fn read(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;
}

/// Requested device index and capture parameters.
#[derive(Clone, Copy, Debug)]
pub struct CameraRequest {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Opens capture devices by index, configuring resolution and frame rate.
pub trait CameraProvider: Send {
    fn open(&self, request: &CameraRequest) -> Result<Box<dyn CameraSource>, Box<dyn std::error::Error>>;
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera available: index {requested} failed and so did the fallback indices")]
    NoCamera { requested: u32 },
}

/// Tries the requested index first, then scans the fixed fallback range.
///
/// Returns the source together with the index that actually opened.
pub fn open_with_fallback(
    provider: &dyn CameraProvider,
    request: &CameraRequest,
) -> Result<(Box<dyn CameraSource>, u32), CameraError> {
    match provider.open(request) {
        Ok(source) => return Ok((source, request.index)),
        Err(e) => log::warn!("camera index {} failed to open: {e}", request.index),
    }
    for index in CAMERA_FALLBACK_INDICES {
        if index == request.index {
            continue;
        }
        match provider.open(&CameraRequest { index, ..*request }) {
            Ok(source) => {
                log::info!("opened fallback camera index {index}");
                return Ok((source, index));
            }
            Err(e) => log::debug!("fallback camera index {index} failed: {e}"),
        }
    }
    Err(CameraError::NoCamera {
        requested: request.index,
    })
}
