use ndarray::Array1;

use crate::shared::frame::Frame;

/// Domain interface for embedding extraction.
///
/// `Ok(None)` means the encoder found no usable face in the crop; that is a
/// per-operation outcome, not an error. All embeddings from one encoder must
/// share a fixed length.
pub trait FaceEncoder: Send {
    fn encode(&mut self, crop: &Frame)
        -> Result<Option<Array1<f32>>, Box<dyn std::error::Error>>;
}
