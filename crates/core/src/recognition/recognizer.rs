use std::sync::{Arc, RwLock};

use crate::capture::domain::face_locator::{self, FaceLocator};
use crate::recognition::domain::face_encoder::FaceEncoder;
use crate::recognition::embedding_index::EmbeddingIndex;
use crate::recognition::identity_store::KnownIdentities;
use crate::shared::constants::MIN_RECOGNITION_CROP_SIDE;
use crate::shared::frame::Frame;

/// Sentinel name for an unmatched face.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionResult {
    pub name: String,
    pub confidence: f32,
}

impl RecognitionResult {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_known(&self) -> bool {
        self.name != UNKNOWN_NAME
    }
}

/// An immutable view of the known-identity set with its search index.
///
/// Replaced as a whole under the `RwLock` on reload; a query sees either the
/// old or the new set in full, never a mix.
pub struct IdentitySnapshot {
    names: Vec<String>,
    index: EmbeddingIndex,
}

impl IdentitySnapshot {
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            index: EmbeddingIndex::empty(),
        }
    }

    pub fn from_identities(identities: &KnownIdentities) -> Self {
        Self {
            names: identities.names().to_vec(),
            index: EmbeddingIndex::new(identities.embeddings().clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub type SharedIdentities = Arc<RwLock<IdentitySnapshot>>;

/// Turns a face crop into a `RecognitionResult`.
///
/// Runs a defensive re-detection on the crop before encoding: the tracked
/// box may have drifted, and the encoder expects a tight face region.
pub struct Recognizer {
    locator: Box<dyn FaceLocator>,
    encoder: Box<dyn FaceEncoder>,
    identities: SharedIdentities,
    threshold: f32,
}

impl Recognizer {
    pub fn new(
        locator: Box<dyn FaceLocator>,
        encoder: Box<dyn FaceEncoder>,
        identities: SharedIdentities,
        threshold: f32,
    ) -> Self {
        Self {
            locator,
            encoder,
            identities,
            threshold,
        }
    }

    pub fn recognize(
        &mut self,
        crop: &Frame,
    ) -> Result<RecognitionResult, Box<dyn std::error::Error>> {
        if crop.is_empty() {
            return Ok(RecognitionResult::unknown());
        }

        let upscaled;
        let input = if crop.width().max(crop.height()) < MIN_RECOGNITION_CROP_SIDE {
            let factor =
                MIN_RECOGNITION_CROP_SIDE as f64 / crop.width().max(crop.height()).max(1) as f64;
            upscaled = crop.scaled(factor);
            &upscaled
        } else {
            crop
        };

        let detections = self.locator.detect(input)?;
        let Some(best) = face_locator::largest(&detections) else {
            return Ok(RecognitionResult::unknown());
        };
        let face = input.crop(best.bbox);
        if face.is_empty() {
            return Ok(RecognitionResult::unknown());
        }

        let Some(embedding) = self.encoder.encode(&face)? else {
            return Ok(RecognitionResult::unknown());
        };

        let snapshot = self
            .identities
            .read()
            .map_err(|_| "identity snapshot lock poisoned")?;
        if snapshot.is_empty() {
            return Ok(RecognitionResult::unknown());
        }
        let Some((row, distance)) = snapshot.index.query(embedding.view()) else {
            return Ok(RecognitionResult::unknown());
        };

        let confidence = (1.0 - distance).max(0.0);
        if distance < self.threshold {
            let name = snapshot
                .names
                .get(row)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_NAME.to_string());
            Ok(RecognitionResult { name, confidence })
        } else {
            Ok(RecognitionResult {
                name: UNKNOWN_NAME.to_string(),
                confidence,
            })
        }
    }
}
