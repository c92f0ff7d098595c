use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::capture::domain::pose_estimator::PoseAngles;
use crate::shared::frame::Frame;

/// One scored observation of the tracked face.
///
/// `neg_area_ratio` stores the negated relative box area so that the
/// lexicographic minimum of `(quality, neg_area_ratio)` prefers the most
/// frontal face and, among equally frontal faces, the largest.
#[derive(Clone, Debug)]
pub struct PoseSample {
    pub quality: f32,
    pub neg_area_ratio: f32,
    pub crop: Frame,
    pub angles: PoseAngles,
}

impl PoseSample {
    pub fn area_ratio(&self) -> f32 {
        -self.neg_area_ratio
    }

    fn key(&self) -> (f32, f32) {
        (self.quality, self.neg_area_ratio)
    }
}

fn cmp_key(a: (f32, f32), b: (f32, f32)) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

/// Bounded FIFO of pose samples; pushing past capacity evicts the oldest.
#[derive(Debug)]
pub struct PoseBuffer {
    samples: VecDeque<PoseSample>,
    capacity: usize,
}

impl PoseBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: PoseSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// The sample minimizing `(quality, neg_area_ratio)`. Deterministic:
    /// exact ties keep the earliest-buffered sample.
    pub fn best(&self) -> Option<&PoseSample> {
        self.samples
            .iter()
            .min_by(|a, b| cmp_key(a.key(), b.key()))
    }

    /// Removes and returns the best sample.
    pub fn take_best(&mut self) -> Option<PoseSample> {
        let idx = self
            .samples
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| cmp_key(a.key(), b.key()))
            .map(|(i, _)| i)?;
        self.samples.remove(idx)
    }
}
