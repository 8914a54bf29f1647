use arcalib_core::FrameSize;

use crate::{CalibrationInput, ObservationSet};

/// Ordered, append-only collection of accepted samples.
#[derive(Clone, Debug, Default)]
pub struct CorrespondenceStore {
    samples: Vec<ObservationSet>,
}

impl CorrespondenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and return the new count.
    pub fn add(&mut self, observation: ObservationSet) -> usize {
        self.samples.push(observation);
        self.samples.len()
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every accumulated sample.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[ObservationSet] {
        &self.samples
    }

    pub fn total_points(&self) -> usize {
        self.samples.iter().map(ObservationSet::len).sum()
    }

    /// Copy the correspondences out for a calibrator run.
    pub fn snapshot(&self, frame_size: FrameSize) -> CalibrationInput {
        CalibrationInput {
            frame_size,
            object_points: self
                .samples
                .iter()
                .map(|s| s.object_points().to_vec())
                .collect(),
            image_points: self
                .samples
                .iter()
                .map(|s| s.image_points().to_vec())
                .collect(),
        }
    }
}
