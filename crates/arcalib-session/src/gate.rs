use nalgebra::{Point2, Point3};

use crate::ObservationSet;

/// Gate verdict for a candidate frame.
#[derive(Clone, Debug, PartialEq)]
pub enum GateDecision {
    /// The frame may be stored as a sample.
    Accepted(ObservationSet),
    /// Nothing was detected; not an error.
    NotVisible,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("correspondence mismatch: {image} image points vs {object} reference points")]
    CorrespondenceMismatch { image: usize, object: usize },
}

/// Accepts a candidate iff it has as many image points as reference points
/// and at least one of each.
#[derive(Clone, Copy, Debug, Default)]
pub struct SampleGate;

impl SampleGate {
    pub fn new() -> Self {
        Self
    }

    pub fn admit(
        &self,
        image_points: Vec<Point2<f64>>,
        object_points: Vec<Point3<f64>>,
    ) -> Result<GateDecision, GateError> {
        if image_points.is_empty() {
            return Ok(GateDecision::NotVisible);
        }
        if image_points.len() != object_points.len() {
            return Err(GateError::CorrespondenceMismatch {
                image: image_points.len(),
                object: object_points.len(),
            });
        }
        Ok(GateDecision::Accepted(ObservationSet::new(
            image_points,
            object_points,
        )))
    }
}
