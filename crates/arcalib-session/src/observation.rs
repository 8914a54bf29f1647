use nalgebra::{Point2, Point3};

/// One accepted calibration sample: image points and their reference points.
///
/// Index `i` of [`image_points`](Self::image_points) corresponds to index `i`
/// of [`object_points`](Self::object_points). Instances are only created by
/// the [`SampleGate`](crate::SampleGate), which guarantees both sequences are
/// non-empty and of equal length.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSet {
    image_points: Vec<Point2<f64>>,
    object_points: Vec<Point3<f64>>,
}

impl ObservationSet {
    pub(crate) fn new(image_points: Vec<Point2<f64>>, object_points: Vec<Point3<f64>>) -> Self {
        debug_assert_eq!(image_points.len(), object_points.len());
        Self {
            image_points,
            object_points,
        }
    }

    pub fn image_points(&self) -> &[Point2<f64>] {
        &self.image_points
    }

    pub fn object_points(&self) -> &[Point3<f64>] {
        &self.object_points
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}
