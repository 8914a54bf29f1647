use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Chessboard description in inner-corner counts.
///
/// `cols`/`rows` count **inner corners**, so a board with 10x7 squares is
/// `cols = 9, rows = 6`. `square_size` is in the caller's world unit
/// (millimetres in the shipped configs).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChessboardSpec {
    pub cols: u32,
    pub rows: u32,
    pub square_size: f64,
}

impl Default for ChessboardSpec {
    fn default() -> Self {
        Self {
            cols: 9,
            rows: 6,
            square_size: 25.0,
        }
    }
}

impl ChessboardSpec {
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("board needs at least 2x2 inner corners, got {cols}x{rows}")]
    InvalidSize { cols: u32, rows: u32 },
    #[error("square size must be finite and > 0, got {0}")]
    InvalidSquareSize(f64),
}

/// One frame's detector output.
///
/// `ids`, when present, index into the session's [`TargetLayout`]; without
/// ids the points are expected in layout order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub image_points: Vec<Point2<f64>>,
    #[serde(default)]
    pub ids: Option<Vec<u32>>,
}

impl Detection {
    pub fn ordered(image_points: Vec<Point2<f64>>) -> Self {
        Self {
            image_points,
            ids: None,
        }
    }

    pub fn with_ids(image_points: Vec<Point2<f64>>, ids: Vec<u32>) -> Self {
        Self {
            image_points,
            ids: Some(ids),
        }
    }

    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Fixed 3D reference points of the calibration target for one session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetLayout {
    points: Vec<Point3<f64>>,
}

impl TargetLayout {
    /// Inner corners of a chessboard on the `z = 0` plane, row-major.
    pub fn from_chessboard(spec: &ChessboardSpec) -> Result<Self, LayoutError> {
        if spec.cols < 2 || spec.rows < 2 {
            return Err(LayoutError::InvalidSize {
                cols: spec.cols,
                rows: spec.rows,
            });
        }
        if !spec.square_size.is_finite() || spec.square_size <= 0.0 {
            return Err(LayoutError::InvalidSquareSize(spec.square_size));
        }

        let s = spec.square_size;
        let points = (0..spec.rows)
            .flat_map(|r| (0..spec.cols).map(move |c| Point3::new(c as f64 * s, r as f64 * s, 0.0)))
            .collect();
        Ok(Self { points })
    }

    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_planar(&self) -> bool {
        self.points.iter().all(|p| p.z.abs() <= 1e-9)
    }

    /// Reference points expected for a detection.
    ///
    /// Id-less detections get the whole layout. Ids outside the layout are
    /// dropped, so the result can be shorter than the detection; the sample
    /// gate reports that as a correspondence mismatch.
    pub fn reference_for(&self, detection: &Detection) -> Vec<Point3<f64>> {
        match &detection.ids {
            None => self.points.clone(),
            Some(ids) => ids
                .iter()
                .filter_map(|&id| {
                    let p = self.points.get(id as usize).copied();
                    if p.is_none() {
                        log::debug!("id {id} is outside the {}-point layout", self.len());
                    }
                    p
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chessboard_layout_is_row_major() {
        let spec = ChessboardSpec {
            cols: 3,
            rows: 2,
            square_size: 10.0,
        };
        let layout = TargetLayout::from_chessboard(&spec).expect("layout");
        assert_eq!(layout.len(), 6);
        assert_eq!(layout.points()[1], Point3::new(10.0, 0.0, 0.0));
        assert_eq!(layout.points()[3], Point3::new(0.0, 10.0, 0.0));
        assert!(layout.is_planar());
    }

    #[test]
    fn rejects_degenerate_boards() {
        let thin = ChessboardSpec {
            cols: 1,
            rows: 6,
            square_size: 25.0,
        };
        assert!(matches!(
            TargetLayout::from_chessboard(&thin),
            Err(LayoutError::InvalidSize { .. })
        ));
        let zero = ChessboardSpec {
            square_size: 0.0,
            ..ChessboardSpec::default()
        };
        assert_eq!(
            TargetLayout::from_chessboard(&zero),
            Err(LayoutError::InvalidSquareSize(0.0))
        );
    }

    #[test]
    fn unknown_ids_shorten_reference() {
        let layout = TargetLayout::from_chessboard(&ChessboardSpec::default()).expect("layout");
        let det = Detection::with_ids(
            vec![Point2::new(1.0, 1.0), Point2::new(2.0, 2.0), Point2::new(3.0, 3.0)],
            vec![0, 10, 999],
        );
        let reference = layout.reference_for(&det);
        assert_eq!(reference.len(), 2);
        assert_eq!(reference[1], Point3::new(25.0, 25.0, 0.0));
    }
}
