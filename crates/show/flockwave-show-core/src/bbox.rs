//! Incremental axis-aligned bounding box.

use crate::error::ShowError;

/// Iteratively calculates the axis-aligned bounding box of a set of points.
///
/// The dimensionality is part of the type, so points of the wrong size are
/// rejected at compile time. Corners only ever grow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundingBox<const N: usize> {
    corners: Option<([f64; N], [f64; N])>,
}

impl<const N: usize> BoundingBox<N> {
    /// Creates an empty bounding box.
    pub fn new() -> Self {
        Self { corners: None }
    }

    /// Whether no point has been added yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.corners.is_none()
    }

    /// Extends the box so that it contains `point`.
    pub fn add(&mut self, point: [f64; N]) {
        let Some((min, max)) = &mut self.corners else {
            self.corners = Some((point, point));
            return;
        };
        for i in 0..N {
            min[i] = min[i].min(point[i]);
            max[i] = max[i].max(point[i]);
        }
    }

    /// Returns the minimum and maximum corners of the box.
    pub fn corners(&self) -> Result<([f64; N], [f64; N]), ShowError> {
        self.corners
            .ok_or_else(|| ShowError::empty("the bounding box"))
    }

    /// Grows the box by `margin` on every side.
    pub fn pad(&mut self, margin: f64) -> Result<(), ShowError> {
        let padded = self.padded(margin)?;
        self.corners = Some(padded);
        Ok(())
    }

    /// Returns the corners of the box grown by `margin` on every side,
    /// leaving the box itself untouched.
    pub fn padded(&self, margin: f64) -> Result<([f64; N], [f64; N]), ShowError> {
        if margin < 0.0 {
            return Err(ShowError::out_of_range("padding must be non-negative"));
        }
        let (mut min, mut max) = self.corners()?;
        for i in 0..N {
            min[i] -= margin;
            max[i] += margin;
        }
        Ok((min, max))
    }
}

impl<const N: usize> Extend<[f64; N]> for BoundingBox<N> {
    fn extend<I: IntoIterator<Item = [f64; N]>>(&mut self, iter: I) {
        for point in iter {
            self.add(point);
        }
    }
}

impl<const N: usize> FromIterator<[f64; N]> for BoundingBox<N> {
    fn from_iter<I: IntoIterator<Item = [f64; N]>>(iter: I) -> Self {
        let mut bbox = Self::new();
        bbox.extend(iter);
        bbox
    }
}
