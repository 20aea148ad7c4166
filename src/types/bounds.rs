/// Axis-aligned bounding box in 3-D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Inverted box that any expansion replaces.
    pub fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    /// Smallest box containing every point, empty for no points.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut bb = Self::empty();
        for p in points {
            bb.expand(p);
        }
        bb
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Grow the box to include `p`.
    pub fn expand(&mut self, p: [f64; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Centre point of the box.
    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// The eight corners: min, the three single-axis maxima, the three
    /// two-axis maxima, then max.
    pub fn corners(&self) -> [[f64; 3]; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            [lo[0], lo[1], lo[2]],
            [hi[0], lo[1], lo[2]],
            [lo[0], hi[1], lo[2]],
            [lo[0], lo[1], hi[2]],
            [hi[0], hi[1], lo[2]],
            [lo[0], hi[1], hi[2]],
            [hi[0], lo[1], hi[2]],
            [hi[0], hi[1], hi[2]],
        ]
    }

    /// Return the smallest box that contains both `self` and `other`.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingBox {
        BoundingBox {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn bounding_box_center() {
        let c = unit_box().center();
        assert!((c[0] - 0.5).abs() < f64::EPSILON);
        assert!((c[1] - 0.5).abs() < f64::EPSILON);
        assert!((c[2] - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_box_absorbs_first_point() {
        let mut bb = BoundingBox::empty();
        assert!(bb.is_empty());
        bb.expand([2.0, -1.0, 4.0]);
        assert!(!bb.is_empty());
        assert_eq!(bb.min, [2.0, -1.0, 4.0]);
        assert_eq!(bb.max, [2.0, -1.0, 4.0]);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let merged = unit_box().merge(&BoundingBox::empty());
        assert_eq!(merged, unit_box());
    }

    #[test]
    fn bounding_box_merge() {
        let b = BoundingBox {
            min: [-1.0, -1.0, -1.0],
            max: [0.5, 0.5, 0.5],
        };
        let merged = unit_box().merge(&b);
        assert_eq!(merged.min, [-1.0, -1.0, -1.0]);
        assert_eq!(merged.max, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn corners_order() {
        let bb = BoundingBox {
            min: [0.0, 0.0, 0.0],
            max: [1.0, 2.0, 3.0],
        };
        let c = bb.corners();
        assert_eq!(c[0], [0.0, 0.0, 0.0]);
        assert_eq!(c[1], [1.0, 0.0, 0.0]);
        assert_eq!(c[3], [0.0, 0.0, 3.0]);
        assert_eq!(c[7], [1.0, 2.0, 3.0]);
    }

    #[test]
    fn from_points_covers_all() {
        let bb = BoundingBox::from_points([[1.0, 5.0, -2.0], [-3.0, 0.0, 4.0]]);
        assert_eq!(bb.min, [-3.0, 0.0, -2.0]);
        assert_eq!(bb.max, [1.0, 5.0, 4.0]);
    }
}
