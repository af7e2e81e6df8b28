use super::Dir;
use crate::point::Point;

/// Axis-aligned box with a cached midpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct Bbox {
    min: Point,
    max: Point,
    mid: Point,
}

impl Bbox {
    pub fn new(min: Point, max: Point) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self {
            min,
            max,
            mid: (min + max) * 0.5,
        }
    }

    pub fn min(&self) -> Point {
        self.min
    }

    pub fn max(&self) -> Point {
        self.max
    }

    pub fn mid(&self) -> Point {
        self.mid
    }

    /// Extent along x.
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Extent along y.
    pub fn depth(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Extent along z.
    pub fn height(&self) -> f64 {
        self.max.z - self.min.z
    }

    pub fn area(&self) -> f64 {
        self.width() * self.depth()
    }

    /// Half-open containment: the max faces belong to the neighboring box.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x
            && p.x < self.max.x
            && p.y >= self.min.y
            && p.y < self.max.y
            && p.z >= self.min.z
            && p.z < self.max.z
    }

    /// Strict overlap: boxes that only share a face do not overlap.
    pub fn overlaps(&self, other: &Bbox) -> bool {
        (self.mid.x - other.mid.x).abs() < (self.width() + other.width()) / 2.0
            && (self.mid.y - other.mid.y).abs() < (self.depth() + other.depth()) / 2.0
            && (self.mid.z - other.mid.z).abs() < (self.height() + other.height()) / 2.0
    }

    /// Scale outward around the midpoint by the given ratio.
    pub fn grow_by(&mut self, ratio: f64) {
        let half = (self.max - self.min) * 0.5 * (1.0 + ratio);
        self.min = self.mid - half;
        self.max = self.mid + half;
    }

    /// The sub-box for one quadrant of this box: x and y halve, z is kept.
    pub fn quadrant(&self, dir: Dir) -> Bbox {
        debug_assert!(!dir.up());
        let (x0, x1) = if dir.east() {
            (self.mid.x, self.max.x)
        } else {
            (self.min.x, self.mid.x)
        };
        let (y0, y1) = if dir.north() {
            (self.mid.y, self.max.y)
        } else {
            (self.min.y, self.mid.y)
        };
        Bbox::new(Point::new(x0, y0, self.min.z), Point::new(x1, y1, self.max.z))
    }

    /// The sub-box for one octant of this box.
    pub fn octant(&self, dir: Dir) -> Bbox {
        let (x0, x1) = if dir.east() {
            (self.mid.x, self.max.x)
        } else {
            (self.min.x, self.mid.x)
        };
        let (y0, y1) = if dir.north() {
            (self.mid.y, self.max.y)
        } else {
            (self.min.y, self.mid.y)
        };
        let (z0, z1) = if dir.up() {
            (self.mid.z, self.max.z)
        } else {
            (self.min.z, self.mid.z)
        };
        Bbox::new(Point::new(x0, y0, z0), Point::new(x1, y1, z1))
    }
}
