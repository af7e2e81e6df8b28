use glam::DVec3;

/// World-space coordinates of a point record.
pub type Point = DVec3;

/// Sentinel for an unoccupied cell: any NaN component means "no point".
pub const NONE: Point = DVec3::NAN;

pub fn exists(p: Point) -> bool {
    !p.x.is_nan() && !p.y.is_nan() && !p.z.is_nan()
}
