//! Joint-angle geometry helpers.
//!
//! A joint angle is the angle at a vertex joint between the two limb segments
//! that meet there, computed from the dot product of the segment vectors
//! (law of cosines). 180 degrees is a fully extended limb.

/// Minimum segment length before the geometry is considered degenerate.
const SEGMENT_EPSILON: f32 = 1e-4;

/// Angle in degrees at `vertex` between the segments `vertex -> a` and
/// `vertex -> b`. Degenerate segments (coincident joints) read as a straight
/// limb rather than propagating NaN into the state machine.
pub fn joint_angle_degrees(a: (f32, f32), vertex: (f32, f32), b: (f32, f32)) -> f32 {
    let v1 = (a.0 - vertex.0, a.1 - vertex.1);
    let v2 = (b.0 - vertex.0, b.1 - vertex.1);

    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let mag1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let mag2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();

    if mag1 < SEGMENT_EPSILON || mag2 < SEGMENT_EPSILON {
        return 180.0;
    }

    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Midpoint of two 3D points.
pub fn midpoint(a: (f32, f32, f32), b: (f32, f32, f32)) -> (f32, f32, f32) {
    (
        (a.0 + b.0) / 2.0,
        (a.1 + b.1) / 2.0,
        (a.2 + b.2) / 2.0,
    )
}

/// Euclidean distance between two 3D points.
pub fn distance(a: (f32, f32, f32), b: (f32, f32, f32)) -> f32 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    let dz = a.2 - b.2;
    (dx * dx + dy * dy + dz * dz).sqrt()
}
