//! Landmark frame data unit and the fixed 33-point anatomical index scheme.
//!
//! The pose source delivers one `LandmarkFrame` per camera frame. The pipeline
//! treats it purely as an inbound value: the source owns nothing downstream.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Number of landmarks in a valid pose frame.
pub const LANDMARKS_PER_FRAME: usize = 33;

/// Values carried per landmark after normalization (x, y, z, visibility).
pub const VALUES_PER_LANDMARK: usize = 4;

/// Length of one normalized frame vector.
pub const FRAME_VECTOR_LEN: usize = LANDMARKS_PER_FRAME * VALUES_PER_LANDMARK;

// Indices into the fixed anatomical scheme. Only the joints the engine
// actually reads are named here; the scheme itself covers all 33 points.
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

/// A single tracked body-joint position with a visibility/confidence score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth; same unit as x/y after normalization.
    pub z: f32,
    /// In-frame likelihood in [0, 1].
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }
}

/// One timestamped set of body-joint positions, produced by the external
/// pose source. A frame is only usable when it carries exactly
/// [`LANDMARKS_PER_FRAME`] landmarks; validation happens in the normalizer,
/// not here, so a malformed frame is an ordinary value until it is rejected.
#[derive(Debug, Clone)]
pub struct LandmarkFrame {
    pub landmarks: Vec<Landmark>,
    /// Capture timestamp supplied by the source. The dispatcher's rate gate
    /// reads this instead of the wall clock, which keeps the whole frame path
    /// reproducible from recorded input.
    pub captured_at: Instant,
}

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Landmark>, captured_at: Instant) -> Self {
        Self {
            landmarks,
            captured_at,
        }
    }

    pub fn landmark_count(&self) -> usize {
        self.landmarks.len()
    }
}
