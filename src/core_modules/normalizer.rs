// THEORY:
// The `normalizer` module is the entry gate of the analysis engine. It converts
// a raw landmark frame into a scale- and translation-invariant numeric vector
// that both downstream consumers (the rule-based state machine and the sequence
// classifier) can rely on.
//
// Key architectural principles:
// 1.  **Pure Function**: Normalization has no state and no side effects. The
//     same frame always produces the same vector, which is what makes the whole
//     frame path replayable from recorded input.
// 2.  **Reject Early**: A frame that does not carry exactly 33 landmarks is
//     rejected here, before any downstream structure can observe it. Invalid
//     frames therefore never create gaps inside the window buffer; they simply
//     never arrive.
// 3.  **Anchored Invariance**: Coordinates are re-expressed relative to the hip
//     center and divided by the torso length (hip center to shoulder center).
//     The output is invariant to where the subject stands and how far they are
//     from the camera. It is NOT rotation-invariant; the downstream classifier
//     contract does not ask for that.

use crate::core_modules::angles::{distance, midpoint};
use crate::core_modules::landmark::{
    FRAME_VECTOR_LEN, LANDMARKS_PER_FRAME, LEFT_HIP, LEFT_SHOULDER, LandmarkFrame, RIGHT_HIP,
    RIGHT_SHOULDER,
};
use thiserror::Error;

/// Lower bound on the torso length used as the scale divisor. Keeps the
/// division finite when detection degenerates and landmarks coincide.
pub const TORSO_EPSILON: f32 = 1e-6;

/// Why a frame was refused before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameRejection {
    #[error("expected 33 landmarks, frame carried {0}")]
    WrongLandmarkCount(usize),
}

/// An immutable, fixed-length (33 x 4) vector of normalized joint values.
/// Produced once by [`normalize`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVector {
    values: [f32; FRAME_VECTOR_LEN],
}

impl NormalizedVector {
    /// The full flat vector, joint-major: x, y, z, visibility per joint.
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// All four values for one joint index.
    pub fn joint(&self, index: usize) -> (f32, f32, f32, f32) {
        let base = index * 4;
        (
            self.values[base],
            self.values[base + 1],
            self.values[base + 2],
            self.values[base + 3],
        )
    }

    /// The 2D position of one joint, which is what the angle geometry reads.
    pub fn joint_point(&self, index: usize) -> (f32, f32) {
        let base = index * 4;
        (self.values[base], self.values[base + 1])
    }

    /// The visibility score of one joint.
    pub fn joint_visibility(&self, index: usize) -> f32 {
        self.values[index * 4 + 3]
    }
}

/// Converts a raw landmark frame into a [`NormalizedVector`].
///
/// Every joint is translated so the hip center sits at the origin, then scaled
/// by the torso length. Visibility passes through unchanged.
pub fn normalize(frame: &LandmarkFrame) -> Result<NormalizedVector, FrameRejection> {
    if frame.landmark_count() != LANDMARKS_PER_FRAME {
        return Err(FrameRejection::WrongLandmarkCount(frame.landmark_count()));
    }

    let as_point = |index: usize| {
        let lm = &frame.landmarks[index];
        (lm.x, lm.y, lm.z)
    };

    let hip_center = midpoint(as_point(LEFT_HIP), as_point(RIGHT_HIP));
    let shoulder_center = midpoint(as_point(LEFT_SHOULDER), as_point(RIGHT_SHOULDER));
    let torso = distance(shoulder_center, hip_center).max(TORSO_EPSILON);

    let mut values = [0.0f32; FRAME_VECTOR_LEN];
    for (joint, lm) in frame.landmarks.iter().enumerate() {
        let base = joint * 4;
        values[base] = (lm.x - hip_center.0) / torso;
        values[base + 1] = (lm.y - hip_center.1) / torso;
        values[base + 2] = (lm.z - hip_center.2) / torso;
        values[base + 3] = lm.visibility;
    }

    Ok(NormalizedVector { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::landmark::Landmark;
    use std::time::Instant;

    fn frame_from(landmarks: Vec<Landmark>) -> LandmarkFrame {
        LandmarkFrame::new(landmarks, Instant::now())
    }

    fn sample_frame() -> LandmarkFrame {
        let mut landmarks = vec![Landmark::default(); LANDMARKS_PER_FRAME];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            lm.x = 0.3 + 0.01 * i as f32;
            lm.y = 0.2 + 0.02 * i as f32;
            lm.z = -0.1 + 0.005 * i as f32;
            lm.visibility = 0.9;
        }
        frame_from(landmarks)
    }

    #[test]
    fn output_is_exactly_132_values() {
        let vec = normalize(&sample_frame()).unwrap();
        assert_eq!(vec.as_slice().len(), FRAME_VECTOR_LEN);
    }

    #[test]
    fn rejects_wrong_landmark_count() {
        let short = frame_from(vec![Landmark::default(); 20]);
        assert_eq!(
            normalize(&short),
            Err(FrameRejection::WrongLandmarkCount(20))
        );
    }

    #[test]
    fn invariant_under_uniform_translation() {
        let base = sample_frame();
        let mut shifted = base.clone();
        for lm in &mut shifted.landmarks {
            lm.x += 4.5;
            lm.y -= 2.0;
            lm.z += 0.7;
        }

        let a = normalize(&base).unwrap();
        let b = normalize(&shifted).unwrap();
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-4, "translation changed output");
        }
    }

    #[test]
    fn invariant_under_positive_scaling() {
        let base = sample_frame();
        let mut scaled = base.clone();
        for lm in &mut scaled.landmarks {
            lm.x *= 3.0;
            lm.y *= 3.0;
            lm.z *= 3.0;
        }

        let a = normalize(&base).unwrap();
        let b = normalize(&scaled).unwrap();
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-3, "scaling changed output");
        }
    }

    #[test]
    fn visibility_passes_through_unchanged() {
        let vec = normalize(&sample_frame()).unwrap();
        for joint in 0..LANDMARKS_PER_FRAME {
            assert_eq!(vec.joint_visibility(joint), 0.9);
        }
    }

    #[test]
    fn degenerate_torso_stays_finite() {
        // Every landmark on the same point: torso length collapses to zero.
        let collapsed = frame_from(vec![Landmark::new(0.5, 0.5, 0.0, 1.0); LANDMARKS_PER_FRAME]);
        let vec = normalize(&collapsed).unwrap();
        assert!(vec.as_slice().iter().all(|v| v.is_finite()));
    }
}
