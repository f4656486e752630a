// THEORY:
// The `exercise` module is the heart of the rule-based analysis layer. It is a
// deterministic rep counter and form-issue detector, completely independent of
// the sequence classifier: a slow or absent classifier never affects counting.
//
// Key architectural principles:
// 1.  **One Generic Machine**: There is a single angle-phase state machine,
//     parameterized by a small table of per-exercise numeric thresholds.
//     Adding an exercise means adding a table entry and a joint mapping, not a
//     new type. This replaces the closed type-tag dispatch the subsystem grew
//     out of, which would have needed one analyzer per exercise forever.
// 2.  **Phase Cycle**: Every rep is a full traversal of
//     Top -> Descending -> Bottom -> Ascending -> Top, driven by the primary
//     joint angle (knee flexion for squats, elbow flexion for push-ups). The
//     counter increments exactly once, on the Ascending -> Top transition.
// 3.  **Determinism**: The machine reads nothing but the ordered sequence of
//     normalized vectors handed to it. No wall clock, no randomness. Feeding
//     the same sequence into two fresh machines yields identical trajectories.
// 4.  **Form Issues Do Not Gate Counting**: Issue detection runs per frame and
//     is surfaced alongside the count, but a sloppy rep is still a rep. The
//     one exception is visibility: a frame whose required joints cannot be
//     seen produces no transition at all, because an angle computed from
//     invisible joints is noise, not measurement.

use crate::core_modules::angles::joint_angle_degrees;
use crate::core_modules::landmark::{
    LEFT_ANKLE, LEFT_ELBOW, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, LEFT_WRIST, RIGHT_ANKLE,
    RIGHT_ELBOW, RIGHT_HIP, RIGHT_KNEE, RIGHT_SHOULDER, RIGHT_WRIST,
};
use crate::core_modules::normalizer::NormalizedVector;
use serde::{Deserialize, Serialize};

/// The exercises the engine knows how to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Pushup,
}

impl ExerciseType {
    /// Canonical lowercase name, used as the threshold-table key and in
    /// classifier class names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Pushup => "pushup",
        }
    }

    /// The left and right three-joint chains whose vertex angle drives the
    /// phase machine: (outer, vertex, outer).
    pub fn primary_joints(&self) -> ([usize; 3], [usize; 3]) {
        match self {
            ExerciseType::Squat => (
                [LEFT_HIP, LEFT_KNEE, LEFT_ANKLE],
                [RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE],
            ),
            ExerciseType::Pushup => (
                [LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST],
                [RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST],
            ),
        }
    }

    /// Joints that must be visible for a frame to drive the machine.
    pub fn required_joints(&self) -> &'static [usize] {
        match self {
            ExerciseType::Squat => &[
                LEFT_SHOULDER,
                RIGHT_SHOULDER,
                LEFT_HIP,
                RIGHT_HIP,
                LEFT_KNEE,
                RIGHT_KNEE,
                LEFT_ANKLE,
                RIGHT_ANKLE,
            ],
            ExerciseType::Pushup => &[
                LEFT_SHOULDER,
                RIGHT_SHOULDER,
                LEFT_ELBOW,
                RIGHT_ELBOW,
                LEFT_WRIST,
                RIGHT_WRIST,
                LEFT_HIP,
                RIGHT_HIP,
                LEFT_ANKLE,
                RIGHT_ANKLE,
            ],
        }
    }
}

/// Where in the rep cycle the subject currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExercisePhase {
    /// Initial position and the terminal position of every rep.
    Top,
    /// Primary angle has dropped below the upper threshold.
    Descending,
    /// Full depth reached: primary angle below the lower threshold.
    Bottom,
    /// On the way back up, above the lower threshold again.
    Ascending,
}

/// A rule-detected deviation from correct technique, independent of counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormIssue {
    /// Left and right primary joint angles disagree beyond tolerance.
    UnevenMovement,
    /// One or more required joints fell below the visibility floor.
    LowVisibility,
}

impl FormIssue {
    pub fn description(&self) -> &'static str {
        match self {
            FormIssue::UnevenMovement => "Uneven left/right movement",
            FormIssue::LowVisibility => "Required joints not clearly visible",
        }
    }
}

/// Per-exercise tuning table consumed by the generic machine. These are
/// externally supplied configuration, not policy the machine owns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseThresholds {
    /// Above this angle the subject counts as extended (Top side).
    pub upper_angle: f32,
    /// Below this angle the subject has reached full depth (Bottom side).
    pub lower_angle: f32,
    /// Maximum tolerated left/right primary-angle disagreement, in degrees.
    pub asymmetry_tolerance: f32,
    /// Minimum visibility for every required joint before a frame may drive
    /// a phase transition.
    pub visibility_floor: f32,
}

/// The machine's verdict on a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAssessment {
    pub phase: ExercisePhase,
    pub rep_count: u32,
    pub issues: Vec<FormIssue>,
    /// Mean of the left and right primary joint angles, in degrees.
    /// Zero when the frame was skipped for visibility.
    pub primary_angle: f32,
}

/// Deterministic angle-phase rep counter for one exercise session.
pub struct ExerciseStateMachine {
    exercise: ExerciseType,
    thresholds: ExerciseThresholds,
    phase: ExercisePhase,
    rep_count: u32,
}

impl ExerciseStateMachine {
    pub fn new(exercise: ExerciseType, thresholds: ExerciseThresholds) -> Self {
        Self {
            exercise,
            thresholds,
            phase: ExercisePhase::Top,
            rep_count: 0,
        }
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn phase(&self) -> ExercisePhase {
        self.phase
    }

    pub fn rep_count(&self) -> u32 {
        self.rep_count
    }

    /// Zeroes the counter and returns to `Top`. Must run when the exercise
    /// type changes or the session ends; otherwise stale counts bleed into
    /// the next exercise.
    pub fn reset(&mut self) {
        self.phase = ExercisePhase::Top;
        self.rep_count = 0;
    }

    /// Advances the machine by one valid frame.
    pub fn update(&mut self, vector: &NormalizedVector) -> FrameAssessment {
        // A frame whose required joints are not visible enough cannot drive a
        // transition. It is reported, but the phase and count stay put.
        if !self.required_joints_visible(vector) {
            return FrameAssessment {
                phase: self.phase,
                rep_count: self.rep_count,
                issues: vec![FormIssue::LowVisibility],
                primary_angle: 0.0,
            };
        }

        let (left_chain, right_chain) = self.exercise.primary_joints();
        let left = chain_angle(vector, left_chain);
        let right = chain_angle(vector, right_chain);
        let primary = (left + right) / 2.0;

        let mut issues = Vec::new();
        if (left - right).abs() > self.thresholds.asymmetry_tolerance {
            issues.push(FormIssue::UnevenMovement);
        }

        // A single frame may cross several thresholds (a deep drop between
        // consecutive frames); transitions cascade until the phase is stable
        // for this frame's angle.
        loop {
            let next = self.step(primary);
            if next == self.phase {
                break;
            }
            if self.phase == ExercisePhase::Ascending && next == ExercisePhase::Top {
                // The only point at which a rep is counted.
                self.rep_count += 1;
            }
            self.phase = next;
        }

        FrameAssessment {
            phase: self.phase,
            rep_count: self.rep_count,
            issues,
            primary_angle: primary,
        }
    }

    fn step(&self, angle: f32) -> ExercisePhase {
        match self.phase {
            ExercisePhase::Top if angle < self.thresholds.upper_angle => ExercisePhase::Descending,
            ExercisePhase::Descending if angle < self.thresholds.lower_angle => {
                ExercisePhase::Bottom
            }
            ExercisePhase::Bottom if angle > self.thresholds.lower_angle => {
                ExercisePhase::Ascending
            }
            ExercisePhase::Ascending if angle > self.thresholds.upper_angle => ExercisePhase::Top,
            current => current,
        }
    }

    fn required_joints_visible(&self, vector: &NormalizedVector) -> bool {
        self.exercise
            .required_joints()
            .iter()
            .all(|&joint| vector.joint_visibility(joint) >= self.thresholds.visibility_floor)
    }
}

fn chain_angle(vector: &NormalizedVector, chain: [usize; 3]) -> f32 {
    joint_angle_degrees(
        vector.joint_point(chain[0]),
        vector.joint_point(chain[1]),
        vector.joint_point(chain[2]),
    )
}
