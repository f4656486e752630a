// THEORY:
// The `session` module is the result merger and the only point where the two
// independently-updated halves of the engine meet: the per-frame state-machine
// output (producer thread) and the occasional classifier output (worker pool).
//
// Key architectural principles:
// 1.  **One Immutable Snapshot**: Consumers never see internal fields. Every
//     change assembles a fresh `FeedbackSnapshot` under the merger lock and
//     publishes it atomically through a watch channel. A reader always
//     observes a value that was internally consistent at publish time; there
//     is no field-by-field exposure and no torn read.
// 2.  **Session Identity**: A monotonically increasing epoch names the current
//     session. Resetting or switching exercises bumps the epoch, which
//     orphans every classification still in flight: results are applied only
//     if the epoch they were dispatched under is still current.
// 3.  **Counters Instead of Logs**: Dropped frames and failed classifications
//     are invisible to the end user by design (the snapshot simply does not
//     update that tick), so the merger counts them. The counters ride on the
//     snapshot, where a telemetry collaborator can pick them up.

use crate::core_modules::classifier::ClassificationResult;
use crate::core_modules::exercise::{ExercisePhase, ExerciseType, FormIssue, FrameAssessment};
use serde::Serialize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// The merged, externally observable state of one exercise session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSnapshot {
    /// Identity of the session this snapshot belongs to.
    pub session_epoch: u64,
    pub exercise: ExerciseType,
    pub phase: ExercisePhase,
    /// Monotonic non-decreasing between resets.
    pub rep_count: u32,
    /// Form issues detected on the most recent valid frame.
    pub form_issues: Vec<FormIssue>,
    /// Latest classifier verdict, or `None` until the first call succeeds.
    pub classification: Option<ClassificationResult>,
    /// Valid frames that reached the state machine this session.
    pub frames_seen: u64,
    /// Frames rejected before normalization this session.
    pub frames_dropped: u64,
    pub classifications_applied: u64,
    pub classifications_failed: u64,
}

impl FeedbackSnapshot {
    fn initial(exercise: ExerciseType, epoch: u64) -> Self {
        Self {
            session_epoch: epoch,
            exercise,
            phase: ExercisePhase::Top,
            rep_count: 0,
            form_issues: Vec::new(),
            classification: None,
            frames_seen: 0,
            frames_dropped: 0,
            classifications_applied: 0,
            classifications_failed: 0,
        }
    }
}

/// Mutable half of the merger, confined behind the lock.
struct MergerInner {
    exercise: ExerciseType,
    phase: ExercisePhase,
    rep_count: u32,
    form_issues: Vec<FormIssue>,
    classification: Option<ClassificationResult>,
    frames_seen: u64,
    frames_dropped: u64,
    classifications_applied: u64,
    classifications_failed: u64,
}

impl MergerInner {
    fn fresh(exercise: ExerciseType) -> Self {
        Self {
            exercise,
            phase: ExercisePhase::Top,
            rep_count: 0,
            form_issues: Vec::new(),
            classification: None,
            frames_seen: 0,
            frames_dropped: 0,
            classifications_applied: 0,
            classifications_failed: 0,
        }
    }

    fn assemble(&self, epoch: u64) -> FeedbackSnapshot {
        FeedbackSnapshot {
            session_epoch: epoch,
            exercise: self.exercise,
            phase: self.phase,
            rep_count: self.rep_count,
            form_issues: self.form_issues.clone(),
            classification: self.classification.clone(),
            frames_seen: self.frames_seen,
            frames_dropped: self.frames_dropped,
            classifications_applied: self.classifications_applied,
            classifications_failed: self.classifications_failed,
        }
    }
}

/// Owns the merged session state and publishes immutable snapshots.
///
/// Shared between the producer-side pipeline and the classification workers;
/// all mutation funnels through the internal lock, all reads go through the
/// watch channel by clone.
pub struct SessionState {
    inner: Mutex<MergerInner>,
    epoch: AtomicU64,
    snapshot_tx: watch::Sender<FeedbackSnapshot>,
}

impl SessionState {
    pub fn new(exercise: ExerciseType) -> Self {
        let epoch = 1;
        let (snapshot_tx, _) = watch::channel(FeedbackSnapshot::initial(exercise, epoch));
        Self {
            inner: Mutex::new(MergerInner::fresh(exercise)),
            epoch: AtomicU64::new(epoch),
            snapshot_tx,
        }
    }

    /// Identity of the currently active session.
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// The latest published snapshot, by value.
    pub fn snapshot(&self) -> FeedbackSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// A receiver that observes every future snapshot. Readers clone the
    /// borrowed value and never touch internal state.
    pub fn subscribe(&self) -> watch::Receiver<FeedbackSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Folds a state-machine verdict into the session. Producer thread only.
    pub(crate) fn apply_machine(&self, assessment: &FrameAssessment) {
        let mut inner = self.inner.lock().unwrap();
        inner.phase = assessment.phase;
        inner.rep_count = assessment.rep_count;
        inner.form_issues = assessment.issues.clone();
        inner.frames_seen += 1;
        self.publish(&inner);
    }

    /// Records a frame rejected before normalization.
    pub(crate) fn record_dropped_frame(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.frames_dropped += 1;
        self.publish(&inner);
    }

    /// Applies a classifier verdict if the session it was dispatched under is
    /// still the current one. Returns whether the result was applied.
    pub(crate) fn apply_classification(
        &self,
        result: ClassificationResult,
        dispatched_epoch: u64,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if self.epoch.load(Ordering::Acquire) != dispatched_epoch {
            // Stale: the session moved on while the call was in flight.
            return false;
        }
        inner.classification = Some(result);
        inner.classifications_applied += 1;
        self.publish(&inner);
        true
    }

    /// Records a failed or timed-out classification. The previous result
    /// stays in place; stale failures are not charged to the new session.
    pub(crate) fn record_classification_failure(&self, dispatched_epoch: u64) {
        let mut inner = self.inner.lock().unwrap();
        if self.epoch.load(Ordering::Acquire) != dispatched_epoch {
            return;
        }
        inner.classifications_failed += 1;
        self.publish(&inner);
    }

    /// Starts a fresh session, bumping the epoch so in-flight classifications
    /// from the old one are discarded on arrival.
    pub(crate) fn begin_session(&self, exercise: ExerciseType) {
        let mut inner = self.inner.lock().unwrap();
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        *inner = MergerInner::fresh(exercise);
        self.snapshot_tx
            .send_replace(inner.assemble(epoch));
    }

    fn publish(&self, inner: &MergerInner) {
        let epoch = self.epoch.load(Ordering::Acquire);
        self.snapshot_tx.send_replace(inner.assemble(epoch));
    }
}
