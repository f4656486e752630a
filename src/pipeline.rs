// THEORY:
// The `pipeline` module is the final, top-level API for the entire analysis
// engine. It encapsulates the full architectural stack into a single
// interface: landmark frames in, feedback snapshots out.
//
// The frame path is strictly single-writer: `process_frame` takes `&mut self`,
// so the normalizer, the window buffer and the state machine only ever mutate
// on the producer's thread. The classification path runs on the dispatcher's
// worker pool and meets the frame path only inside the session merger. A slow
// classifier therefore costs the UI a stale classification field for a tick,
// never a missed rep.
//
// Session lifecycle: the pipeline owns exactly one session at a time. `reset`
// and `switch_exercise` start a new one (fresh counters, cleared window,
// bumped epoch); dropping the pipeline ends the last one, letting any
// in-flight classification finish and be discarded by the epoch guard. The
// pose source is an external collaborator; whoever owns it is responsible
// for releasing its native resources when the session ends.

use crate::config::PipelineConfig;
use crate::core_modules::dispatcher::ClassificationDispatcher;
use crate::core_modules::exercise::ExerciseStateMachine;
use crate::core_modules::normalizer::normalize;
use crate::core_modules::session::SessionState;
use crate::core_modules::window::WindowBuffer;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

// Re-export the types a consumer of the pipeline actually touches.
pub use crate::core_modules::classifier::{ClassificationResult, SequenceClassifier};
pub use crate::core_modules::exercise::{
    ExercisePhase, ExerciseThresholds, ExerciseType, FormIssue,
};
pub use crate::core_modules::landmark::{Landmark, LandmarkFrame};
pub use crate::core_modules::session::FeedbackSnapshot;
pub use crate::core_modules::window::WindowTensor;

/// Configuration failures surfaced synchronously at session start. Everything
/// that can go wrong mid-session is recovered locally and never reaches the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("no threshold entry configured for exercise type {0:?}")]
    MissingThresholds(ExerciseType),
    #[error("window capacity must be non-zero")]
    ZeroWindowCapacity,
}

/// The main, top-level struct for the analysis engine: one active exercise
/// session fed by a landmark stream.
pub struct ExercisePipeline {
    config: PipelineConfig,
    window: WindowBuffer,
    machine: ExerciseStateMachine,
    dispatcher: ClassificationDispatcher,
    session: Arc<SessionState>,
}

impl ExercisePipeline {
    /// Builds a pipeline for one exercise type. Fails synchronously when the
    /// configuration cannot support a session; a session must never discover
    /// a missing threshold table mid-exercise.
    ///
    /// Must be called inside a tokio runtime: the classification worker pool
    /// spawns its tasks here.
    pub fn new(
        config: PipelineConfig,
        exercise: ExerciseType,
        classifier: Arc<dyn SequenceClassifier>,
    ) -> Result<Self, PipelineError> {
        if config.window_capacity == 0 {
            return Err(PipelineError::ZeroWindowCapacity);
        }
        let thresholds = config
            .thresholds_for(exercise)
            .ok_or(PipelineError::MissingThresholds(exercise))?;

        let dispatcher = ClassificationDispatcher::new(
            classifier,
            config.dispatch_interval(),
            config.classification_timeout(),
        );

        Ok(Self {
            window: WindowBuffer::new(config.window_capacity),
            machine: ExerciseStateMachine::new(exercise, thresholds),
            dispatcher,
            session: Arc::new(SessionState::new(exercise)),
            config,
        })
    }

    /// The full ingest path for one landmark frame.
    ///
    /// An invalid frame is dropped here with no state mutation; a valid one
    /// drives the state machine, joins the window and may trigger a throttled
    /// classification dispatch. Never blocks on the classifier.
    pub fn process_frame(&mut self, frame: &LandmarkFrame) {
        let vector = match normalize(frame) {
            Ok(vector) => vector,
            Err(_) => {
                self.session.record_dropped_frame();
                return;
            }
        };

        let assessment = self.machine.update(&vector);
        self.session.apply_machine(&assessment);

        self.window.push(vector);
        self.dispatcher.maybe_dispatch(
            &self.window,
            frame.captured_at,
            self.session.current_epoch(),
            &self.session,
        );
    }

    /// The latest merged snapshot, by value.
    pub fn snapshot(&self) -> FeedbackSnapshot {
        self.session.snapshot()
    }

    /// A receiver observing every future snapshot; the UI-facing read side.
    pub fn subscribe(&self) -> watch::Receiver<FeedbackSnapshot> {
        self.session.subscribe()
    }

    pub fn exercise(&self) -> ExerciseType {
        self.machine.exercise()
    }

    /// Starts a fresh session for the same exercise: zeroed counters, empty
    /// window, new session identity. An in-flight classification finishes and
    /// is discarded.
    pub fn reset(&mut self) {
        let exercise = self.machine.exercise();
        self.machine.reset();
        self.window.clear();
        self.dispatcher.reset_gate();
        self.session.begin_session(exercise);
    }

    /// Switches to a different exercise type, which always implies a full
    /// reset: rep counts never bleed across exercises.
    pub fn switch_exercise(&mut self, exercise: ExerciseType) -> Result<(), PipelineError> {
        let thresholds = self
            .config
            .thresholds_for(exercise)
            .ok_or(PipelineError::MissingThresholds(exercise))?;

        self.machine = ExerciseStateMachine::new(exercise, thresholds);
        self.window.clear();
        self.dispatcher.reset_gate();
        self.session.begin_session(exercise);
        Ok(())
    }
}
