//! End-to-end tests for the full pipeline: landmark frames in, feedback
//! snapshots out, with stub classifiers standing in for the external model.

use futures::future::BoxFuture;
use rep_vision::config::PipelineConfig;
use rep_vision::core_modules::landmark::{
    LANDMARKS_PER_FRAME, LEFT_ANKLE, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, RIGHT_ANKLE, RIGHT_HIP,
    RIGHT_KNEE, RIGHT_SHOULDER,
};
use rep_vision::pipeline::{
    ClassificationResult, ExercisePipeline, ExercisePhase, ExerciseType, Landmark, LandmarkFrame,
    PipelineError, SequenceClassifier, WindowTensor,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn squat_frame(angle: f32, captured_at: Instant) -> LandmarkFrame {
    let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0, 1.0); LANDMARKS_PER_FRAME];
    let rad = angle.to_radians();

    let mut place_leg = |hip: usize, knee: usize, ankle: usize, x: f32| {
        landmarks[hip] = Landmark::new(x, 1.0, 0.0, 1.0);
        landmarks[knee] = Landmark::new(x, 1.5, 0.0, 1.0);
        landmarks[ankle] = Landmark::new(x + 0.5 * rad.sin(), 1.5 - 0.5 * rad.cos(), 0.0, 1.0);
    };
    place_leg(LEFT_HIP, LEFT_KNEE, LEFT_ANKLE, -0.2);
    place_leg(RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE, 0.2);
    landmarks[LEFT_SHOULDER] = Landmark::new(-0.2, 0.0, 0.0, 1.0);
    landmarks[RIGHT_SHOULDER] = Landmark::new(0.2, 0.0, 0.0, 1.0);

    LandmarkFrame::new(landmarks, captured_at)
}

fn sample_result(class: &str) -> ClassificationResult {
    ClassificationResult {
        predicted_class: class.to_string(),
        score: 0.9,
        probabilities: vec![0.9, 0.07, 0.03],
        class_names: vec!["squat".into(), "pushup".into(), "rest".into()],
        form_confidence: Some(0.8),
        flags: Vec::new(),
        messages: Vec::new(),
    }
}

/// Succeeds on every call, counting them; optional per-call latency.
struct CountingClassifier {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl SequenceClassifier for CountingClassifier {
    fn classify(&self, _input: WindowTensor) -> BoxFuture<'static, anyhow::Result<ClassificationResult>> {
        let calls = Arc::clone(&self.calls);
        let delay = self.delay;
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(sample_result("squat"))
        })
    }
}

/// Succeeds on the first call, fails on every later one.
struct FailsAfterFirst {
    calls: Arc<AtomicUsize>,
}

impl SequenceClassifier for FailsAfterFirst {
    fn classify(&self, _input: WindowTensor) -> BoxFuture<'static, anyhow::Result<ClassificationResult>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if call == 0 {
                Ok(sample_result("squat"))
            } else {
                anyhow::bail!("model server unreachable")
            }
        })
    }
}

/// Polls the snapshot until the predicate holds or time runs out.
async fn settle(pipeline: &ExercisePipeline, pred: impl Fn(u64, u64) -> bool) {
    for _ in 0..200 {
        let snap = pipeline.snapshot();
        if pred(snap.classifications_applied, snap.classifications_failed) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("classification never settled");
}

#[tokio::test]
async fn dispatch_waits_for_a_full_window_then_fires_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = Arc::new(CountingClassifier {
        calls: Arc::clone(&calls),
        delay: Duration::ZERO,
    });
    let config = PipelineConfig::default();
    let capacity = config.window_capacity;
    let interval = config.dispatch_interval();
    let mut pipeline = ExercisePipeline::new(config, ExerciseType::Squat, classifier).unwrap();

    let base = Instant::now();
    let frame_step = Duration::from_millis(34);

    // 44 of 45 required frames: nothing may fire.
    for i in 0..(capacity - 1) {
        pipeline.process_frame(&squat_frame(170.0, base + frame_step * i as u32));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.snapshot().classifications_applied, 0);

    // The 45th completes the window and fires.
    let fill_time = base + frame_step * (capacity - 1) as u32;
    pipeline.process_frame(&squat_frame(170.0, fill_time));
    settle(&pipeline, |applied, _| applied == 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // More frames inside the interval: still one call.
    for ms in [40, 120, 250] {
        pipeline.process_frame(&squat_frame(170.0, fill_time + Duration::from_millis(ms)));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Once the interval has elapsed, the next eligible frame fires once.
    pipeline.process_frame(&squat_frame(170.0, fill_time + interval));
    settle(&pipeline, |applied, _| applied == 2).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn classifier_failure_keeps_previous_result_and_never_touches_reps() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = Arc::new(FailsAfterFirst {
        calls: Arc::clone(&calls),
    });
    let config = PipelineConfig::default();
    let capacity = config.window_capacity;
    let mut pipeline = ExercisePipeline::new(config, ExerciseType::Squat, classifier).unwrap();

    let base = Instant::now();
    let frame_step = Duration::from_millis(34);
    for i in 0..capacity {
        pipeline.process_frame(&squat_frame(170.0, base + frame_step * i as u32));
    }
    settle(&pipeline, |applied, _| applied == 1).await;
    let first = pipeline.snapshot().classification.unwrap();

    // A full rep while the second (failing) classification goes out.
    let later = base + Duration::from_secs(5);
    pipeline.process_frame(&squat_frame(80.0, later));
    pipeline.process_frame(&squat_frame(170.0, later + Duration::from_millis(34)));
    settle(&pipeline, |_, failed| failed == 1).await;

    let snap = pipeline.snapshot();
    assert_eq!(snap.classification, Some(first));
    assert_eq!(snap.rep_count, 1);
    assert_eq!(snap.phase, ExercisePhase::Top);
    assert_eq!(snap.classifications_failed, 1);
}

#[tokio::test]
async fn reset_discards_inflight_results_and_zeroes_the_session() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = Arc::new(CountingClassifier {
        calls: Arc::clone(&calls),
        delay: Duration::from_millis(100),
    });
    let config = PipelineConfig::default();
    let capacity = config.window_capacity;
    let mut pipeline = ExercisePipeline::new(config, ExerciseType::Squat, classifier).unwrap();

    let base = Instant::now();
    let frame_step = Duration::from_millis(34);
    // One full rep plus a full window, ending with a dispatch in flight.
    pipeline.process_frame(&squat_frame(170.0, base));
    pipeline.process_frame(&squat_frame(80.0, base + frame_step));
    for i in 2..(capacity + 2) {
        pipeline.process_frame(&squat_frame(170.0, base + frame_step * i as u32));
    }
    assert_eq!(pipeline.snapshot().rep_count, 1);

    // Let the worker pick the call up so it is genuinely in flight.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let old_epoch = pipeline.snapshot().session_epoch;
    pipeline.reset();

    let snap = pipeline.snapshot();
    assert_eq!(snap.rep_count, 0);
    assert_eq!(snap.phase, ExercisePhase::Top);
    assert_eq!(snap.session_epoch, old_epoch + 1);

    // The in-flight call completes against the dead epoch and is discarded.
    tokio::time::sleep(Duration::from_millis(250)).await;
    let snap = pipeline.snapshot();
    assert!(snap.classification.is_none());
    assert_eq!(snap.classifications_applied, 0);
}

#[tokio::test]
async fn switch_exercise_starts_a_fresh_session() {
    let classifier = Arc::new(CountingClassifier {
        calls: Arc::new(AtomicUsize::new(0)),
        delay: Duration::ZERO,
    });
    let mut pipeline =
        ExercisePipeline::new(PipelineConfig::default(), ExerciseType::Squat, classifier).unwrap();

    let base = Instant::now();
    pipeline.process_frame(&squat_frame(170.0, base));
    pipeline.process_frame(&squat_frame(80.0, base + Duration::from_millis(34)));
    pipeline.process_frame(&squat_frame(170.0, base + Duration::from_millis(68)));
    assert_eq!(pipeline.snapshot().rep_count, 1);

    pipeline.switch_exercise(ExerciseType::Pushup).unwrap();
    let snap = pipeline.snapshot();
    assert_eq!(snap.exercise, ExerciseType::Pushup);
    assert_eq!(snap.rep_count, 0);
    assert_eq!(pipeline.exercise(), ExerciseType::Pushup);
}

#[tokio::test]
async fn missing_threshold_table_fails_at_session_start() {
    let classifier: Arc<dyn SequenceClassifier> = Arc::new(CountingClassifier {
        calls: Arc::new(AtomicUsize::new(0)),
        delay: Duration::ZERO,
    });

    let mut config = PipelineConfig::default();
    config.thresholds.remove(ExerciseType::Pushup.as_str());

    // Creating a push-up session must fail synchronously.
    let err = ExercisePipeline::new(config.clone(), ExerciseType::Pushup, Arc::clone(&classifier))
        .err()
        .unwrap();
    assert_eq!(err, PipelineError::MissingThresholds(ExerciseType::Pushup));

    // Switching into the unconfigured exercise must fail and leave the
    // running squat session untouched.
    let mut pipeline =
        ExercisePipeline::new(config, ExerciseType::Squat, classifier).unwrap();
    let base = Instant::now();
    pipeline.process_frame(&squat_frame(170.0, base));
    pipeline.process_frame(&squat_frame(80.0, base + Duration::from_millis(34)));
    pipeline.process_frame(&squat_frame(170.0, base + Duration::from_millis(68)));

    assert_eq!(
        pipeline.switch_exercise(ExerciseType::Pushup),
        Err(PipelineError::MissingThresholds(ExerciseType::Pushup))
    );
    assert_eq!(pipeline.exercise(), ExerciseType::Squat);
    assert_eq!(pipeline.snapshot().rep_count, 1);
}

#[tokio::test]
async fn invalid_frames_are_counted_and_cause_no_mutation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = Arc::new(CountingClassifier {
        calls: Arc::clone(&calls),
        delay: Duration::ZERO,
    });
    let mut pipeline =
        ExercisePipeline::new(PipelineConfig::default(), ExerciseType::Squat, classifier).unwrap();

    let base = Instant::now();
    for i in 0..50 {
        let truncated = LandmarkFrame::new(
            vec![Landmark::default(); 10],
            base + Duration::from_millis(34) * i,
        );
        pipeline.process_frame(&truncated);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snap = pipeline.snapshot();
    assert_eq!(snap.frames_dropped, 50);
    assert_eq!(snap.frames_seen, 0);
    assert_eq!(snap.rep_count, 0);
    // Invalid frames never reach the window, so nothing can have fired.
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_session_counts_reps_and_applies_classifications() {
    let calls = Arc::new(AtomicUsize::new(0));
    let classifier = Arc::new(CountingClassifier {
        calls: Arc::clone(&calls),
        delay: Duration::from_millis(10),
    });
    let config = PipelineConfig::default();
    let mut pipeline = ExercisePipeline::new(config, ExerciseType::Squat, classifier).unwrap();

    // Three gradual squat cycles, 30 frames each, ~34ms apart.
    let base = Instant::now();
    let mut frame_index = 0u32;
    for _ in 0..3 {
        for step in 0..30 {
            let t = step as f32 / 30.0;
            let angle = 170.0 - 90.0 * (t * std::f32::consts::PI).sin();
            pipeline.process_frame(&squat_frame(
                angle,
                base + Duration::from_millis(34) * frame_index,
            ));
            frame_index += 1;
        }
    }

    settle(&pipeline, |applied, _| applied >= 1).await;
    let snap = pipeline.snapshot();
    assert_eq!(snap.rep_count, 3);
    assert_eq!(snap.phase, ExercisePhase::Top);
    assert_eq!(snap.frames_seen, 90);
    assert_eq!(snap.frames_dropped, 0);
    assert!(snap.classification.is_some());
}
