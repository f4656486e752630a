// Demo runner for the `rep_vision` library: drives the pipeline with a
// synthetic squat session and a canned classifier, printing the feedback
// snapshots a UI would render. In a real application the frames come from a
// pose-estimation model over camera input and the classifier is a trained
// sequence model.

use anyhow::Result;
use futures::future::BoxFuture;
use rep_vision::config::PipelineConfig;
use rep_vision::core_modules::landmark::{
    LANDMARKS_PER_FRAME, LEFT_ANKLE, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER, RIGHT_ANKLE, RIGHT_HIP,
    RIGHT_KNEE, RIGHT_SHOULDER,
};
use rep_vision::pipeline::{
    ClassificationResult, ExercisePipeline, ExerciseType, Landmark, LandmarkFrame,
    SequenceClassifier, WindowTensor,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(33); // ~30 fps source
const CYCLE_FRAMES: usize = 60; // one squat every two seconds
const CYCLES: usize = 3;

/// Stands in for the trained sequence model: small latency, fixed verdict.
struct CannedClassifier;

impl SequenceClassifier for CannedClassifier {
    fn classify(&self, input: WindowTensor) -> BoxFuture<'static, Result<ClassificationResult>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            Ok(ClassificationResult {
                predicted_class: "squat".into(),
                score: 0.93,
                probabilities: vec![0.93, 0.04, 0.03],
                class_names: vec!["squat".into(), "pushup".into(), "rest".into()],
                form_confidence: Some(0.85),
                flags: Vec::new(),
                messages: vec![format!("window of {} frames", input.frames)],
            })
        })
    }
}

/// A full-body frame whose knee angle reads as `angle` degrees.
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

/// Knee angle over one synthetic squat cycle: 170 degrees at the top, 80 at
/// the bottom, smooth in between.
fn cycle_angle(frame_in_cycle: usize) -> f32 {
    let t = frame_in_cycle as f32 / CYCLE_FRAMES as f32;
    let depth = (t * std::f32::consts::PI).sin();
    170.0 - 90.0 * depth
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("rep_vision demo - synthetic squat session");

    let config = PipelineConfig::default();
    let mut pipeline = ExercisePipeline::new(config, ExerciseType::Squat, Arc::new(CannedClassifier))?;

    for cycle in 0..CYCLES {
        for frame_in_cycle in 0..CYCLE_FRAMES {
            let frame = squat_frame(cycle_angle(frame_in_cycle), Instant::now());
            pipeline.process_frame(&frame);

            if frame_in_cycle % 15 == 0 {
                let snap = pipeline.snapshot();
                println!(
                    "cycle {} frame {:2}: reps={} phase={:?} class={:?}",
                    cycle + 1,
                    frame_in_cycle,
                    snap.rep_count,
                    snap.phase,
                    snap.classification.as_ref().map(|c| &c.predicted_class),
                );
            }

            tokio::time::sleep(FRAME_INTERVAL).await;
        }
    }

    // Let the last classification land before the final report.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let snap = pipeline.snapshot();
    println!("--- session summary ---");
    println!("reps counted:            {}", snap.rep_count);
    println!("frames seen:             {}", snap.frames_seen);
    println!("frames dropped:          {}", snap.frames_dropped);
    println!("classifications applied: {}", snap.classifications_applied);
    println!("classifications failed:  {}", snap.classifications_failed);
    if let Some(classification) = &snap.classification {
        println!(
            "final verdict:           {} (score {:.2}, form {:?})",
            classification.predicted_class, classification.score, classification.form_confidence,
        );
    }

    Ok(())
}
