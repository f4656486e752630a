// THEORY:
// This file is the main entry point for the `rep_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (a camera-facing app, a
// telemetry forwarder, or the bundled demo runner).
//
// The primary goal is to export the `ExercisePipeline` and its associated data
// structures (`PipelineConfig`, `FeedbackSnapshot`, etc.) as the clean,
// high-level interface for the entire analysis engine. The internal modules
// (`core_modules`) are encapsulated behind the pipeline, providing a clean
// separation between the deterministic frame path and the asynchronous
// classification path.

pub mod config;
pub mod core_modules;
pub mod pipeline;
