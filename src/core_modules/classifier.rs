//! The sequence-classifier seam.
//!
//! The classifier itself is an external collaborator (an on-device model or a
//! model server); the engine only owns the contract: a `T x 132` window tensor
//! in, a [`ClassificationResult`] out, bounded latency, may fail. Everything
//! behind the trait is opaque.

use crate::core_modules::window::WindowTensor;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Asynchronous request/response contract for the external sequence
/// classifier. Implementations must be cheap to share (`Arc`) and safe to
/// call from the classification worker pool.
pub trait SequenceClassifier: Send + Sync {
    fn classify(&self, input: WindowTensor) -> BoxFuture<'static, anyhow::Result<ClassificationResult>>;
}

/// The classifier's verdict over one window of motion.
///
/// The optional fields default to empty when the payload omits them, which
/// mirrors what model servers actually send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_class: String,
    pub score: f32,
    #[serde(default)]
    pub probabilities: Vec<f32>,
    #[serde(default)]
    pub class_names: Vec<String>,
    /// Form quality in [0, 1]. Absent when the predicted class is a
    /// non-exercise ("rest") state, where form has no meaning.
    #[serde(default)]
    pub form_confidence: Option<f32>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}
