// THEORY:
// The `dispatcher` module is the bridge between the synchronous frame path and
// the asynchronous sequence classifier. Camera frames arrive at 30 Hz or more;
// the classifier is only worth consulting a few times per second and may take
// hundreds of milliseconds to answer. The dispatcher decides *when* a window
// is worth classifying and hands the work to a bounded pool so that a slow or
// failed call never blocks frame ingestion or rep counting.
//
// Key architectural principles:
// 1.  **Throttling**: A call is eligible only when the window is full and the
//     configured interval has elapsed since the previous dispatch. The
//     interval gate advances synchronously at dispatch time, so two eligible
//     checks can never double-fire before the async call returns.
// 2.  **Single Flight**: At most one classification is in flight per session.
//     When the classifier's own latency exceeds the interval, excess ticks
//     are skipped, never queued; the camera does not know or care.
// 3.  **Snapshot Isolation**: The call operates on a defensive copy of the
//     window taken at dispatch time. The live buffer keeps mutating while the
//     call runs.
// 4.  **Fire and Forget**: The producer gets a bool back, nothing more.
//     Resolution flows into the session merger, guarded by the epoch captured
//     at dispatch time; failure leaves the previous result in place.

use crate::core_modules::classifier::SequenceClassifier;
use crate::core_modules::session::SessionState;
use crate::core_modules::window::{WindowBuffer, WindowTensor};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Upper bound on classification workers regardless of core count. One
/// session only ever has one call in flight; the pool exists so several
/// sessions can share a single classifier.
const MAX_WORKERS: usize = 4;

/// One unit of classification work, self-contained: the worker that picks it
/// up needs nothing from the dispatcher.
struct ClassifyTask {
    tensor: WindowTensor,
    epoch: u64,
    session: Arc<SessionState>,
    in_flight: Arc<AtomicBool>,
}

/// Bounded pool of classification workers fed through a round-robin
/// dispatcher task.
pub struct ClassifierPool {
    task_sender: mpsc::UnboundedSender<ClassifyTask>,
}

impl ClassifierPool {
    /// Spawns the dispatcher and worker tasks. Must be called inside a tokio
    /// runtime.
    pub fn new(classifier: Arc<dyn SequenceClassifier>, call_timeout: Duration) -> Self {
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ClassifyTask>();
        let pool_size = num_cpus::get().clamp(1, MAX_WORKERS);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..pool_size)
            .map(|_| mpsc::unbounded_channel::<ClassifyTask>())
            .unzip();

        // Dispatcher: distributes tasks across workers round-robin. Ends when
        // the pool handle is dropped and the task channel closes.
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_senders.len();
            }
        });

        for mut worker_receiver in worker_receivers {
            let classifier = Arc::clone(&classifier);

            tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    let outcome =
                        tokio::time::timeout(call_timeout, classifier.classify(task.tensor)).await;

                    match outcome {
                        Ok(Ok(result)) => {
                            task.session.apply_classification(result, task.epoch);
                        }
                        // Transport/model failure or timeout: the previous
                        // result stays in place, nothing propagates upward.
                        Ok(Err(_)) | Err(_) => {
                            task.session.record_classification_failure(task.epoch);
                        }
                    }

                    task.in_flight.store(false, Ordering::Release);
                }
            });
        }

        Self { task_sender }
    }

    fn submit(&self, task: ClassifyTask) {
        // A send only fails during shutdown; no worker will clear the guard,
        // so release it here.
        if let Err(mpsc::error::SendError(task)) = self.task_sender.send(task) {
            task.in_flight.store(false, Ordering::Release);
        }
    }
}

/// Rate-limits and issues asynchronous classification calls for one session.
pub struct ClassificationDispatcher {
    pool: ClassifierPool,
    interval: Duration,
    last_dispatch: Option<Instant>,
    in_flight: Arc<AtomicBool>,
}

impl ClassificationDispatcher {
    /// Must be called inside a tokio runtime (the pool spawns its tasks).
    pub fn new(
        classifier: Arc<dyn SequenceClassifier>,
        interval: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            pool: ClassifierPool::new(classifier, call_timeout),
            interval,
            last_dispatch: None,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Issues a classification against the current window contents if the
    /// window is full, the interval has elapsed and no call is in flight.
    /// Returns whether a call was dispatched.
    pub fn maybe_dispatch(
        &mut self,
        window: &WindowBuffer,
        now: Instant,
        epoch: u64,
        session: &Arc<SessionState>,
    ) -> bool {
        if !window.is_full() {
            return false;
        }
        if let Some(last) = self.last_dispatch {
            if now.duration_since(last) < self.interval {
                return false;
            }
        }
        if self.in_flight.load(Ordering::Acquire) {
            // Classifier still busy from a previous tick: skip, never queue.
            return false;
        }

        // Advance the gate before the call is even enqueued, so a second
        // eligible check cannot double-fire. It advances on failure too; a
        // failing classifier must not turn the throttle into a retry storm.
        self.last_dispatch = Some(now);
        self.in_flight.store(true, Ordering::Release);

        self.pool.submit(ClassifyTask {
            tensor: window.snapshot().to_tensor(),
            epoch,
            session: Arc::clone(session),
            in_flight: Arc::clone(&self.in_flight),
        });
        true
    }

    /// Forgets the interval gate. Called on session reset so a new session
    /// does not inherit the old session's cadence; an in-flight call is left
    /// to finish and be discarded by the epoch guard.
    pub fn reset_gate(&mut self) {
        self.last_dispatch = None;
    }
}
