//! Progress reporting and supersession of in-flight runs.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Single encode without a target
    Encoding,
    /// Quality bisection at the working resolution
    QualitySearch,
    /// Decreasing-resolution ladder
    Downscale,
    /// Picking the result
    Finishing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Encoding => "encoding",
            Phase::QualitySearch => "quality search",
            Phase::Downscale => "downscale",
            Phase::Finishing => "finishing",
        };
        f.write_str(name)
    }
}

/// One progress message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub phase: Phase,
    /// 0-100, never decreasing within a run
    pub percent: u8,
    /// Short status message
    pub message: String,
}

type Callback = dyn Fn(&ProgressUpdate) + Send + Sync;

/// Observational progress channel.
///
/// Calls the callback synchronously and never waits on it; a caller that
/// cannot keep up may drop messages.
#[derive(Clone, Default)]
pub struct Progress {
    callback: Option<Arc<Callback>>,
    last_percent: Arc<AtomicU8>,
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("has_callback", &self.callback.is_some())
            .field("last_percent", &self.last_percent.load(Ordering::Relaxed))
            .finish()
    }
}

impl Progress {
    /// Progress channel that discards every update.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Progress channel backed by `callback`.
    pub fn new(callback: impl Fn(&ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            last_percent: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Start a new run: percent counts up from zero again.
    pub(crate) fn restart(&self) {
        self.last_percent.store(0, Ordering::Relaxed);
    }

    /// Report progress. Percent is clamped to 100 and never moves backwards
    /// within a run.
    pub fn report(&self, phase: Phase, percent: u8, message: impl Into<String>) {
        let Some(callback) = &self.callback else {
            return;
        };

        let percent = percent.min(100);
        let previous = self.last_percent.fetch_max(percent, Ordering::Relaxed);

        callback(&ProgressUpdate {
            phase,
            percent: percent.max(previous),
            message: message.into(),
        });
    }
}

/// Hands out tokens; each new token supersedes all earlier ones.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    generation: Arc<AtomicU64>,
}

impl RequestTracker {
    /// New tracker with no active request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request, superseding any in flight.
    pub fn begin(&self) -> RequestToken {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RequestToken {
            generation,
            current: Arc::clone(&self.generation),
        }
    }

    /// Supersede every outstanding token without starting a new request.
    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Identity of one request, checked at every suspension point of a run.
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl RequestToken {
    /// Token that is never superseded.
    pub fn detached() -> Self {
        RequestTracker::new().begin()
    }

    /// Generation number of this request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a newer request has started since this one.
    pub fn is_superseded(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_never_decreases() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |u| sink.lock().unwrap().push(u.percent));

        progress.report(Phase::QualitySearch, 40, "q=0.50");
        progress.report(Phase::QualitySearch, 20, "q=0.25");
        progress.report(Phase::Finishing, 250, "done");

        assert_eq!(*seen.lock().unwrap(), vec![40, 40, 100]);
    }

    #[test]
    fn test_restart_resets_percent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |u| sink.lock().unwrap().push(u.percent));

        progress.report(Phase::Finishing, 100, "first run done");
        progress.restart();
        progress.report(Phase::QualitySearch, 5, "second run");

        assert_eq!(*seen.lock().unwrap(), vec![100, 5]);
    }

    #[test]
    fn test_silent_progress() {
        Progress::silent().report(Phase::Encoding, 50, "ignored");
    }

    #[test]
    fn test_later_request_wins() {
        let tracker = RequestTracker::new();
        let first = tracker.begin();
        assert!(!first.is_superseded());

        let second = tracker.begin();
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert!(second.generation() > first.generation());

        tracker.cancel_all();
        assert!(second.is_superseded());
    }

    #[test]
    fn test_detached_token() {
        let token = RequestToken::detached();
        assert!(!token.is_superseded());
        assert!(!token.clone().is_superseded());
    }
}
