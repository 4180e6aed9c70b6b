//! Progress hooks for the loader and the stage runner.
//!
//! The loader counts records as it parses them and the pipeline counts
//! finished stages. Neither knows how progress is drawn; the binary plugs
//! in a terminal renderer, everything else gets [`null_progress`].

use std::sync::Arc;

/// Sink for progress events. Shared behind an `Arc` across stages.
pub trait ProgressCallback: Send + Sync {
    /// Number of units the work will take, once it is known.
    fn set_total(&self, total: u64);

    /// `delta` more units are done.
    fn inc(&self, delta: u64);

    /// What is being worked on right now (a file, a stage).
    fn set_message(&self, msg: String);

    /// The work is over; `msg` is the closing line.
    fn finish(&self, msg: String);
}

struct Silent;

impl ProgressCallback for Silent {
    fn set_total(&self, _: u64) {}
    fn inc(&self, _: u64) {}
    fn set_message(&self, _: String) {}
    fn finish(&self, _: String) {}
}

/// A sink that drops every event.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(Silent)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    struct Counter(AtomicU64);

    impl ProgressCallback for Counter {
        fn set_total(&self, _: u64) {}
        fn inc(&self, delta: u64) {
            self.0.fetch_add(delta, Ordering::Relaxed);
        }
        fn set_message(&self, _: String) {}
        fn finish(&self, _: String) {}
    }

    #[test]
    fn shared_sink_accumulates_increments() {
        let counter = Arc::new(Counter(AtomicU64::new(0)));
        let sink: Arc<dyn ProgressCallback> = counter.clone();
        sink.inc(500);
        sink.inc(37);
        assert_eq!(counter.0.load(Ordering::Relaxed), 537);
    }

    #[test]
    fn null_progress_accepts_everything() {
        let sink = null_progress();
        sink.set_total(10);
        sink.inc(3);
        sink.set_message("sp".to_string());
        sink.finish("done".to_string());
    }
}
