//! Structured progress reporting for index rebuilds.
//!
//! The builder emits one event per phase and source; the CLI prints them,
//! tests collect them.

use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted while rebuilding.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Phase of the operation: "load", "chunk", "embed", "index"
    pub phase: String,

    /// Source being processed
    pub source: String,

    /// Items handled in this phase (records loaded, chunks created, ...)
    pub current: u64,

    /// Total expected work (if known)
    pub total: Option<u64>,

    /// Human-readable message
    pub message: String,

    /// Elapsed time since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        source: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            source: source.into(),
            current,
            total,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };

        format!(
            "[{}] {} {} - {}",
            self.phase, self.source, progress, self.message
        )
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Progress reporter that emits events through a callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Instant,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Instant::now(),
        }
    }

    /// Reporter that only logs.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Instant::now(),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = %event.phase,
            source = %event.source,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );

        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn load(&self, source: &str, records: usize) {
        self.emit(ProgressEvent::new(
            "load",
            source,
            records as u64,
            None,
            format!("{} records", records),
        ));
    }

    pub fn chunk(&self, source: &str, chunks: usize) {
        self.emit(ProgressEvent::new(
            "chunk",
            source,
            chunks as u64,
            None,
            format!("{} chunks created", chunks),
        ));
    }

    pub fn embed(&self, source: &str, chunks: usize, model: &str) {
        self.emit(ProgressEvent::new(
            "embed",
            source,
            chunks as u64,
            Some(chunks as u64),
            format!("model={}", model),
        ));
    }

    pub fn index(&self, source: &str, records: usize, backend: &str) {
        self.emit(ProgressEvent::new(
            "index",
            source,
            records as u64,
            Some(records as u64),
            format!("writing to {}", backend),
        ));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new("embed", "arkusz.json", 5, Some(10), "model=mock");
        let formatted = event.format_simple();
        assert_eq!(formatted, "[embed] arkusz.json 5/10 - model=mock");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        reporter.load("arkusz.json", 3);
        reporter.chunk("arkusz.json", 7);

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, "load");
        assert_eq!(captured[1].current, 7);
        assert!(captured[1].elapsed_secs.is_some());
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().index("arkusz.json", 1, "sqlite");
    }
}
