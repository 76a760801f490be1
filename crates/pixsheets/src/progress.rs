//! Progress reporting to the caller

/// Receives human-readable progress lines while a batch runs.
///
/// Implemented for any `Fn(&str) + Send + Sync`, so a closure forwarding to a
/// UI widget or a channel is enough:
///
/// ```rust
/// use pixsheets::ProgressSink;
///
/// let sink = |line: &str| eprintln!("{}", line);
/// sink.report("starting");
/// ```
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _message: &str) {}
}

/// Log a progress line and forward it to the sink
pub(crate) fn emit(sink: &dyn ProgressSink, message: String) {
    tracing::info!("{}", message);
    sink.report(&message);
}
