/// Receives coarse progress notifications from long running operations.
pub trait ProgressReporter: Send + Sync {
    /// `percent` is 0-100.
    fn report(&self, operation: &str, message: &str, percent: u8);
}

/// Discards every notification.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn report(&self, _operation: &str, _message: &str, _percent: u8) {}
}
