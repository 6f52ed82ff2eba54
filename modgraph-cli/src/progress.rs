use modgraph_lib::ProgressReporter;

/// Writes progress lines to stderr so stdout stays clean for `--json` output.
pub struct StderrProgressReporter {
    pub quiet: bool,
}

impl ProgressReporter for StderrProgressReporter {
    fn report(&self, operation: &str, message: &str, percent: u8) {
        if !self.quiet {
            eprintln!("[{:>3}%] {}: {}", percent, operation, message);
        }
    }
}
