//! Reporting unexpected errors.
//!
//! Failures that cannot be classified are worth a look by a human.
//! Applications route them to their telemetry by implementing
//! [`Reporter`].  Reporting never fails and never changes the result
//! of the operation that reported.

/// A sink for unexpected errors.
pub trait Reporter {
    /// Reports `error`, which happened while doing `context`.
    fn report(&self, context: &str, error: &anyhow::Error);
}

impl<F: Fn(&str, &anyhow::Error)> Reporter for F {
    fn report(&self, context: &str, error: &anyhow::Error) {
        self(context, error)
    }
}

/// Reports errors to the log.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, context: &str, error: &anyhow::Error) {
        log::error!("{}: {:#}", context, error);
    }
}
