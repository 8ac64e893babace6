//! Notification collaborator for per-course error reports.
//!
//! Actual delivery (the LMS mails `error_receiver`) is outside this crate;
//! the shipped implementation emits the report through the log.

use anyhow::Result;
use tracing::error;

/// Receives the aggregated error lines for one course after its pass
/// completes, and the outage alert when the run aborts.
pub trait ErrorNotifier {
    fn send_error_report(&mut self, course_name: &str, errors: &[String]) -> Result<()>;
}

pub struct LogNotifier {
    receiver: Option<String>,
}

impl LogNotifier {
    pub fn new(receiver: Option<String>) -> Self {
        LogNotifier { receiver }
    }
}

impl ErrorNotifier for LogNotifier {
    fn send_error_report(&mut self, course_name: &str, errors: &[String]) -> Result<()> {
        error!(
            course = course_name,
            receiver = self.receiver.as_deref().unwrap_or("<unset>"),
            count = errors.len(),
            "errors encountered while doing automatic enrolments"
        );
        for line in errors {
            error!(course = course_name, "{line}");
        }
        Ok(())
    }
}
