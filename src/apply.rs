//! Enrolment applier: executes add/remove decisions against the store.
//!
//! Every apply is independent; one account's failure is recorded and the
//! batch moves on.

use tracing::info;

use crate::confirm::ConfirmationPolicy;
use crate::diagnostics::{CourseReport, DiagnosticKind};
use crate::store::{Course, EnrolOutcome, Enrolment, EnrolmentStore, LocalAccount, STUDENT_ROLE_ID};

/// Which decision path asked for the removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnenrolReason {
    Break,
    Stale,
}

pub fn enrol(
    store: &mut dyn EnrolmentStore,
    course: &Course,
    account: &LocalAccount,
    time_start: i64,
    report: &mut CourseReport,
) {
    match store.create_enrolment(course.id, account.id, STUDENT_ROLE_ID, time_start, 0) {
        Ok(EnrolOutcome::Created) => {
            report.enrolled.push(account.username.clone());
            report.push(
                DiagnosticKind::Enrolled,
                format!("Enrolled user {} to course {}", account.username, course.fullname),
            );
            info!(
                username = account.username,
                course = course.fullname,
                "enrolled"
            );
        }
        Ok(EnrolOutcome::AlreadyEnrolled) => {
            report.push(
                DiagnosticKind::EnrolmentExists,
                format!("User {} is already enrolled", account.username),
            );
        }
        Err(err) => {
            report.push(
                DiagnosticKind::EnrolFailed,
                format!(
                    "Failed to enrol user {} to course {}: {err}",
                    account.username, course.fullname
                ),
            );
        }
    }
}

pub fn unenrol(
    store: &mut dyn EnrolmentStore,
    course: &Course,
    enrolment: &Enrolment,
    reason: UnenrolReason,
    automatic_unenrolment: bool,
    policy: &ConfirmationPolicy,
    report: &mut CourseReport,
) {
    if !automatic_unenrolment {
        let question = format!(
            "Do you want to unenrol {} from {}",
            enrolment.username, course.fullname
        );
        if !policy.confirm(&question) {
            return;
        }
    }
    match store.remove_enrolment(course.id, enrolment.account_id) {
        Ok(()) => {
            report.unenrolled.push(enrolment.username.clone());
            let cause = match reason {
                UnenrolReason::Break => " (on break)",
                UnenrolReason::Stale => "",
            };
            report.push(
                DiagnosticKind::Unenrolled,
                format!(
                    "Unenrolled user {} (idnumber {}) from course {}{cause}",
                    enrolment.username,
                    enrolment.external_id.as_deref().unwrap_or("-"),
                    course.fullname
                ),
            );
            info!(
                username = enrolment.username,
                course = course.fullname,
                ?reason,
                "unenrolled"
            );
        }
        Err(err) => {
            report.push(
                DiagnosticKind::UnenrolFailed,
                format!(
                    "Failed to unenrol user {} from course {}: {err}",
                    enrolment.username, course.fullname
                ),
            );
        }
    }
}
