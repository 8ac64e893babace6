//! Per-course diagnostics and the run report.
//!
//! Every noteworthy per-participant outcome is recorded as a [`Diagnostic`]
//! with a fixed kind, mirroring the audit events the LMS side knows about.
//! The per-course aggregate doubles as the machine-readable run report.

use serde::Serialize;

use crate::store::Course;

/// Fixed set of diagnostic kinds recorded during a course pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UsernameNotFound,
    DaisyIdAdded,
    DaisyIdAddFailed,
    EmailFixed,
    UserCreated,
    UserCreateFailed,
    UserCreateDeclined,
    EnrolmentExists,
    Enrolled,
    Unenrolled,
    EnrolFailed,
    UnenrolFailed,
    EmptyRoster,
    SourceDown,
    DatabaseError,
}

/// Severity decides whether a diagnostic counts towards the error report
/// handed to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::UsernameNotFound
            | DiagnosticKind::DaisyIdAddFailed
            | DiagnosticKind::UserCreateFailed
            | DiagnosticKind::EnrolFailed
            | DiagnosticKind::UnenrolFailed
            | DiagnosticKind::SourceDown
            | DiagnosticKind::DatabaseError => Severity::Error,
            DiagnosticKind::DaisyIdAdded
            | DiagnosticKind::EmailFixed
            | DiagnosticKind::UserCreated
            | DiagnosticKind::UserCreateDeclined
            | DiagnosticKind::EnrolmentExists
            | DiagnosticKind::Enrolled
            | DiagnosticKind::Unenrolled
            | DiagnosticKind::EmptyRoster => Severity::Info,
        }
    }
}

/// A single recorded outcome, exportable to an audit sink.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

/// Terminal and intermediate states of a course pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoursePhase {
    Pending,
    Fetching,
    Diffing,
    Applying,
    Reported,
    AbortedOnUnavailable,
}

/// Aggregate outcome of one course pass. Created fresh per run, reported,
/// then discarded.
#[derive(Debug, Serialize)]
pub struct CourseReport {
    pub course_id: i64,
    pub course_name: String,
    pub phase: CoursePhase,
    /// Usernames enrolled during this pass.
    pub enrolled: Vec<String>,
    /// Usernames unenrolled during this pass.
    pub unenrolled: Vec<String>,
    /// Usernames of accounts created during this pass.
    pub created: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CourseReport {
    pub fn new(course: &Course) -> Self {
        CourseReport {
            course_id: course.id,
            course_name: course.fullname.clone(),
            phase: CoursePhase::Pending,
            enrolled: Vec::new(),
            unenrolled: Vec::new(),
            created: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, message));
    }

    /// Messages of error severity, in recording order.
    pub fn error_messages(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Whole-run aggregate written to `--out`.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub courses: Vec<CourseReport>,
}
