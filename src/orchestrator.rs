//! Reconciliation orchestrator.
//!
//! Drives the per-course pipeline: fetch each roster branch, diff against
//! the store, resolve accounts, apply adds and removals, and report. A
//! course pass moves `PENDING → FETCHING → DIFFING → APPLYING → REPORTED`;
//! an unreachable roster source terminates the whole run
//! (`ABORTED_ON_UNAVAILABLE`) after a best-effort operator alert.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::account::{self, Resolution};
use crate::apply::{self, UnenrolReason};
use crate::config::ReconcilerConfig;
use crate::confirm::ConfirmationPolicy;
use crate::diagnostics::{CoursePhase, CourseReport, DiagnosticKind, RunSummary};
use crate::diff::{diff, unenrolment_bound, RosterCollection};
use crate::notify::ErrorNotifier;
use crate::roster::{Admission, RosterSource, SourceUnavailable};
use crate::store::{Course, EnrolmentStore};

/// Message alerted and logged when the source is down.
const SOURCE_DOWN_MESSAGE: &str =
    "Daisy connection appears to be down/flaky, aborting automatic enrolment!";

/// Which roster listing backs a course's id-number branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterFilter {
    /// Numeric external course ids with direct participant listings.
    Course,
    /// Program admissions, narrowed by starting term and completed degree.
    Program,
}

pub struct Orchestrator<'a> {
    config: &'a ReconcilerConfig,
    roster: &'a dyn RosterSource,
    store: &'a mut dyn EnrolmentStore,
    notifier: &'a mut dyn ErrorNotifier,
    policy: ConfirmationPolicy,
    interactive: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a ReconcilerConfig,
        roster: &'a dyn RosterSource,
        store: &'a mut dyn EnrolmentStore,
        notifier: &'a mut dyn ErrorNotifier,
        policy: ConfirmationPolicy,
        interactive: bool,
    ) -> Self {
        Orchestrator {
            config,
            roster,
            store,
            notifier,
            policy,
            interactive,
        }
    }

    /// True when this invocation is allowed to reconcile at all.
    fn mode_allows_run(&self) -> bool {
        self.config.automatic_enrolment
            || (self.config.manual_enrolment_mode && self.interactive)
    }

    /// Reconcile every configured course. Returns the per-course reports;
    /// fails only on a roster outage, after alerting.
    pub fn run(&mut self, filter: RosterFilter) -> Result<RunSummary> {
        if !self.mode_allows_run() {
            info!("Automatic enrolment disabled for REST enrolment. Skipping.");
            return Ok(RunSummary::default());
        }

        let courses = self
            .store
            .list_courses()
            .map_err(anyhow::Error::new)
            .context("list configured courses")?;
        let mut summary = RunSummary::default();

        for course in courses {
            if course.roster_branches().is_empty() {
                continue;
            }
            if !self.config.automatic_enrolment {
                let question = format!(
                    "Do you want to enrol/unenrol students to {}",
                    course.fullname
                );
                if !self.policy.confirm(&question) {
                    continue;
                }
            }

            match self.process_course(&course, filter) {
                Ok(report) => {
                    if report.has_errors() {
                        self.deliver_report(&course, &report.error_messages());
                    }
                    summary.courses.push(report);
                }
                Err(outage) => {
                    warn!(course = course.fullname, error = %outage, "roster source unavailable");
                    let mut report = CourseReport::new(&course);
                    report.phase = CoursePhase::AbortedOnUnavailable;
                    report.push(
                        DiagnosticKind::SourceDown,
                        format!("{SOURCE_DOWN_MESSAGE} ({outage})"),
                    );
                    self.deliver_report(&course, &report.error_messages());
                    summary.courses.push(report);
                    return Err(anyhow::Error::new(outage).context(SOURCE_DOWN_MESSAGE));
                }
            }
        }

        Ok(summary)
    }

    fn deliver_report(&mut self, course: &Course, errors: &[String]) {
        if errors.is_empty() {
            return;
        }
        if let Err(err) = self.notifier.send_error_report(&course.fullname, errors) {
            warn!(course = course.fullname, error = %err, "error report delivery failed");
        }
    }

    /// One course pass: fetch all branches, diff, apply.
    fn process_course(
        &mut self,
        course: &Course,
        filter: RosterFilter,
    ) -> Result<CourseReport, SourceUnavailable> {
        let config = self.config;
        let roster_source = self.roster;
        let mut report = CourseReport::new(course);
        report.phase = CoursePhase::Fetching;

        let mut roster = RosterCollection::default();
        for branch in course.roster_branches() {
            let participants = match filter {
                RosterFilter::Course => roster_source.fetch_participants(branch)?,
                RosterFilter::Program => roster_source
                    .fetch_program_admissions(branch)?
                    .into_iter()
                    .filter(|a| admission_qualifies(a, config.program_start_term))
                    .map(Admission::into_participant)
                    .collect(),
            };
            if participants.is_empty() {
                warn!(course = course.fullname, branch, "empty roster branch");
                report.push(
                    DiagnosticKind::EmptyRoster,
                    format!("No students found for courseid {branch}. Is the courseid incorrect?"),
                );
                continue;
            }
            if filter == RosterFilter::Course {
                let course_info = roster_source.fetch_course_info(branch)?;
                roster.note_course_start(course_info.start_date);
            }
            roster.absorb(participants);
        }

        // A completely empty merged roster means every branch came back
        // empty; skip the course rather than unenrol everyone on the
        // strength of nothing.
        if roster.is_empty() {
            report.phase = CoursePhase::Reported;
            return Ok(report);
        }

        report.phase = CoursePhase::Diffing;
        let enrolled = match self.store.list_enrolled(course.id) {
            Ok(enrolled) => enrolled,
            Err(err) => {
                report.push(DiagnosticKind::DatabaseError, format!("Database error: {err}"));
                report.phase = CoursePhase::Reported;
                return Ok(report);
            }
        };
        let bound = unenrolment_bound(config.automatic_unenrolment, roster.latest_course_start());
        let outcome = diff(&roster, &enrolled, bound);
        info!(
            course = course.fullname,
            to_enrol = outcome.to_enrol.len(),
            to_unenrol_break = outcome.to_unenrol_break.len(),
            to_unenrol_stale = outcome.to_unenrol_stale.len(),
            "diff computed"
        );

        report.phase = CoursePhase::Applying;
        let time_start = roster.latest_course_start().unwrap_or(0);
        for participant in &outcome.to_enrol {
            let resolution = account::resolve_or_create(
                participant,
                config,
                &self.policy,
                roster_source,
                &mut *self.store,
                &mut report,
            )?;
            match resolution {
                Resolution::Resolved(local) => {
                    apply::enrol(&mut *self.store, course, &local, time_start, &mut report);
                }
                Resolution::Skipped => {}
            }
        }
        // Break removals first; the differ guarantees the stale set is
        // disjoint from them.
        for enrolment in &outcome.to_unenrol_break {
            apply::unenrol(
                &mut *self.store,
                course,
                enrolment,
                UnenrolReason::Break,
                config.automatic_unenrolment,
                &self.policy,
                &mut report,
            );
        }
        for enrolment in &outcome.to_unenrol_stale {
            apply::unenrol(
                &mut *self.store,
                course,
                enrolment,
                UnenrolReason::Stale,
                config.automatic_unenrolment,
                &self.policy,
                &mut report,
            );
        }

        report.phase = CoursePhase::Reported;
        Ok(report)
    }
}

/// Program admission narrowing: with a configured starting term, the
/// admission needs a course registration at or after it and no completed
/// degree. Without one, every admission counts.
fn admission_qualifies(admission: &Admission, start_term: Option<u32>) -> bool {
    let Some(term) = start_term else {
        return true;
    };
    if admission.completed_degree {
        return false;
    }
    admission
        .course_registrations
        .iter()
        .any(|r| r.start_term.is_some_and(|t| t >= term))
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
