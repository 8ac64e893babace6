//! Enrolment differ: decides who gets enrolled and who gets removed.
//!
//! Pure set arithmetic over the merged roster and the current enrolment
//! state, keyed by external person id. Break removal is resolved before
//! stale removal so the two paths can never both fire for one account.

use std::collections::{BTreeMap, BTreeSet};

use crate::roster::Participant;
use crate::store::Enrolment;

/// Grace period subtracted from the latest course start when computing the
/// stale-unenrolment bound.
pub const UNENROL_GRACE_SECS: i64 = 7 * 24 * 60 * 60;

/// Roster state merged across all id-number branches of one course.
///
/// Break participants live in their own bucket: they never feed `to_enrol`
/// and take priority over the stale path. A person reported on break by any
/// branch stays in the break bucket even if another branch lists them as
/// active.
#[derive(Debug, Default)]
pub struct RosterCollection {
    active: BTreeMap<String, Participant>,
    on_break: BTreeMap<String, Participant>,
    latest_course_start: Option<i64>,
}

impl RosterCollection {
    pub fn absorb(&mut self, participants: Vec<Participant>) {
        for participant in participants {
            let id = participant.person_id().to_string();
            if participant.on_break {
                self.active.remove(&id);
                self.on_break.insert(id, participant);
            } else if !self.on_break.contains_key(&id) {
                self.active.insert(id, participant);
            }
        }
    }

    pub fn note_course_start(&mut self, start: Option<i64>) {
        if let Some(start) = start {
            self.latest_course_start = Some(self.latest_course_start.map_or(start, |s| s.max(start)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.on_break.is_empty()
    }

    pub fn latest_course_start(&self) -> Option<i64> {
        self.latest_course_start
    }
}

/// The three action sets computed for one course.
#[derive(Debug, Default)]
pub struct DiffOutcome {
    pub to_enrol: Vec<Participant>,
    pub to_unenrol_break: Vec<Enrolment>,
    pub to_unenrol_stale: Vec<Enrolment>,
}

/// Cutoff for stale unenrolment. Enrolments that started before the bound
/// are presumed to belong to a past course offering and are left alone.
/// With automatic unenrolment every enrolled account is in scope.
pub fn unenrolment_bound(automatic_unenrolment: bool, latest_course_start: Option<i64>) -> i64 {
    if automatic_unenrolment {
        return 0;
    }
    latest_course_start
        .unwrap_or(0)
        .saturating_sub(UNENROL_GRACE_SECS)
        .max(0)
}

pub fn diff(roster: &RosterCollection, enrolled: &[Enrolment], bound: i64) -> DiffOutcome {
    let mut outcome = DiffOutcome::default();

    let enrolled_ids: BTreeSet<&str> = enrolled
        .iter()
        .filter_map(|e| e.external_id.as_deref())
        .collect();

    for participant in roster.active.values() {
        if !enrolled_ids.contains(participant.person_id()) {
            outcome.to_enrol.push(participant.clone());
        }
    }

    for enrolment in enrolled {
        let Some(id) = enrolment.external_id.as_deref() else {
            // Not an account this method manages; never touched.
            continue;
        };
        if roster.on_break.contains_key(id) {
            outcome.to_unenrol_break.push(enrolment.clone());
        } else if !roster.active.contains_key(id) && enrolment.time_start >= bound {
            outcome.to_unenrol_stale.push(enrolment.clone());
        }
    }

    outcome
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
