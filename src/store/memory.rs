//! In-memory enrolment store.
//!
//! Backs the JSON snapshot store and every test. Enrolment-method instances
//! are modeled explicitly so the applier's idempotence rules (one instance
//! per course, unenrol sweeps all instances) are exercised for real.

use serde::{Deserialize, Serialize};

use super::{
    AccountId, AccountUpdate, Course, CourseId, EnrolOutcome, Enrolment, EnrolmentStore,
    LocalAccount, NewAccount, StoreError,
};

/// One enrolment-method instance attached to a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct EnrolInstance {
    pub id: i64,
    pub course_id: CourseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct EnrolmentRow {
    pub instance_id: i64,
    pub account_id: AccountId,
    pub role_id: i64,
    pub time_start: i64,
    pub time_end: i64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub(super) accounts: Vec<LocalAccount>,
    #[serde(default)]
    pub(super) courses: Vec<Course>,
    #[serde(default)]
    pub(super) instances: Vec<EnrolInstance>,
    #[serde(default)]
    pub(super) enrolments: Vec<EnrolmentRow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_course(mut self, course: Course) -> Self {
        self.courses.push(course);
        self
    }

    pub fn with_account(mut self, account: LocalAccount) -> Self {
        self.accounts.push(account);
        self
    }

    /// Seed an enrolment directly, creating the method instance if needed.
    /// Intended for test setup; goes through the same instance bookkeeping
    /// as the real path.
    pub fn seed_enrolment(&mut self, course_id: CourseId, account_id: AccountId, time_start: i64) {
        let instance_id = self.instance_for(course_id);
        self.enrolments.push(EnrolmentRow {
            instance_id,
            account_id,
            role_id: super::STUDENT_ROLE_ID,
            time_start,
            time_end: 0,
        });
    }

    pub fn account(&self, id: AccountId) -> Option<&LocalAccount> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Instance ids belonging to a course, in creation order.
    fn course_instances(&self, course_id: CourseId) -> Vec<i64> {
        self.instances
            .iter()
            .filter(|i| i.course_id == course_id)
            .map(|i| i.id)
            .collect()
    }

    /// First instance for the course, lazily created.
    fn instance_for(&mut self, course_id: CourseId) -> i64 {
        if let Some(id) = self.course_instances(course_id).first() {
            return *id;
        }
        let id = self.instances.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        self.instances.push(EnrolInstance { id, course_id });
        id
    }

    fn next_account_id(&self) -> AccountId {
        self.accounts.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }
}

impl EnrolmentStore for MemoryStore {
    fn find_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<LocalAccount>, StoreError> {
        let matches: Vec<&LocalAccount> = self
            .accounts
            .iter()
            .filter(|a| a.external_id.as_deref() == Some(external_id))
            .collect();
        // Prefer a live account; a deleted match still surfaces so the
        // resolver can reactivate it.
        let found = matches
            .iter()
            .find(|a| !a.deleted)
            .or_else(|| matches.first());
        Ok(found.map(|a| (*a).clone()))
    }

    fn find_account_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError> {
        Ok(self
            .accounts
            .iter()
            .find(|a| a.username == username)
            .cloned())
    }

    fn create_account(&mut self, fields: NewAccount) -> Result<LocalAccount, StoreError> {
        if self.accounts.iter().any(|a| a.username == fields.username) {
            return Err(StoreError::DuplicateUsername(fields.username));
        }
        let duplicate_external = self
            .accounts
            .iter()
            .any(|a| !a.deleted && a.external_id.as_deref() == Some(fields.external_id.as_str()));
        if duplicate_external {
            return Err(StoreError::DuplicateExternalId(fields.external_id));
        }
        let account = LocalAccount {
            id: self.next_account_id(),
            external_id: Some(fields.external_id),
            username: fields.username,
            firstname: fields.firstname,
            lastname: fields.lastname,
            email: fields.email,
            deleted: false,
        };
        self.accounts.push(account.clone());
        Ok(account)
    }

    fn update_account(&mut self, update: AccountUpdate) -> Result<LocalAccount, StoreError> {
        if let Some(external_id) = update.external_id.as_deref() {
            let taken = self.accounts.iter().any(|a| {
                a.id != update.id && !a.deleted && a.external_id.as_deref() == Some(external_id)
            });
            if taken {
                return Err(StoreError::DuplicateExternalId(external_id.to_string()));
            }
        }
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == update.id)
            .ok_or(StoreError::AccountNotFound(update.id))?;
        if let Some(external_id) = update.external_id {
            account.external_id = Some(external_id);
        }
        if let Some(deleted) = update.deleted {
            account.deleted = deleted;
        }
        if let Some(email) = update.email {
            account.email = email;
        }
        Ok(account.clone())
    }

    fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.courses.clone())
    }

    fn list_enrolled(&self, course_id: CourseId) -> Result<Vec<Enrolment>, StoreError> {
        let instances = self.course_instances(course_id);
        let mut enrolled = Vec::new();
        for row in &self.enrolments {
            if !instances.contains(&row.instance_id) {
                continue;
            }
            let account = self
                .account(row.account_id)
                .ok_or(StoreError::AccountNotFound(row.account_id))?;
            enrolled.push(Enrolment {
                course_id,
                account_id: account.id,
                external_id: account.external_id.clone(),
                username: account.username.clone(),
                time_start: row.time_start,
            });
        }
        Ok(enrolled)
    }

    fn create_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
        role_id: i64,
        time_start: i64,
        time_end: i64,
    ) -> Result<EnrolOutcome, StoreError> {
        if self.account(account_id).is_none() {
            return Err(StoreError::AccountNotFound(account_id));
        }
        let instances = self.course_instances(course_id);
        let already = self
            .enrolments
            .iter()
            .any(|row| row.account_id == account_id && instances.contains(&row.instance_id));
        if already {
            return Ok(EnrolOutcome::AlreadyEnrolled);
        }
        let instance_id = self.instance_for(course_id);
        self.enrolments.push(EnrolmentRow {
            instance_id,
            account_id,
            role_id,
            time_start,
            time_end,
        });
        Ok(EnrolOutcome::Created)
    }

    fn remove_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
    ) -> Result<(), StoreError> {
        // Sweep every instance of the course, defensive against duplicates
        // left behind by earlier versions.
        let instances = self.course_instances(course_id);
        self.enrolments
            .retain(|row| !(row.account_id == account_id && instances.contains(&row.instance_id)));
        Ok(())
    }
}
