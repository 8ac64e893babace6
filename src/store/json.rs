//! File-backed store: a single JSON snapshot loaded at startup and written
//! back after the run. Mutations go through the in-memory store so both
//! implementations share one set of semantics.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    AccountId, AccountUpdate, Course, CourseId, EnrolOutcome, Enrolment, EnrolmentStore,
    LocalAccount, MemoryStore, NewAccount, StoreError,
};

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("read store {}", path.display()))?;
        let inner: MemoryStore =
            serde_json::from_slice(&bytes).context("parse store snapshot JSON")?;
        Ok(JsonStore {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn persist(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.inner).context("serialize store snapshot")?;
        fs::write(&self.path, text.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}

impl EnrolmentStore for JsonStore {
    fn find_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<LocalAccount>, StoreError> {
        self.inner.find_account_by_external_id(external_id)
    }

    fn find_account_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError> {
        self.inner.find_account_by_username(username)
    }

    fn create_account(&mut self, fields: NewAccount) -> Result<LocalAccount, StoreError> {
        self.inner.create_account(fields)
    }

    fn update_account(&mut self, update: AccountUpdate) -> Result<LocalAccount, StoreError> {
        self.inner.update_account(update)
    }

    fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        self.inner.list_courses()
    }

    fn list_enrolled(&self, course_id: CourseId) -> Result<Vec<Enrolment>, StoreError> {
        self.inner.list_enrolled(course_id)
    }

    fn create_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
        role_id: i64,
        time_start: i64,
        time_end: i64,
    ) -> Result<EnrolOutcome, StoreError> {
        self.inner
            .create_enrolment(course_id, account_id, role_id, time_start, time_end)
    }

    fn remove_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
    ) -> Result<(), StoreError> {
        self.inner.remove_enrolment(course_id, account_id)
    }
}
