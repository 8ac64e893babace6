//! Enrolment store collaborator interface and its local implementations.
//!
//! The LMS owns user accounts, courses, and enrolment records; this crate
//! only reads them and requests targeted mutations. Updates carry just the
//! changed fields so a store implementation never round-trips whole records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

pub type AccountId = i64;
pub type CourseId = i64;

/// Role granted on enrolment; the fixed student role.
pub const STUDENT_ROLE_ID: i64 = 5;

/// A local user account. `external_id` is the join key against the roster
/// source ("Daisy id"); unique among non-deleted accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: AccountId,
    #[serde(default)]
    pub external_id: Option<String>,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    #[serde(default)]
    pub deleted: bool,
}

impl LocalAccount {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// A course with its configured external id-number field. The field may hold
/// several comma-separated roster ids, all merged into one roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub fullname: String,
    #[serde(default)]
    pub id_number: String,
}

impl Course {
    /// Non-empty roster branch ids from the id-number field.
    pub fn roster_branches(&self) -> Vec<&str> {
        self.id_number
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// One currently-enrolled account as seen by the differ.
#[derive(Debug, Clone, Serialize)]
pub struct Enrolment {
    pub course_id: CourseId,
    pub account_id: AccountId,
    pub external_id: Option<String>,
    pub username: String,
    pub time_start: i64,
}

/// Fields for a brand new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub external_id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
}

/// A targeted account mutation; only set fields are written.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub id: AccountId,
    pub external_id: Option<String>,
    pub deleted: Option<bool>,
    pub email: Option<String>,
}

/// Outcome of an enrolment request; adding an already-enrolled account is
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrolOutcome {
    Created,
    AlreadyEnrolled,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("username {0} is already taken")]
    DuplicateUsername(String),
    #[error("external id {0} is already mapped to another account")]
    DuplicateExternalId(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Operations the reconciliation core needs from the LMS persistence layer.
///
/// Implementations must keep at most one active enrolment record per
/// (course, account) pair for this enrolment method, and must remove records
/// from every method instance of a course on unenrol.
pub trait EnrolmentStore {
    fn find_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<LocalAccount>, StoreError>;

    fn find_account_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError>;

    fn create_account(&mut self, fields: NewAccount) -> Result<LocalAccount, StoreError>;

    fn update_account(&mut self, update: AccountUpdate) -> Result<LocalAccount, StoreError>;

    fn list_courses(&self) -> Result<Vec<Course>, StoreError>;

    fn list_enrolled(&self, course_id: CourseId) -> Result<Vec<Enrolment>, StoreError>;

    fn create_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
        role_id: i64,
        time_start: i64,
        time_end: i64,
    ) -> Result<EnrolOutcome, StoreError>;

    fn remove_enrolment(
        &mut self,
        course_id: CourseId,
        account_id: AccountId,
    ) -> Result<(), StoreError>;
}
