use super::{resolve_or_create, Resolution, FALLBACK_EMAIL_DOMAIN};
use crate::config::ReconcilerConfig;
use crate::confirm::ConfirmationPolicy;
use crate::diagnostics::{CourseReport, DiagnosticKind};
use crate::roster::{
    Admission, CourseInfo, Participant, PersonRecord, RosterSource, SourceUnavailable,
    UsernameRecord,
};
use crate::store::{
    AccountId, AccountUpdate, Course, CourseId, EnrolOutcome, Enrolment, EnrolmentStore,
    LocalAccount, MemoryStore, NewAccount, StoreError,
};

struct ScriptedRoster {
    usernames: Vec<UsernameRecord>,
    down: bool,
}

impl ScriptedRoster {
    fn with_usernames(usernames: Vec<(&str, &str)>) -> Self {
        ScriptedRoster {
            usernames: usernames
                .into_iter()
                .map(|(realm, username)| UsernameRecord {
                    realm: Some(realm.to_string()),
                    username: username.to_string(),
                })
                .collect(),
            down: false,
        }
    }

    fn down() -> Self {
        ScriptedRoster {
            usernames: Vec::new(),
            down: true,
        }
    }
}

impl RosterSource for ScriptedRoster {
    fn fetch_participants(&self, _: &str) -> Result<Vec<Participant>, SourceUnavailable> {
        Ok(Vec::new())
    }

    fn fetch_course_info(&self, _: &str) -> Result<CourseInfo, SourceUnavailable> {
        Ok(CourseInfo::default())
    }

    fn fetch_usernames(&self, _: &str) -> Result<Vec<UsernameRecord>, SourceUnavailable> {
        if self.down {
            return Err(SourceUnavailable::Status {
                status: 503,
                path: "person/p1/usernames".to_string(),
            });
        }
        Ok(self.usernames.clone())
    }

    fn fetch_program_admissions(&self, _: &str) -> Result<Vec<Admission>, SourceUnavailable> {
        Ok(Vec::new())
    }
}

/// Store wrapper that fails selected write operations.
struct FlakyStore {
    inner: MemoryStore,
    fail_creates: bool,
    fail_updates: bool,
}

impl FlakyStore {
    fn new(inner: MemoryStore) -> Self {
        FlakyStore {
            inner,
            fail_creates: false,
            fail_updates: false,
        }
    }
}

impl EnrolmentStore for FlakyStore {
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
        if self.fail_creates {
            return Err(StoreError::Backend("insert refused".to_string()));
        }
        self.inner.create_account(fields)
    }

    fn update_account(&mut self, update: AccountUpdate) -> Result<LocalAccount, StoreError> {
        if self.fail_updates {
            return Err(StoreError::Backend("update refused".to_string()));
        }
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

fn config(realm: Option<&str>, automatic_user_creation: bool) -> ReconcilerConfig {
    ReconcilerConfig {
        automatic_enrolment: true,
        automatic_unenrolment: false,
        automatic_user_creation,
        user_realm: realm.map(str::to_string),
        course_resource: "courseSegment".to_string(),
        user_resource: "person".to_string(),
        program_resource: "program".to_string(),
        program_start_term: None,
        error_receiver: None,
        api_base_url: "https://daisy.example.org/rest".to_string(),
        api_username: "lms".to_string(),
        api_password: String::new(),
        manual_enrolment_mode: false,
    }
}

fn participant(id: &str, email: Option<&str>) -> Participant {
    Participant {
        person: PersonRecord {
            id: id.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.map(str::to_string),
        },
        on_break: false,
    }
}

fn account(id: AccountId, username: &str, external_id: Option<&str>, deleted: bool) -> LocalAccount {
    LocalAccount {
        id,
        external_id: external_id.map(str::to_string),
        username: username.to_string(),
        firstname: "Ada".to_string(),
        lastname: "Lovelace".to_string(),
        email: format!("{username}@example.org"),
        deleted,
    }
}

fn report() -> CourseReport {
    CourseReport::new(&Course {
        id: 1,
        fullname: "Course".to_string(),
        id_number: "100".to_string(),
    })
}

fn kinds(report: &CourseReport) -> Vec<DiagnosticKind> {
    report.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn existing_live_account_needs_no_roster_lookup() {
    let mut store = MemoryStore::new().with_account(account(1, "ada", Some("p1"), false));
    let mut report = report();
    // The roster is down; resolution must succeed without touching it.
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(Some("su.se"), true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::down(),
        &mut store,
        &mut report,
    )
    .unwrap();
    match resolution {
        Resolution::Resolved(found) => assert_eq!(found.id, 1),
        Resolution::Skipped => panic!("expected resolution"),
    }
    assert!(report.diagnostics.is_empty());
}

#[test]
fn deleted_account_is_reactivated_in_place() {
    let mut store = MemoryStore::new().with_account(account(1, "ada", Some("p1"), true));
    let mut report = report();
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(Some("su.se"), true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::down(),
        &mut store,
        &mut report,
    )
    .unwrap();
    let Resolution::Resolved(revived) = resolution else {
        panic!("expected resolution");
    };
    assert!(!revived.deleted);
    assert_eq!(kinds(&report), vec![DiagnosticKind::UserCreated]);
}

#[test]
fn realm_match_yields_lowercased_username() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let roster = ScriptedRoster::with_usernames(vec![("a", "x"), ("b", "Y")]);
    let resolution = resolve_or_create(
        &participant("p1", Some("ada@example.org")),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &roster,
        &mut store,
        &mut report,
    )
    .unwrap();
    let Resolution::Resolved(created) = resolution else {
        panic!("expected resolution");
    };
    assert_eq!(created.username, "y@b");
}

#[test]
fn realm_without_match_is_skipped_with_diagnostic() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let roster = ScriptedRoster::with_usernames(vec![("a", "x")]);
    let resolution = resolve_or_create(
        &participant("p1", Some("ada@example.org")),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &roster,
        &mut store,
        &mut report,
    )
    .unwrap();
    assert!(matches!(resolution, Resolution::Skipped));
    assert_eq!(kinds(&report), vec![DiagnosticKind::UsernameNotFound]);
    assert!(store.find_account_by_external_id("p1").unwrap().is_none());
}

#[test]
fn no_realm_falls_back_to_email_username() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let resolution = resolve_or_create(
        &participant("p1", Some("ada@example.org")),
        &config(None, true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::with_usernames(vec![]),
        &mut store,
        &mut report,
    )
    .unwrap();
    let Resolution::Resolved(created) = resolution else {
        panic!("expected resolution");
    };
    assert_eq!(created.username, "ada@example.org");
}

#[test]
fn no_realm_and_no_email_is_a_resolution_failure() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(None, true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::with_usernames(vec![]),
        &mut store,
        &mut report,
    )
    .unwrap();
    assert!(matches!(resolution, Resolution::Skipped));
    assert_eq!(kinds(&report), vec![DiagnosticKind::UsernameNotFound]);
}

#[test]
fn legacy_account_gets_external_id_attached() {
    let mut store = MemoryStore::new().with_account(account(5, "y@b", None, false));
    let mut report = report();
    let roster = ScriptedRoster::with_usernames(vec![("b", "Y")]);
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &roster,
        &mut store,
        &mut report,
    )
    .unwrap();
    let Resolution::Resolved(repaired) = resolution else {
        panic!("expected resolution");
    };
    assert_eq!(repaired.id, 5);
    assert_eq!(repaired.external_id.as_deref(), Some("p1"));
    assert_eq!(kinds(&report), vec![DiagnosticKind::DaisyIdAdded]);
}

#[test]
fn failed_attach_skips_but_does_not_abort() {
    let mut store = FlakyStore::new(MemoryStore::new().with_account(account(5, "y@b", None, false)));
    store.fail_updates = true;
    let mut report = report();
    let roster = ScriptedRoster::with_usernames(vec![("b", "Y")]);
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &roster,
        &mut store,
        &mut report,
    )
    .unwrap();
    assert!(matches!(resolution, Resolution::Skipped));
    assert_eq!(kinds(&report), vec![DiagnosticKind::DaisyIdAddFailed]);
    assert!(report.has_errors());
}

#[test]
fn creation_without_confirmation_defaults_to_skip() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let resolution = resolve_or_create(
        &participant("p1", Some("ada@example.org")),
        &config(None, false),
        &ConfirmationPolicy::DenyAll,
        &ScriptedRoster::with_usernames(vec![]),
        &mut store,
        &mut report,
    )
    .unwrap();
    assert!(matches!(resolution, Resolution::Skipped));
    assert_eq!(kinds(&report), vec![DiagnosticKind::UserCreateDeclined]);
    assert!(!report.has_errors());
}

#[test]
fn missing_email_is_synthesized_from_username_localpart() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let roster = ScriptedRoster::with_usernames(vec![("b", "abcd1234")]);
    let resolution = resolve_or_create(
        &participant("p1", None),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &roster,
        &mut store,
        &mut report,
    )
    .unwrap();
    let Resolution::Resolved(created) = resolution else {
        panic!("expected resolution");
    };
    assert_eq!(created.email, format!("abcd1234@{FALLBACK_EMAIL_DOMAIN}"));
    assert!(kinds(&report).contains(&DiagnosticKind::EmailFixed));
}

#[test]
fn create_failure_is_recorded_and_skipped() {
    let mut store = FlakyStore::new(MemoryStore::new());
    store.fail_creates = true;
    let mut report = report();
    let resolution = resolve_or_create(
        &participant("p1", Some("ada@example.org")),
        &config(None, true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::with_usernames(vec![]),
        &mut store,
        &mut report,
    )
    .unwrap();
    assert!(matches!(resolution, Resolution::Skipped));
    assert_eq!(kinds(&report), vec![DiagnosticKind::UserCreateFailed]);
}

#[test]
fn username_lookup_outage_escalates() {
    let mut store = MemoryStore::new();
    let mut report = report();
    let result = resolve_or_create(
        &participant("p1", None),
        &config(Some("b"), true),
        &ConfirmationPolicy::AutoApprove,
        &ScriptedRoster::down(),
        &mut store,
        &mut report,
    );
    assert!(matches!(result, Err(SourceUnavailable::Status { .. })));
}
