//! Roster source collaborator: wire types and the REST client.
//!
//! The client is pure request/response. Exactly two outcomes surface from a
//! fetch: data (possibly empty, which is a valid answer) or
//! [`SourceUnavailable`]. The distinction is load-bearing — treating a down
//! source as an empty roster would unenrol everyone.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::ReconcilerConfig;

/// Every fetch is bounded; a hung source must look like an outage, not an
/// empty roster.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The roster source is unreachable or answered with something other than
/// HTTP 200. Fatal for the whole reconciliation run.
#[derive(Debug, Error)]
pub enum SourceUnavailable {
    #[error("unexpected server reply: http code {status} requesting {path}")]
    Status { status: u16, path: String },
    #[error("transport failure requesting {path}: {detail}")]
    Transport { path: String, detail: String },
}

/// Identity fields of a remote person.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// One course/program participant as reported by the source. Immutable
/// snapshot per fetch; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub person: PersonRecord,
    /// Temporary leave; drives a targeted unenrol instead of the stale path.
    #[serde(rename = "onBreak", default)]
    pub on_break: bool,
}

impl Participant {
    pub fn person_id(&self) -> &str {
        &self.person.id
    }

    pub fn fullname(&self) -> String {
        format!("{} {}", self.person.first_name, self.person.last_name)
    }
}

/// Course metadata; `start_date` is epoch seconds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseInfo {
    #[serde(rename = "startDate", default)]
    pub start_date: Option<i64>,
}

/// One entry of a person's username list.
#[derive(Debug, Clone, Deserialize)]
pub struct UsernameRecord {
    #[serde(default)]
    pub realm: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseRegistration {
    #[serde(rename = "startTerm", default)]
    pub start_term: Option<u32>,
}

/// One program admission. Narrowed by the orchestrator before becoming
/// participants.
#[derive(Debug, Clone, Deserialize)]
pub struct Admission {
    pub person: PersonRecord,
    #[serde(rename = "onBreak", default)]
    pub on_break: bool,
    #[serde(rename = "courseRegistrations", default)]
    pub course_registrations: Vec<CourseRegistration>,
    #[serde(rename = "completedDegree", default)]
    pub completed_degree: bool,
}

impl Admission {
    pub fn into_participant(self) -> Participant {
        Participant {
            person: self.person,
            on_break: self.on_break,
        }
    }
}

/// Read-side operations the core needs from the roster source.
pub trait RosterSource {
    fn fetch_participants(&self, external_id: &str) -> Result<Vec<Participant>, SourceUnavailable>;

    fn fetch_course_info(&self, external_id: &str) -> Result<CourseInfo, SourceUnavailable>;

    fn fetch_usernames(&self, person_id: &str) -> Result<Vec<UsernameRecord>, SourceUnavailable>;

    fn fetch_program_admissions(
        &self,
        program_id: &str,
    ) -> Result<Vec<Admission>, SourceUnavailable>;
}

/// Blocking REST client with basic auth against the configured base URL.
pub struct RestRosterClient {
    agent: ureq::Agent,
    base_url: String,
    auth_header: String,
    course_resource: String,
    user_resource: String,
    program_resource: String,
}

impl RestRosterClient {
    pub fn new(config: &ReconcilerConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .http_status_as_error(false)
            .build();
        let credentials = format!("{}:{}", config.api_username, config.api_password);
        RestRosterClient {
            agent: agent_config.new_agent(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {}", STANDARD.encode(credentials)),
            course_resource: config.course_resource.clone(),
            user_resource: config.user_resource.clone(),
            program_resource: config.program_resource.clone(),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, SourceUnavailable> {
        let path = segments.join("/");
        let url = format!("{}/{}", self.base_url, path);
        let result = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("Authorization", &self.auth_header)
            .call();
        match result {
            Ok(mut response) => {
                let status = response.status().as_u16();
                if status != 200 {
                    return Err(SourceUnavailable::Status { status, path });
                }
                response
                    .body_mut()
                    .read_json::<T>()
                    .map_err(|err| SourceUnavailable::Transport {
                        path,
                        detail: err.to_string(),
                    })
            }
            Err(ureq::Error::StatusCode(status)) => Err(SourceUnavailable::Status { status, path }),
            Err(err) => Err(SourceUnavailable::Transport {
                path,
                detail: err.to_string(),
            }),
        }
    }
}

impl RosterSource for RestRosterClient {
    fn fetch_participants(&self, external_id: &str) -> Result<Vec<Participant>, SourceUnavailable> {
        self.get_json(&[&self.course_resource, external_id, "participants"])
    }

    fn fetch_course_info(&self, external_id: &str) -> Result<CourseInfo, SourceUnavailable> {
        self.get_json(&[&self.course_resource, external_id])
    }

    fn fetch_usernames(&self, person_id: &str) -> Result<Vec<UsernameRecord>, SourceUnavailable> {
        self.get_json(&[&self.user_resource, person_id, "usernames"])
    }

    fn fetch_program_admissions(
        &self,
        program_id: &str,
    ) -> Result<Vec<Admission>, SourceUnavailable> {
        self.get_json(&[&self.program_resource, program_id, "admissions"])
    }
}
