//! Reconciler configuration.
//!
//! Loaded once from a JSON file, validated, then passed by reference into
//! every component — no ambient configuration access anywhere in the core.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Environment override that flips `manual_enrolment_mode` on.
pub const MANUAL_ENROLMENT_ENV: &str = "MANUAL_ENROLMENT";
/// Environment override for the API password, so secrets can stay out of
/// the config file.
pub const API_PASSWORD_ENV: &str = "DAISY_API_PASSWORD";

fn default_true() -> bool {
    true
}

fn default_program_resource() -> String {
    "program".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Enrol users without confirmation. When disabled the run is a no-op
    /// unless manual mode is active in an interactive session.
    #[serde(default = "default_true")]
    pub automatic_enrolment: bool,
    /// When enabled, stale unenrolment considers every enrolled account;
    /// when disabled, enrolments predating the course-start bound are left
    /// alone and each removal needs confirmation.
    #[serde(default)]
    pub automatic_unenrolment: bool,
    /// Create missing accounts without confirmation.
    #[serde(default)]
    pub automatic_user_creation: bool,
    /// Realm to select from a person's username list. Unset falls back to
    /// the participant email as username.
    #[serde(default)]
    pub user_realm: Option<String>,
    pub course_resource: String,
    pub user_resource: String,
    #[serde(default = "default_program_resource")]
    pub program_resource: String,
    /// Narrow program admissions to those with a course registration at or
    /// after this term and no completed degree.
    #[serde(default)]
    pub program_start_term: Option<u32>,
    /// Address the per-course error report is addressed to.
    #[serde(default)]
    pub error_receiver: Option<String>,
    pub api_base_url: String,
    pub api_username: String,
    #[serde(default)]
    pub api_password: String,
    /// Explicit opt-in for interactive runs with automatic enrolment off.
    #[serde(default)]
    pub manual_enrolment_mode: bool,
}

/// Load, apply environment overrides, and validate.
pub fn load_config(path: &Path) -> Result<ReconcilerConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let mut config: ReconcilerConfig =
        serde_json::from_slice(&bytes).context("parse reconciler config JSON")?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn apply_env_overrides(config: &mut ReconcilerConfig) {
    if let Ok(value) = env::var(MANUAL_ENROLMENT_ENV) {
        config.manual_enrolment_mode = value == "true" || value == "1";
    }
    if let Ok(password) = env::var(API_PASSWORD_ENV) {
        config.api_password = password;
    }
}

pub fn validate_config(config: &ReconcilerConfig) -> Result<()> {
    if config.api_base_url.trim().is_empty() {
        return Err(anyhow!("api_base_url must be non-empty"));
    }
    if config.api_username.trim().is_empty() {
        return Err(anyhow!("api_username must be non-empty"));
    }
    if config.course_resource.trim().is_empty() || config.user_resource.trim().is_empty() {
        return Err(anyhow!("course_resource and user_resource must be non-empty"));
    }
    if let Some(realm) = config.user_realm.as_deref() {
        if realm.trim().is_empty() {
            return Err(anyhow!("user_realm must be non-empty when set"));
        }
    }
    Ok(())
}

/// Render a pretty JSON config stub for new deployments.
pub fn config_stub() -> String {
    let config = ReconcilerConfig {
        automatic_enrolment: true,
        automatic_unenrolment: false,
        automatic_user_creation: false,
        user_realm: Some("su.se".to_string()),
        course_resource: "courseSegment".to_string(),
        user_resource: "person".to_string(),
        program_resource: "program".to_string(),
        program_start_term: None,
        error_receiver: Some("lms-admin@example.org".to_string()),
        api_base_url: "https://daisy.example.org/rest".to_string(),
        api_username: "lms".to_string(),
        api_password: String::new(),
        manual_enrolment_mode: false,
    };
    serde_json::to_string_pretty(&config).expect("serialize config stub")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> String {
        r#"{
            "course_resource": "courseSegment",
            "user_resource": "person",
            "api_base_url": "https://daisy.example.org/rest",
            "api_username": "lms",
            "api_password": "secret"
        }"#
        .to_string()
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: ReconcilerConfig = serde_json::from_str(&minimal_json()).unwrap();
        assert!(config.automatic_enrolment);
        assert!(!config.automatic_unenrolment);
        assert!(!config.automatic_user_creation);
        assert!(config.user_realm.is_none());
        assert_eq!(config.program_resource, "program");
        validate_config(&config).unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"course_resource": "c", "user_resource": "u",
            "api_base_url": "x", "api_username": "y", "surprise": true}"#;
        assert!(serde_json::from_str::<ReconcilerConfig>(raw).is_err());
    }

    #[test]
    fn blank_base_url_fails_validation() {
        let mut config: ReconcilerConfig = serde_json::from_str(&minimal_json()).unwrap();
        config.api_base_url = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn config_stub_round_trips() {
        let config: ReconcilerConfig = serde_json::from_str(&config_stub()).unwrap();
        validate_config(&config).unwrap();
    }
}
