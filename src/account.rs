//! Account resolution: find, repair, or create the local account behind a
//! roster participant.
//!
//! Persistence failures never abort a course pass; the participant is
//! skipped, the failure is recorded, and the batch continues. Only a roster
//! lookup failure (username list) escalates, since that means the source is
//! down.

use tracing::{info, warn};

use crate::config::ReconcilerConfig;
use crate::confirm::ConfirmationPolicy;
use crate::diagnostics::{CourseReport, DiagnosticKind};
use crate::roster::{Participant, RosterSource, SourceUnavailable};
use crate::store::{AccountUpdate, EnrolmentStore, LocalAccount, NewAccount};

/// Domain used when the source reports no email for a new account.
pub const FALLBACK_EMAIL_DOMAIN: &str = "dsv.su.se";

/// Outcome of resolution; a skipped participant is recorded in the report
/// and never enrolled.
#[derive(Debug)]
pub enum Resolution {
    Resolved(LocalAccount),
    Skipped,
}

/// Find or create the local account for `participant`.
pub fn resolve_or_create(
    participant: &Participant,
    config: &ReconcilerConfig,
    policy: &ConfirmationPolicy,
    roster: &dyn RosterSource,
    store: &mut dyn EnrolmentStore,
    report: &mut CourseReport,
) -> Result<Resolution, SourceUnavailable> {
    let person_id = participant.person_id();

    let existing = match store.find_account_by_external_id(person_id) {
        Ok(existing) => existing,
        Err(err) => {
            report.push(DiagnosticKind::DatabaseError, format!("Database error: {err}"));
            return Ok(Resolution::Skipped);
        }
    };

    if let Some(account) = existing {
        if !account.deleted {
            return Ok(Resolution::Resolved(account));
        }
        // Reactivate in place rather than creating a twin.
        return Ok(reactivate(account, store, report));
    }

    let Some(username) = derive_username(participant, config, roster, report)? else {
        return Ok(Resolution::Skipped);
    };

    // A legacy or manually created account may already hold this username
    // without knowing its Daisy id; attach the id instead of creating a
    // duplicate.
    match store.find_account_by_username(&username) {
        Ok(Some(holder)) if holder.external_id.is_none() && !holder.deleted => {
            return Ok(attach_external_id(holder, person_id, store, report));
        }
        Ok(_) => {}
        Err(err) => {
            report.push(DiagnosticKind::DatabaseError, format!("Database error: {err}"));
            return Ok(Resolution::Skipped);
        }
    }

    if !config.automatic_user_creation {
        let question = format!(
            "Do you want to create an account for {} ({username})",
            participant.fullname()
        );
        if !policy.confirm(&question) {
            report.push(
                DiagnosticKind::UserCreateDeclined,
                format!("No account found for {} ({username})", participant.fullname()),
            );
            return Ok(Resolution::Skipped);
        }
    }

    let email = match participant.person.email.clone() {
        Some(email) => email,
        None => {
            let fixed = synthesize_email(&username);
            report.push(
                DiagnosticKind::EmailFixed,
                format!(
                    "Daisy didn't return an email address for user {username}. \
                     Temporary email {fixed} created"
                ),
            );
            warn!(username, email = fixed, "missing email synthesized");
            fixed
        }
    };

    let created = store.create_account(NewAccount {
        username: username.clone(),
        external_id: person_id.to_string(),
        firstname: participant.person.first_name.clone(),
        lastname: participant.person.last_name.clone(),
        email,
    });
    match created {
        Ok(account) => {
            report.created.push(account.username.clone());
            report.push(
                DiagnosticKind::UserCreated,
                format!("New user {username} created/updated"),
            );
            info!(username, person_id, "account created");
            Ok(Resolution::Resolved(account))
        }
        Err(err) => {
            report.push(
                DiagnosticKind::UserCreateFailed,
                format!("Failed to create new user {username}: {err}"),
            );
            Ok(Resolution::Skipped)
        }
    }
}

fn reactivate(
    account: LocalAccount,
    store: &mut dyn EnrolmentStore,
    report: &mut CourseReport,
) -> Resolution {
    let update = AccountUpdate {
        id: account.id,
        deleted: Some(false),
        ..AccountUpdate::default()
    };
    match store.update_account(update) {
        Ok(revived) => {
            report.push(
                DiagnosticKind::UserCreated,
                format!("New user {} created/updated", revived.username),
            );
            Resolution::Resolved(revived)
        }
        Err(err) => {
            report.push(
                DiagnosticKind::UserCreateFailed,
                format!("Failed to create new user {}: {err}", account.username),
            );
            Resolution::Skipped
        }
    }
}

fn attach_external_id(
    holder: LocalAccount,
    person_id: &str,
    store: &mut dyn EnrolmentStore,
    report: &mut CourseReport,
) -> Resolution {
    let update = AccountUpdate {
        id: holder.id,
        external_id: Some(person_id.to_string()),
        ..AccountUpdate::default()
    };
    match store.update_account(update) {
        Ok(repaired) => {
            report.push(
                DiagnosticKind::DaisyIdAdded,
                format!("Daisy ID added to user {}", repaired.username),
            );
            Resolution::Resolved(repaired)
        }
        Err(err) => {
            report.push(
                DiagnosticKind::DaisyIdAddFailed,
                format!("Failed to add Daisy ID to user {}: {err}", holder.username),
            );
            Resolution::Skipped
        }
    }
}

/// Derive the login name: realm-matched username when a realm is
/// configured, the participant's email otherwise. `None` means the
/// participant cannot be resolved this pass.
fn derive_username(
    participant: &Participant,
    config: &ReconcilerConfig,
    roster: &dyn RosterSource,
    report: &mut CourseReport,
) -> Result<Option<String>, SourceUnavailable> {
    if let Some(realm) = config.user_realm.as_deref() {
        let usernames = roster.fetch_usernames(participant.person_id())?;
        let matched = usernames
            .iter()
            .find(|record| record.realm.as_deref() == Some(realm));
        if let Some(record) = matched {
            return Ok(Some(format!("{}@{realm}", record.username).to_lowercase()));
        }
    } else if let Some(email) = participant.person.email.as_deref() {
        return Ok(Some(email.to_string()));
    }
    report.push(
        DiagnosticKind::UsernameNotFound,
        format!(
            "Username for {} not found. No user created",
            participant.fullname()
        ),
    );
    Ok(None)
}

fn synthesize_email(username: &str) -> String {
    let localpart = username.split('@').next().unwrap_or(username);
    format!("{localpart}@{FALLBACK_EMAIL_DOMAIN}")
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
