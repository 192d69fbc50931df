//! Email verification
//!
//! After submission the site either confirms straight away or first mails a
//! six character code that has to be entered on the page:
//!
//! ```text
//! Submitted -> Confirmed
//! Submitted -> EmailVerificationRequired -> CodeSubmitted -> Confirmed
//! ```
//!
//! The inbox has to be drained before submission so that only mail caused by
//! this booking is observed.

use super::form::{wait_for_any_heading, SUBMIT_ATTEMPTS};
use crate::browser::PageDriver;
use crate::config::Timeouts;
use crate::error::{BookingError, Result};
use crate::mail::{Email, Inbox, Mailbox};
use crate::retry::retry;
use crate::site::{self, ensure_page_ok};
use regex::Regex;
use std::sync::LazyLock;

/// Subject fragment of the mail that asks for a code
const VERIFICATION_SUBJECT: &str = "verifizieren";

static CODE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<h2>([0-9a-zA-Z]{6})</h2>").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    Submitted,
    EmailVerificationRequired,
    CodeSubmitted,
    Confirmed,
}

/// Emails that led to the confirmed state
#[derive(Debug, Clone)]
pub struct Confirmation {
    /// Present only when a code had to be entered
    pub verification_email: Option<Email>,
    pub confirmation_email: Email,
}

pub fn is_verification_request(subject: &str) -> bool {
    subject.contains(VERIFICATION_SUBJECT)
}

/// First `<h2>XXXXXX</h2>` code in the email body
pub fn extract_verification_code(body: &str) -> Option<String> {
    CODE_PATTERN
        .as_ref()?
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

async fn next_email<M: Mailbox + ?Sized>(
    mailbox: &M,
    inbox: &Inbox,
    timeouts: &Timeouts,
) -> Result<Email> {
    log::debug!("Waiting for email at inbox {}", inbox.id);
    let email = mailbox
        .wait_for_latest_email(&inbox.id, timeouts.email())
        .await?;
    log::debug!("Received email '{}'", email.subject());
    Ok(email)
}

async fn submit_code<P: PageDriver>(page: &P, code: &str, timeouts: &Timeouts) -> Result<()> {
    page.wait_for_selector(site::VERIFICATION_CODE_INPUT, timeouts.action())
        .await?;
    page.set_value(site::VERIFICATION_CODE_INPUT, code).await?;

    log::debug!("Submitting verification code");
    retry(
        SUBMIT_ATTEMPTS,
        "Verification code submission",
        |e: &BookingError| !e.is_blocking(),
        || async {
            page.click_button(site::VERIFY_BUTTON).await?;
            ensure_page_ok(page).await?;
            wait_for_any_heading(page, &[site::CONFIRMATION_HEADING], timeouts.action()).await
        },
    )
    .await
    .map_err(|e| {
        if e.is_blocking() {
            e
        } else {
            BookingError::SubmissionFailed(format!("verification code: {}", e))
        }
    })
}

/// Drive a submitted booking to the confirmed state
///
/// No email within the timeout fails the attempt; it is not retried here.
pub async fn confirm_booking<P, M>(
    page: &P,
    mailbox: &M,
    inbox: &Inbox,
    timeouts: &Timeouts,
) -> Result<Confirmation>
where
    P: PageDriver,
    M: Mailbox + ?Sized,
{
    let mut state = VerificationState::Submitted;
    let mut verification_email = None;
    let mut confirmation_email = None;

    while state != VerificationState::Confirmed {
        let next = match state {
            VerificationState::Submitted => {
                let first = next_email(mailbox, inbox, timeouts).await?;
                if is_verification_request(first.subject()) {
                    verification_email = Some(first);
                    VerificationState::EmailVerificationRequired
                } else {
                    page.wait_for_heading(site::CONFIRMATION_HEADING, timeouts.action())
                        .await?;
                    confirmation_email = Some(first);
                    VerificationState::Confirmed
                }
            }
            VerificationState::EmailVerificationRequired => {
                let body = verification_email.as_ref().map(Email::body).unwrap_or_default();
                let code =
                    extract_verification_code(body).ok_or(BookingError::VerificationCodeMissing)?;
                log::debug!("Verification code: {}", code);
                submit_code(page, &code, timeouts).await?;
                VerificationState::CodeSubmitted
            }
            VerificationState::CodeSubmitted => {
                confirmation_email = Some(next_email(mailbox, inbox, timeouts).await?);
                VerificationState::Confirmed
            }
            VerificationState::Confirmed => VerificationState::Confirmed,
        };

        log::debug!("Verification: {:?} -> {:?}", state, next);
        state = next;
    }

    let confirmation_email = confirmation_email
        .ok_or_else(|| BookingError::Other("confirmed without an email".to_string()))?;

    Ok(Confirmation {
        verification_email,
        confirmation_email,
    })
}
