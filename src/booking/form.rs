//! Booking form
//!
//! Opening a slot's booking page reserves it on the remote side. From here on
//! a failed attempt can leave a reservation behind, which is why the page is
//! reset through "start new reservation" whenever that control shows up.

use crate::browser::wait::poll_until;
use crate::browser::PageDriver;
use crate::config::{FormConfig, Timeouts};
use crate::error::{BookingError, Result};
use crate::link::AppointmentLink;
use crate::retry::retry;
use crate::site::{self, ensure_page_ok, goto_checked};
use std::future::Future;

/// Submissions are retried once in place
pub const SUBMIT_ATTEMPTS: usize = 2;

/// Open the slot's booking page and make sure it is ours to fill
pub async fn prepare_booking_page<P: PageDriver>(
    page: &P,
    slot: &AppointmentLink,
    timeouts: &Timeouts,
) -> Result<()> {
    log::debug!("Retrieving booking page for {}", slot);
    goto_checked(page, slot.url()).await?;

    if page.link_visible(site::START_NEW_RESERVATION_LINK).await? {
        log::debug!("Stale reservation found, starting a new reservation process");
        page.click_link(site::START_NEW_RESERVATION_LINK).await?;
        goto_checked(page, slot.url()).await?;

        if page.link_visible(site::START_NEW_RESERVATION_LINK).await? {
            return Err(BookingError::ReservationConflict(slot.url().to_string()));
        }
    }

    if page.heading_visible(site::SLOT_TAKEN_HEADING).await? {
        return Err(BookingError::SlotTaken(slot.url().to_string()));
    }

    page.wait_for_heading(site::BOOKING_HEADING, timeouts.action())
        .await
        .map_err(|e| match e {
            BookingError::Timeout { .. } => {
                BookingError::BookingPageNotReached(slot.url().to_string())
            }
            other => other,
        })
}

async fn essential<F>(field: &str, action: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    action.await.map_err(|e| BookingError::FieldFillFailed {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

async fn optional<P: PageDriver>(
    page: &P,
    selector: &str,
    value: &str,
    timeouts: &Timeouts,
) -> Result<bool> {
    match page.wait_for_selector(selector, timeouts.optional_field()).await {
        Ok(()) => {
            page.set_value(selector, value).await?;
            Ok(true)
        }
        Err(BookingError::Timeout { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Fill the form. The essential fields are written together and any failure
/// aborts; note and phone are only written where this location offers them.
pub async fn fill_form<P: PageDriver>(
    page: &P,
    form: &FormConfig,
    email: &str,
    timeouts: &Timeouts,
) -> Result<()> {
    let email = email.trim();
    let survey = if form.take_survey { "1" } else { "0" };

    futures::try_join!(
        essential("name", page.set_value(site::NAME_INPUT, &form.name)),
        essential("email", page.set_value(site::EMAIL_INPUT, email)),
        essential(
            "email confirmation",
            page.set_value(site::EMAIL_CONFIRMATION_INPUT, email)
        ),
        essential("survey", page.select_option(site::SURVEY_SELECT, survey)),
        essential("terms", page.check(site::TERMS_CHECKBOX)),
    )?;

    if let Some(note) = form.note.as_deref().filter(|n| !n.is_empty()) {
        match optional(page, site::NOTE_TEXTAREA, note, timeouts).await {
            Ok(true) => log::debug!("Wrote note"),
            Ok(false) => log::debug!("Note field not offered here, continuing without it"),
            Err(e) => log::warn!("Write note failed, continuing with no note - {}", e),
        }
    }

    if let Some(phone) = form.phone.as_deref().filter(|p| !p.is_empty()) {
        match optional(page, site::PHONE_INPUT, phone, timeouts).await {
            Ok(true) => log::debug!("Wrote phone number"),
            Ok(false) => log::debug!("Phone field not offered here, continuing without it"),
            Err(e) => log::warn!(
                "Failed to write phone number, continuing without a contact number - {}",
                e
            ),
        }
    }

    Ok(())
}

/// Wait until one of `headings` is visible
pub(crate) async fn wait_for_any_heading<P: PageDriver>(
    page: &P,
    headings: &[&str],
    timeout: std::time::Duration,
) -> Result<()> {
    poll_until(&headings.join(" | "), timeout, || async {
        for heading in headings {
            if page.heading_visible(heading).await? {
                return Ok(true);
            }
        }
        Ok(false)
    })
    .await
}

/// Click submit, retrying once, until the site shows either the
/// email-verification step or the final confirmation
pub async fn submit_form<P: PageDriver>(page: &P, timeouts: &Timeouts) -> Result<()> {
    log::debug!("Submitting appointment booking form");
    retry(
        SUBMIT_ATTEMPTS,
        "Form submission",
        |e: &BookingError| !e.is_blocking(),
        || async {
            page.click_and_wait(site::SUBMIT_BUTTON).await?;
            ensure_page_ok(page).await?;
            wait_for_any_heading(
                page,
                &[site::EMAIL_VERIFICATION_HEADING, site::CONFIRMATION_HEADING],
                timeouts.action(),
            )
            .await
        },
    )
    .await
    .map_err(|e| {
        if e.is_blocking() {
            e
        } else {
            BookingError::SubmissionFailed(e.to_string())
        }
    })
}
