//! Booking one slot
//!
//! [`book_appointment`] takes a page and a timeslot link through reservation,
//! form, submission and email confirmation. Any error leaves the slot behind;
//! the caller moves on to the next candidate.

pub mod form;
pub mod verification;

pub use form::{fill_form, prepare_booking_page, submit_form};
pub use verification::{
    confirm_booking, extract_verification_code, is_verification_request, Confirmation,
    VerificationState,
};

use crate::browser::PageDriver;
use crate::config::BookingConfig;
use crate::error::Result;
use crate::link::AppointmentLink;
use crate::mail::{Inbox, Mailbox};

/// A confirmed booking
#[derive(Debug, Clone)]
pub struct BookedAppointment {
    pub slot: AppointmentLink,
    pub inbox: Inbox,
    pub confirmation: Confirmation,
}

pub async fn book_appointment<P, M>(
    page: &P,
    mailbox: &M,
    inbox: &Inbox,
    config: &BookingConfig,
    slot: &AppointmentLink,
) -> Result<BookedAppointment>
where
    P: PageDriver,
    M: Mailbox + ?Sized,
{
    prepare_booking_page(page, slot, &config.timeouts).await?;
    fill_form(page, &config.form, &inbox.email_address, &config.timeouts).await?;

    // Anything already in the inbox predates this submission
    let drained = mailbox.mark_all_read(&inbox.id).await?;
    if drained > 0 {
        log::debug!("Marked {} old email(s) as read", drained);
    }

    submit_form(page, &config.timeouts).await?;
    log::info!("Booking form submitted for {}", slot);

    let confirmation = confirm_booking(page, mailbox, inbox, &config.timeouts).await?;

    Ok(BookedAppointment {
        slot: slot.clone(),
        inbox: inbox.clone(),
        confirmation,
    })
}
