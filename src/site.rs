//! Remote site structure
//!
//! Every selector, heading and label the pipeline relies on lives here. The
//! appointment system has no API, so any markup change on its side is a
//! breaking change confined to this file.

use crate::browser::PageDriver;
use crate::error::{BookingError, Result};

// ===== SERVICE / LOCATION SELECTION =====

pub const BOOK_AT_LOCATION_BUTTON: &str = "An diesem Standort einen Termin buchen";
pub const NO_APPOINTMENTS_URL_FRAGMENT: &str = "/terminvereinbarung/termin/taken";

// ===== CALENDAR =====

pub const BOOKABLE_DATE_LINKS: &str = "td.buchbar > a";
pub const CALENDAR_NEXT: &str = "th.next";

// ===== TIMETABLE =====

pub const TIMETABLE: &str = ".timetable";
pub const FREE_SLOT_LINKS: &str = ".timetable td.frei > a";

// ===== BOOKING FORM =====

pub const START_NEW_RESERVATION_LINK: &str = "Reservierung aufheben und neue Terminsuche starten";
pub const BOOKING_HEADING: &str = "Terminvereinbarung";
pub const NAME_INPUT: &str = "input#familyName";
pub const EMAIL_INPUT: &str = "input#email";
pub const EMAIL_CONFIRMATION_INPUT: &str = "input#emailequality";
pub const SURVEY_SELECT: &str = r#"select[name="surveyAccepted"]"#;
pub const TERMS_CHECKBOX: &str = "input#agbgelesen";
pub const NOTE_TEXTAREA: &str = "textarea[name=amendment]";
pub const PHONE_INPUT: &str = "input#telephone";
pub const SUBMIT_BUTTON: &str = "button#register_submit.btn";

// ===== VERIFICATION / CONFIRMATION =====

pub const EMAIL_VERIFICATION_HEADING: &str = "Terminbuchung - Email bestätigen";
pub const CONFIRMATION_HEADING: &str = "Terminbestätigung";
pub const VERIFICATION_CODE_INPUT: &str = "input#verificationcode";
// Sic: the site misspells the button label
pub const VERIFY_BUTTON: &str = "Termin verifzieren";

// ===== STATUS BANNERS =====

pub const RATE_LIMIT_HEADING: &str = "Zu viele Zugriffe";
pub const CAPTCHA_HEADING: &str = "Bitte verifizieren sie sich";
pub const MAINTENANCE_HEADING: &str = "Wartung";
pub const UNAVAILABLE_HEADING: &str = "Die Terminvereinbarung ist zur Zeit nicht";
pub const SLOT_TAKEN_HEADING: &str = "Bitte entschuldigen Sie den Fehler";

/// What a freshly loaded page says about our standing with the site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ok,
    RateLimited,
    Captcha,
    Maintenance,
    Unavailable,
}

impl PageStatus {
    pub fn into_result(self) -> Result<()> {
        match self {
            PageStatus::Ok => Ok(()),
            PageStatus::RateLimited => Err(BookingError::RateLimited),
            PageStatus::Captcha => Err(BookingError::Captcha),
            PageStatus::Maintenance => Err(BookingError::Maintenance),
            PageStatus::Unavailable => Err(BookingError::BookingUnavailable),
        }
    }
}

/// Classify the current page by its banner headings
///
/// Call after every navigation. Blocking banners are checked first.
pub async fn check_page_status<P: PageDriver + ?Sized>(page: &P) -> Result<PageStatus> {
    let checks = [
        (RATE_LIMIT_HEADING, PageStatus::RateLimited),
        (CAPTCHA_HEADING, PageStatus::Captcha),
        (MAINTENANCE_HEADING, PageStatus::Maintenance),
        (UNAVAILABLE_HEADING, PageStatus::Unavailable),
    ];

    for (heading, status) in checks {
        if page.heading_visible(heading).await? {
            return Ok(status);
        }
    }

    Ok(PageStatus::Ok)
}

/// [`check_page_status`] turned into an error for anything but `Ok`
pub async fn ensure_page_ok<P: PageDriver + ?Sized>(page: &P) -> Result<()> {
    let status = check_page_status(page).await?;
    if status != PageStatus::Ok {
        log::warn!("Page status after navigation: {:?}", status);
    }
    status.into_result()
}

/// Navigate, then run the banner check
pub async fn goto_checked<P: PageDriver + ?Sized>(page: &P, url: &str) -> Result<()> {
    page.goto(url).await?;
    ensure_page_ok(page).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_into_result() {
        assert!(PageStatus::Ok.into_result().is_ok());
        assert!(matches!(
            PageStatus::RateLimited.into_result(),
            Err(BookingError::RateLimited)
        ));
        assert!(matches!(
            PageStatus::Captcha.into_result(),
            Err(BookingError::Captcha)
        ));
        assert!(matches!(
            PageStatus::Maintenance.into_result(),
            Err(BookingError::Maintenance)
        ));
        assert!(matches!(
            PageStatus::Unavailable.into_result(),
            Err(BookingError::BookingUnavailable)
        ));
    }
}
