//! Timeslot scraper
//!
//! A date page renders a timetable of free slots. Dates can lose all their
//! slots between the calendar scrape and the visit, so a missing timetable is
//! an empty result rather than an error.

use crate::browser::{BrowserSession, PageDriver};
use crate::config::Timeouts;
use crate::error::{BookingError, Result};
use crate::link::AppointmentLink;
use crate::site::{self, goto_checked};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};

/// Scrape the free slots of one date page
pub async fn scrape_timeslots<P: PageDriver>(
    page: &P,
    date: &AppointmentLink,
    timeouts: &Timeouts,
) -> Result<Vec<AppointmentLink>> {
    goto_checked(page, date.url()).await?;

    match page.wait_for_selector(site::TIMETABLE, timeouts.action()).await {
        Ok(()) => {}
        Err(BookingError::Timeout { .. }) => {
            log::debug!("No timetable rendered for {}", date);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    }

    let slots = AppointmentLink::parse_all(page.hrefs(site::FREE_SLOT_LINKS).await?);
    log::debug!("Found {} timeslot(s) for {}", slots.len(), date);
    Ok(slots)
}

async fn timeslots_in_own_page<S: BrowserSession>(
    session: &S,
    date: &AppointmentLink,
    timeouts: &Timeouts,
) -> Result<Vec<AppointmentLink>> {
    let page = session.new_page().await?;
    let result = scrape_timeslots(&page, date, timeouts).await;
    if let Err(e) = page.close().await {
        log::warn!("Closing page for {} failed: {}", date, e);
    }
    result
}

/// Scrape every date with at most `concurrency` pages open at once
///
/// Each date gets its own page. A date that fails contributes nothing. A
/// blocking failure (rate limit, captcha) stops any further dates from being
/// opened; pages already in flight finish and close, then the error is
/// returned. Results keep the order of `dates`.
pub async fn collect_timeslots<S: BrowserSession>(
    session: &S,
    dates: &[AppointmentLink],
    concurrency: usize,
    timeouts: &Timeouts,
) -> Result<Vec<AppointmentLink>> {
    let blocked = AtomicBool::new(false);
    let blocked = &blocked;

    let results: Vec<(&AppointmentLink, Option<Result<Vec<AppointmentLink>>>)> =
        stream::iter(dates)
            .map(|date| async move {
                if blocked.load(Ordering::SeqCst) {
                    return (date, None);
                }
                let result = timeslots_in_own_page(session, date, timeouts).await;
                if matches!(&result, Err(e) if e.is_blocking()) {
                    blocked.store(true, Ordering::SeqCst);
                }
                (date, Some(result))
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

    let mut slots = Vec::new();
    let mut blocking = None;

    for (date, result) in results {
        match result {
            None => log::debug!("Skipped {} after being blocked", date),
            Some(Ok(found)) => slots.extend(found),
            Some(Err(e)) if e.is_blocking() => {
                log::warn!("Blocked while getting timeslots for {}: {}", date, e);
                blocking.get_or_insert(e);
            }
            Some(Err(e)) => {
                log::warn!("Get timeslots failed for {} - {}", date, e);
            }
        }
    }

    if let Some(e) = blocking {
        return Err(e);
    }

    Ok(slots)
}
