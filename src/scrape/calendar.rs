//! Calendar scraper
//!
//! Services index -> service page -> location selection -> calendar. The
//! calendar shows two months; both pages are scraped and merged.

use crate::browser::PageDriver;
use crate::config::BookingConfig;
use crate::error::{BookingError, Result};
use crate::link::{dedup_links, AppointmentLink};
use crate::site::{self, ensure_page_ok, goto_checked};

/// Find the configured service on the services index and open its page
pub async fn open_service_page<P: PageDriver>(
    page: &P,
    services_url: &str,
    service: &str,
) -> Result<()> {
    log::debug!("Looking up service '{}' at {}", service, services_url);
    goto_checked(page, services_url).await?;

    let service_url = page
        .link_href(service, true)
        .await?
        .ok_or_else(|| BookingError::ServiceNotFound(service.to_string()))?;

    log::debug!("Service page: {}", service_url);
    goto_checked(page, &service_url).await
}

/// Tick the location checkboxes on the service page
///
/// An empty list selects every location. Otherwise the first location must
/// exist; the others are best effort.
pub async fn select_locations<P: PageDriver>(page: &P, locations: &[String]) -> Result<()> {
    let Some((first, rest)) = locations.split_first() else {
        let count = page.check_all_checkboxes().await?;
        if count == 0 {
            return Err(BookingError::ElementNotFound(
                "location checkboxes".to_string(),
            ));
        }
        log::debug!("Selected all {} locations", count);
        return Ok(());
    };

    page.check_labelled_checkbox(first).await.map_err(|e| match e {
        BookingError::ElementNotFound(_) => BookingError::LocationNotFound(first.clone()),
        other => other,
    })?;

    for location in rest {
        if let Err(e) = page.check_labelled_checkbox(location).await {
            log::warn!(
                "Failed to select location {} - continuing without it: {}",
                location,
                e
            );
        }
    }

    log::debug!("Selected locations: {}", locations.join(", "));
    Ok(())
}

async fn scrape_date_links<P: PageDriver>(page: &P) -> Result<Vec<AppointmentLink>> {
    // Months without open days have no bookable cells; that is not an error
    let hrefs = page.hrefs(site::BOOKABLE_DATE_LINKS).await?;
    Ok(AppointmentLink::parse_all(hrefs))
}

/// Walk to the calendar and return every bookable date link on both pages,
/// de-duplicated in order of first appearance
pub async fn scrape_calendar<P: PageDriver>(
    page: &P,
    config: &BookingConfig,
) -> Result<Vec<AppointmentLink>> {
    open_service_page(page, &config.site.services_url, &config.service).await?;
    select_locations(page, &config.locations).await?;

    page.click_button(site::BOOK_AT_LOCATION_BUTTON).await?;

    let calendar_url = page.current_url().await?;
    if calendar_url.contains(site::NO_APPOINTMENTS_URL_FRAGMENT) {
        return Err(BookingError::NoAppointmentsForSelection);
    }
    ensure_page_ok(page).await?;
    log::debug!("Calendar url: {}", calendar_url);

    let first_month = scrape_date_links(page).await?;
    log::debug!("Found {} date(s) on the first calendar page", first_month.len());

    let second_month = if page.exists(site::CALENDAR_NEXT).await? {
        page.click_and_wait(site::CALENDAR_NEXT).await?;
        ensure_page_ok(page).await?;
        let links = scrape_date_links(page).await?;
        log::debug!("Found {} date(s) on the second calendar page", links.len());
        links
    } else {
        Vec::new()
    };

    let dates = dedup_links(first_month.into_iter().chain(second_month));
    log::info!("Found {} appointment date(s)", dates.len());
    Ok(dates)
}
