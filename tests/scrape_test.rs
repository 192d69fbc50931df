//! Calendar and timetable scraping against the scripted site


use fake_site::*;
use termin_webdriver::error::BookingError;
use termin_webdriver::scrape::{
    collect_timeslots, scrape_calendar, scrape_timeslots, select_locations,
};
use termin_webdriver::site;
use termin_webdriver::{AppointmentLink, BrowserLauncher, PageDriver};

const DAY_1: i64 = 1699920000;
const DAY_2: i64 = 1700006400;
const DAY_3: i64 = 1700092800;

fn link(url: String) -> AppointmentLink {
    AppointmentLink::parse(url).expect("valid link")
}

#[tokio::test]
async fn test_calendar_pages_are_merged_without_duplicates() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.edit(|s| {
        s.calendars = vec![vec![
            vec![date_url(DAY_1), date_url(DAY_2)],
            vec![date_url(DAY_2), date_url(DAY_3), date_url(DAY_1)],
        ]];
        s.launches = 1;
    });
    let dir = tempfile::tempdir()?;
    let page = site.page().await;

    let dates = scrape_calendar(&page, &test_config(dir.path())).await?;

    let urls: Vec<&str> = dates.iter().map(|d| d.url()).collect();
    assert_eq!(urls, vec![date_url(DAY_1), date_url(DAY_2), date_url(DAY_3)]);
    Ok(())
}

#[tokio::test]
async fn test_single_calendar_page_is_not_paginated() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.edit(|s| s.calendars = vec![vec![vec![date_url(DAY_1)]]]);
    let dir = tempfile::tempdir()?;
    let page = site.page().await;

    let dates = scrape_calendar(&page, &test_config(dir.path())).await?;

    assert_eq!(dates.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_calendar_links_are_dropped() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.edit(|s| {
        s.calendars = vec![vec![vec![
            "https://termine.test/terminvereinbarung/termin/time/".to_string(),
            date_url(DAY_1),
        ]]]
    });
    let dir = tempfile::tempdir()?;
    let page = site.page().await;

    let dates = scrape_calendar(&page, &test_config(dir.path())).await?;

    assert_eq!(dates, vec![link(date_url(DAY_1))]);
    Ok(())
}

#[tokio::test]
async fn test_maintenance_banner_stops_calendar() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.edit(|s| {
        s.calendars = vec![vec![vec![date_url(DAY_1)]]];
        s.banners.push(Banner {
            url: SERVICES_URL.to_string(),
            heading: site::MAINTENANCE_HEADING,
            launches: usize::MAX,
        });
    });
    let dir = tempfile::tempdir()?;
    let page = site.page().await;

    let result = scrape_calendar(&page, &test_config(dir.path())).await;

    assert!(matches!(result, Err(BookingError::Maintenance)));
    Ok(())
}

#[tokio::test]
async fn test_named_locations() -> anyhow::Result<()> {
    let site = FakeSite::new();
    let page = site.page().await;
    page.goto(SERVICE_URL).await?;

    // Unknown extra locations are skipped
    select_locations(
        &page,
        &["Bürgeramt Mitte".to_string(), "Bürgeramt Atlantis".to_string()],
    )
    .await?;

    // The first location is required
    let result = select_locations(&page, &["Bürgeramt Atlantis".to_string()]).await;
    assert!(matches!(
        result,
        Err(BookingError::LocationNotFound(name)) if name == "Bürgeramt Atlantis"
    ));
    Ok(())
}

#[tokio::test]
async fn test_all_locations_requires_checkboxes() -> anyhow::Result<()> {
    let site = FakeSite::new();
    let page = site.page().await;
    page.goto(SERVICE_URL).await?;
    select_locations(&page, &[]).await?;

    site.edit(|s| s.locations.clear());
    let result = select_locations(&page, &[]).await;
    assert!(matches!(result, Err(BookingError::ElementNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_missing_timetable_is_empty() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.edit(|s| {
        s.dates.insert(date_url(DAY_1), None);
    });
    let config = termin_webdriver::BookingConfig::default();
    let page = site.page().await;

    let slots = scrape_timeslots(&page, &link(date_url(DAY_1)), &config.timeouts).await?;

    assert!(slots.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_collect_tolerates_failing_dates() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.with_availability(&[
        (DAY_1, &[1699945200]),
        (DAY_2, &[1700031600]),
        (DAY_3, &[1700118000, 1700121600]),
    ]);
    site.edit(|s| {
        s.unreachable.insert(date_url(DAY_2));
    });
    let config = termin_webdriver::BookingConfig::default();
    let session = site.launcher().launch().await?;
    let dates: Vec<AppointmentLink> = [DAY_1, DAY_2, DAY_3]
        .iter()
        .map(|d| link(date_url(*d)))
        .collect();

    let slots = collect_timeslots(&session, &dates, 2, &config.timeouts).await?;

    let urls: Vec<&str> = slots.iter().map(|s| s.url()).collect();
    assert_eq!(
        urls,
        vec![slot_url(1699945200), slot_url(1700118000), slot_url(1700121600)]
    );
    let state = site.state();
    assert_eq!(state.pages_opened, 3);
    assert_eq!(state.pages_closed, 3);
    Ok(())
}

#[tokio::test]
async fn test_collect_stops_opening_dates_once_blocked() -> anyhow::Result<()> {
    let site = FakeSite::new();
    site.with_availability(&[
        (DAY_1, &[1699945200]),
        (DAY_2, &[1700031600]),
        (DAY_3, &[1700118000]),
    ]);
    site.edit(|s| {
        s.launches = 1;
        s.banners.push(Banner {
            url: date_url(DAY_1),
            heading: site::RATE_LIMIT_HEADING,
            launches: usize::MAX,
        });
    });
    let config = termin_webdriver::BookingConfig::default();
    let session = site.launcher().launch().await?;
    let dates: Vec<AppointmentLink> = [DAY_1, DAY_2, DAY_3]
        .iter()
        .map(|d| link(date_url(*d)))
        .collect();

    let result = collect_timeslots(&session, &dates, 1, &config.timeouts).await;

    assert!(matches!(result, Err(BookingError::RateLimited)));
    let state = site.state();
    assert_eq!(state.visits_to(&date_url(DAY_1)), 1);
    assert_eq!(state.visits_to(&date_url(DAY_2)), 0);
    assert_eq!(state.visits_to(&date_url(DAY_3)), 0);
    assert_eq!(state.pages_opened, 1);
    assert_eq!(state.pages_closed, 1);
    Ok(())
}
