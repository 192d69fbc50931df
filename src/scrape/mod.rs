//! Scrapers for the calendar and the per-day timetable

pub mod calendar;
pub mod timeslot;

pub use calendar::{open_service_page, scrape_calendar, select_locations};
pub use timeslot::{collect_timeslots, scrape_timeslots};
