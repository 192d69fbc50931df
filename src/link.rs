//! Appointment links
//!
//! The calendar and the timetable both link to pages whose URL carries a UNIX
//! timestamp (seconds) as its first run of decimal digits. That timestamp is
//! the only key used for ordering and filtering.

use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

fn first_digit_run(url: &str) -> Option<&str> {
    let start = url.find(|c: char| c.is_ascii_digit())?;
    let rest = &url[start..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// A scraped date or timeslot URL together with its embedded instant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppointmentLink {
    url: String,
    timestamp: i64,
}

impl AppointmentLink {
    /// Parse a link, extracting the first decimal run as epoch seconds
    pub fn parse(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let timestamp = first_digit_run(&url)
            .ok_or_else(|| BookingError::InvalidLink(format!("no timestamp in {}", url)))?
            .parse::<i64>()
            .map_err(|e| BookingError::InvalidLink(format!("{}: {}", url, e)))?;

        if DateTime::<Utc>::from_timestamp(timestamp, 0).is_none() {
            return Err(BookingError::InvalidLink(format!(
                "timestamp {} out of range in {}",
                timestamp, url
            )));
        }

        Ok(Self { url, timestamp })
    }

    /// Parse every URL, dropping the ones without a usable timestamp
    pub fn parse_all<I, S>(urls: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .filter_map(|url| match Self::parse(url) {
                Ok(link) => Some(link),
                Err(e) => {
                    log::warn!("Dropping link: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn instant(&self) -> DateTime<Utc> {
        // Range checked in parse()
        DateTime::<Utc>::from_timestamp(self.timestamp, 0).unwrap_or_default()
    }
}

impl fmt::Display for AppointmentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Remove duplicate URLs, keeping the first occurrence of each
pub fn dedup_links(links: impl IntoIterator<Item = AppointmentLink>) -> Vec<AppointmentLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}
