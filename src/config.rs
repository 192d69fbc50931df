//! Run configuration
//!
//! Loaded once from JSON and passed by reference into every component. Nothing
//! below the binary reads the environment.

use crate::error::{BookingError, Result};
use crate::filter::{DateRange, TimeRange};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVICE: &str = "Anmeldung einer Wohnung";
pub const DEFAULT_SERVICES_URL: &str = "https://service.berlin.de/dienstleistungen/";
pub const DEFAULT_MAILSLURP_URL: &str = "https://api.mailslurp.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// Service name exactly as listed on the services index
    pub service: String,

    /// Location names; empty selects every location
    pub locations: Vec<String>,

    pub dates: DateRange,
    pub times: TimeRange,
    pub form: FormConfig,
    pub mail: MailConfig,
    pub browser: BrowserOptions,
    pub polling: PollConfig,
    pub timeouts: Timeouts,
    pub site: SiteConfig,

    /// Where confirmation artifacts are written
    pub output_dir: PathBuf,
}

/// Values typed into the booking form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub name: String,
    pub take_survey: bool,
    pub note: Option<String>,
    pub phone: Option<String>,
}

/// MailSlurp credentials; the inbox address doubles as the booking email
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub api_key: Option<String>,
    /// Reuse this inbox instead of creating one
    pub inbox_id: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub no_sandbox: bool,
    pub chrome_path: Option<PathBuf>,
    pub proxy_url: Option<String>,
    /// JavaScript file injected into every new page before site scripts run
    pub stealth_script: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Maximum number of date pages fetched at once
    pub concurrency: usize,
    /// Sleep after a cycle found nothing bookable
    pub retry_interval_secs: u64,
    /// Sleep after the site rate-limited or challenged us
    pub cool_off_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub action_secs: u64,
    pub navigation_secs: u64,
    pub email_secs: u64,
    /// How long to look for the optional note/phone inputs
    pub optional_field_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub services_url: String,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            locations: Vec::new(),
            dates: DateRange::default(),
            times: TimeRange::default(),
            form: FormConfig::default(),
            mail: MailConfig::default(),
            browser: BrowserOptions::default(),
            polling: PollConfig::default(),
            timeouts: Timeouts::default(),
            site: SiteConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            inbox_id: None,
            base_url: DEFAULT_MAILSLURP_URL.to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            retry_interval_secs: 120,
            cool_off_secs: 900,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_secs: 10,
            navigation_secs: 60,
            email_secs: 300,
            optional_field_secs: 5,
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            services_url: DEFAULT_SERVICES_URL.to_string(),
        }
    }
}

impl PollConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn cool_off(&self) -> Duration {
        Duration::from_secs(self.cool_off_secs)
    }
}

impl Timeouts {
    pub fn action(&self) -> Duration {
        Duration::from_secs(self.action_secs)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_secs(self.navigation_secs)
    }

    pub fn email(&self) -> Duration {
        Duration::from_secs(self.email_secs)
    }

    pub fn optional_field(&self) -> Duration {
        Duration::from_secs(self.optional_field_secs)
    }
}

impl BookingConfig {
    /// Load and validate a JSON config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: BookingConfig = serde_json::from_str(content)
            .map_err(|e| BookingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(BookingError::InvalidConfig("service must not be empty".into()));
        }
        if self.form.name.trim().is_empty() {
            return Err(BookingError::InvalidConfig("form.name must not be empty".into()));
        }
        if self.dates.earliest > self.dates.latest {
            return Err(BookingError::InvalidConfig(format!(
                "dates.earliest ({}) is after dates.latest ({})",
                self.dates.earliest, self.dates.latest
            )));
        }
        if self.times.crosses_midnight() {
            return Err(BookingError::InvalidConfig(format!(
                "time window {}..{} crosses midnight, which is not supported",
                self.times.earliest, self.times.latest
            )));
        }
        if self.polling.concurrency == 0 {
            return Err(BookingError::InvalidConfig(
                "polling.concurrency must be at least 1".into(),
            ));
        }
        if self.polling.cool_off_secs <= self.polling.retry_interval_secs {
            return Err(BookingError::InvalidConfig(format!(
                "polling.cool_off_secs ({}) must be longer than polling.retry_interval_secs ({})",
                self.polling.cool_off_secs, self.polling.retry_interval_secs
            )));
        }
        Ok(())
    }
}
