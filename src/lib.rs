pub mod artifacts;
pub mod booking;
pub mod browser;
pub mod config;
pub mod error;
pub mod filter;
pub mod link;
pub mod mail;
pub mod orchestrator;
pub mod retry;
pub mod scrape;
pub mod site;

//  Re-export commonly used items
pub use artifacts::{run_stamp, ArtifactReport, ArtifactSaver, BookingSummary};
pub use booking::{book_appointment, BookedAppointment, Confirmation, VerificationState};
pub use browser::{
    BrowserLauncher, BrowserSession, ChromeLauncher, ChromePage, ChromeSession, PageDriver,
};
pub use config::{BookingConfig, BrowserOptions, FormConfig, MailConfig, PollConfig, Timeouts};
pub use error::{BookingError, Result};
pub use filter::{filter_between_dates, filter_between_times, DateRange, TimeRange};
pub use link::{dedup_links, AppointmentLink};
pub use mail::{Email, Inbox, MailSlurpClient, Mailbox};
pub use orchestrator::{BookingReceipt, CycleOutcome, Orchestrator, Stage};
pub use site::{check_page_status, PageStatus};
