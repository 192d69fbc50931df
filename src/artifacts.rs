//! Confirmation artifacts
//!
//! After a booking is confirmed the page screenshot, the calendar attachment
//! and the raw email bodies are written to the output directory. All names
//! carry the same run stamp:
//!
//! ```text
//! web-confirmation-<ts>.png
//! appointment-<ts>.ics
//! email-verification-<ts>.html
//! email-confirmation-<ts>.html
//! booking-<ts>.json
//! ```
//!
//! Writes are independent of each other. A failed write is reported and the
//! rest still happen.

use crate::booking::BookedAppointment;
use crate::browser::PageDriver;
use crate::error::{BookingError, Result};
use crate::mail::{Email, Mailbox};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Timestamp used in every artifact name of one run
pub fn run_stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// Machine-readable summary written next to the other artifacts
#[derive(Debug, Clone, Serialize)]
pub struct BookingSummary {
    pub booked_at: DateTime<Utc>,
    pub slot_url: String,
    pub slot_time: DateTime<Utc>,
    pub inbox_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_sha256: Option<String>,
}

/// What [`ArtifactSaver::save`] managed to write
#[derive(Debug, Default)]
pub struct ArtifactReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<String>,
}

impl ArtifactReport {
    fn record(&mut self, name: &str, result: Result<Option<PathBuf>>) {
        match result {
            Ok(Some(path)) => {
                log::info!("Saved {}", path.display());
                self.saved.push(path);
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Failed to save {}: {}", name, e);
                self.failed.push(format!("{}: {}", name, e));
            }
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

async fn write_file(path: PathBuf, contents: &[u8]) -> Result<Option<PathBuf>> {
    tokio::fs::write(&path, contents)
        .await
        .map_err(|e| BookingError::Other(format!("write {}: {}", path.display(), e)))?;
    Ok(Some(path))
}

#[derive(Debug, Clone)]
pub struct ArtifactSaver {
    output_dir: PathBuf,
}

impl ArtifactSaver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn path(&self, prefix: &str, stamp: &str, ext: &str) -> PathBuf {
        self.output_dir.join(format!("{}-{}.{}", prefix, stamp, ext))
    }

    async fn save_calendar<M: Mailbox + ?Sized>(
        &self,
        mailbox: &M,
        email: &Email,
        stamp: &str,
    ) -> Result<Option<PathBuf>> {
        let [attachment] = email.attachments.as_slice() else {
            log::warn!(
                "Expected one calendar attachment, confirmation email has {}; skipping",
                email.attachments.len()
            );
            return Ok(None);
        };

        let contents = mailbox.download_attachment(&email.id, attachment).await?;
        write_file(self.path("appointment", stamp, "ics"), &contents).await
    }

    async fn save_email(
        &self,
        email: Option<&Email>,
        prefix: &str,
        stamp: &str,
    ) -> Result<Option<PathBuf>> {
        match email {
            Some(email) => {
                write_file(self.path(prefix, stamp, "html"), email.body().as_bytes()).await
            }
            None => Ok(None),
        }
    }

    /// Write every artifact of a confirmed booking
    ///
    /// Only failing to create the output directory is an error; individual
    /// write failures end up in the report.
    pub async fn save<P, M>(
        &self,
        page: &P,
        mailbox: &M,
        booked: &BookedAppointment,
        booked_at: DateTime<Utc>,
    ) -> Result<ArtifactReport>
    where
        P: PageDriver,
        M: Mailbox + ?Sized,
    {
        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            BookingError::Other(format!(
                "Failed to create output directory {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let stamp = run_stamp(booked_at);
        let mut report = ArtifactReport::default();

        let screenshot = page.screenshot_full_page().await;
        let screenshot_sha256 = screenshot.as_ref().ok().map(|png| sha256_hex(png.as_slice()));

        let summary = BookingSummary {
            booked_at,
            slot_url: booked.slot.url().to_string(),
            slot_time: booked.slot.instant(),
            inbox_address: booked.inbox.email_address.clone(),
            screenshot_sha256,
        };
        let summary_json = serde_json::to_vec_pretty(&summary)
            .map_err(|e| BookingError::Other(format!("serialize booking summary: {}", e)));

        let confirmation = &booked.confirmation;

        let (png, ics, verification, confirmation_body, json) = futures::join!(
            async {
                match &screenshot {
                    Ok(png) => write_file(self.path("web-confirmation", &stamp, "png"), png).await,
                    Err(e) => Err(BookingError::Other(format!("screenshot: {}", e))),
                }
            },
            self.save_calendar(mailbox, &confirmation.confirmation_email, &stamp),
            self.save_email(
                confirmation.verification_email.as_ref(),
                "email-verification",
                &stamp
            ),
            self.save_email(
                Some(&confirmation.confirmation_email),
                "email-confirmation",
                &stamp
            ),
            async {
                match &summary_json {
                    Ok(json) => write_file(self.path("booking", &stamp, "json"), json).await,
                    Err(e) => Err(BookingError::Other(e.to_string())),
                }
            },
        );

        report.record("confirmation screenshot", png);
        report.record("calendar attachment", ics);
        report.record("verification email", verification);
        report.record("confirmation email", confirmation_body);
        report.record("booking summary", json);

        Ok(report)
    }
}
