//! Poll loop
//!
//! One cycle launches a browser, scrapes dates and timeslots, filters them and
//! tries to book candidates one after another. A cycle ends in one of:
//!
//! - booked: artifacts are written and the loop stops
//! - nothing bookable (or a recoverable failure): sleep the retry interval
//! - blocked by rate limit or captcha: sleep the longer cool-off interval
//!
//! The loop is unbounded. Only a browser that cannot be launched ends it
//! with an error.

use crate::artifacts::{ArtifactReport, ArtifactSaver};
use crate::booking::{book_appointment, BookedAppointment};
use crate::browser::{BrowserLauncher, BrowserSession, PageDriver};
use crate::config::BookingConfig;
use crate::error::{BookingError, Result};
use crate::filter::{filter_between_dates, filter_between_times};
use crate::link::AppointmentLink;
use crate::mail::{resolve_inbox, Inbox, Mailbox};
use crate::scrape::{collect_timeslots, scrape_calendar};
use chrono::Utc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FetchingDates,
    FetchingSlots,
    Booking,
    Success,
    NoAvailability,
    Blocked,
}

/// A confirmed booking and the files written for it
#[derive(Debug)]
pub struct BookingReceipt {
    pub booked: BookedAppointment,
    pub artifacts: ArtifactReport,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Booked(BookingReceipt),
    /// Nothing in range, or every candidate failed
    NoAvailability(String),
    /// The cycle failed before any candidate could be tried
    Failed(BookingError),
    /// Rate limit or captcha
    Blocked(BookingError),
}

pub struct Orchestrator<L: BrowserLauncher, M: Mailbox> {
    config: BookingConfig,
    launcher: L,
    mailbox: M,
    artifacts: ArtifactSaver,
    inbox: Option<Inbox>,
    stage: Stage,
}

impl<L: BrowserLauncher, M: Mailbox> Orchestrator<L, M> {
    pub fn new(config: BookingConfig, launcher: L, mailbox: M) -> Self {
        let artifacts = ArtifactSaver::new(config.output_dir.clone());
        Self {
            config,
            launcher,
            mailbox,
            artifacts,
            inbox: None,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// How long to wait before the next cycle; `None` once booked
    pub fn retry_delay(&self, outcome: &CycleOutcome) -> Option<Duration> {
        match outcome {
            CycleOutcome::Booked(_) => None,
            CycleOutcome::Blocked(_) => Some(self.config.polling.cool_off()),
            CycleOutcome::NoAvailability(_) | CycleOutcome::Failed(_) => {
                Some(self.config.polling.retry_interval())
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        if self.stage != stage {
            log::info!("Stage {:?} -> {:?}", self.stage, stage);
            self.stage = stage;
        }
    }

    /// Poll until a booking succeeds
    pub async fn run(&mut self) -> Result<BookingReceipt> {
        let mut cycle = 0u64;
        loop {
            cycle += 1;
            log::info!("Starting booking cycle {}", cycle);

            let outcome = self.run_cycle().await?;
            let delay = self.retry_delay(&outcome);

            match outcome {
                CycleOutcome::Booked(receipt) => return Ok(receipt),
                CycleOutcome::Blocked(e) => log::warn!("Blocked by the site - {}", e),
                CycleOutcome::NoAvailability(reason) => log::info!("No availability: {}", reason),
                CycleOutcome::Failed(e) => log::warn!("Cycle failed - {}", e),
            }

            if let Some(delay) = delay {
                log::info!("Sleeping {}s before the next cycle", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// One pass over the whole pipeline with a fresh browser
    ///
    /// The browser is closed exactly once whatever the outcome. Only a
    /// launch failure is returned as an error.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        self.enter(Stage::Idle);

        let session = self.launcher.launch().await.map_err(|e| {
            log::error!("Browser setup failed: {}", e);
            e
        })?;

        let outcome = match self.pipeline(&session).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_blocking() => CycleOutcome::Blocked(e),
            Err(e) => CycleOutcome::Failed(e),
        };

        if let Err(e) = session.close().await {
            log::warn!("Closing browser failed: {}", e);
        }

        self.enter(match &outcome {
            CycleOutcome::Booked(_) => Stage::Success,
            CycleOutcome::Blocked(_) => Stage::Blocked,
            CycleOutcome::NoAvailability(_) | CycleOutcome::Failed(_) => Stage::NoAvailability,
        });

        Ok(outcome)
    }

    async fn pipeline(&mut self, session: &L::Session) -> Result<CycleOutcome> {
        self.enter(Stage::FetchingDates);
        let dates = match self.fetch_dates(session).await {
            Ok(dates) => dates,
            Err(
                e @ (BookingError::NoAppointmentsForSelection
                | BookingError::Maintenance
                | BookingError::BookingUnavailable),
            ) => return Ok(CycleOutcome::NoAvailability(e.to_string())),
            Err(e) => return Err(e),
        };

        let dates = filter_between_dates(&dates, &self.config.dates);
        log::info!("{} date(s) within {}", dates.len(), self.config.dates);
        if dates.is_empty() {
            return Ok(CycleOutcome::NoAvailability(
                "no dates in range".to_string(),
            ));
        }

        self.enter(Stage::FetchingSlots);
        let slots = collect_timeslots(
            session,
            &dates,
            self.config.polling.concurrency,
            &self.config.timeouts,
        )
        .await?;
        log::info!("Found {} timeslot(s)", slots.len());

        let slots = filter_between_times(&slots, &self.config.times);
        log::info!("{} timeslot(s) within {}", slots.len(), self.config.times);
        if slots.is_empty() {
            return Ok(CycleOutcome::NoAvailability(
                "no timeslots in range".to_string(),
            ));
        }

        let inbox = self.ensure_inbox().await?;

        self.enter(Stage::Booking);
        for (i, slot) in slots.iter().enumerate() {
            log::info!("Booking candidate {}/{}: {}", i + 1, slots.len(), slot);
            match self.try_slot(session, &inbox, slot).await {
                Ok(receipt) => return Ok(CycleOutcome::Booked(receipt)),
                Err(e) if e.is_blocking() => return Err(e),
                Err(e) if e.is_slot_lost() => {
                    log::info!("Slot lost, trying next candidate - {}", e);
                }
                Err(e) => {
                    log::warn!("Booking failed for {}, trying next candidate - {}", slot, e);
                }
            }
        }

        Ok(CycleOutcome::NoAvailability(format!(
            "all {} candidate(s) failed",
            slots.len()
        )))
    }

    async fn fetch_dates(&self, session: &L::Session) -> Result<Vec<AppointmentLink>> {
        let page = session.new_page().await?;
        let result = scrape_calendar(&page, &self.config).await;
        if let Err(e) = page.close().await {
            log::warn!("Closing calendar page failed: {}", e);
        }
        result
    }

    /// Resolve the inbox once and reuse it for every later cycle
    async fn ensure_inbox(&mut self) -> Result<Inbox> {
        if let Some(inbox) = &self.inbox {
            return Ok(inbox.clone());
        }
        let inbox = resolve_inbox(&self.mailbox, self.config.mail.inbox_id.as_deref()).await?;
        log::info!("Using inbox <{}>", inbox.email_address);
        self.inbox = Some(inbox.clone());
        Ok(inbox)
    }

    async fn try_slot(
        &self,
        session: &L::Session,
        inbox: &Inbox,
        slot: &AppointmentLink,
    ) -> Result<BookingReceipt> {
        let page = session.new_page().await?;

        let result = match book_appointment(&page, &self.mailbox, inbox, &self.config, slot).await
        {
            Ok(booked) => {
                log::info!("Appointment booked: {}", booked.slot);
                let artifacts = match self
                    .artifacts
                    .save(&page, &self.mailbox, &booked, Utc::now())
                    .await
                {
                    Ok(report) => report,
                    Err(e) => {
                        log::error!("Saving artifacts failed: {}", e);
                        ArtifactReport {
                            saved: Vec::new(),
                            failed: vec![e.to_string()],
                        }
                    }
                };
                Ok(BookingReceipt { booked, artifacts })
            }
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            log::warn!("Closing booking page failed: {}", e);
        }
        result
    }
}
