//! Inbox capability
//!
//! Booking confirmations (and, for some services, verification codes) arrive
//! by email. The pipeline only needs to create or reuse an inbox and wait for
//! the next unread message; [`mailslurp`] implements that against MailSlurp.

pub mod mailslurp;

pub use mailslurp::MailSlurpClient;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An addressable mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub id: String,
    pub email_address: String,
}

/// A received email
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub id: String,
    pub subject: Option<String>,
    pub body: Option<String>,
    /// Attachment ids
    pub attachments: Vec<String>,
}

impl Email {
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn create_inbox(&self) -> Result<Inbox>;

    async fn get_inbox(&self, inbox_id: &str) -> Result<Inbox>;

    /// Read every unread email so only mail arriving afterwards counts as new.
    /// Returns how many were drained.
    async fn mark_all_read(&self, inbox_id: &str) -> Result<usize>;

    /// Wait for the next unread email, failing with `EmailTimeout`
    async fn wait_for_latest_email(&self, inbox_id: &str, timeout: Duration) -> Result<Email>;

    async fn download_attachment(&self, email_id: &str, attachment_id: &str) -> Result<Vec<u8>>;
}

/// Reuse the configured inbox or create a fresh one
pub async fn resolve_inbox<M: Mailbox + ?Sized>(
    mailbox: &M,
    inbox_id: Option<&str>,
) -> Result<Inbox> {
    let inbox = match inbox_id {
        Some(id) => mailbox.get_inbox(id).await?,
        None => {
            let inbox = mailbox.create_inbox().await?;
            log::info!("Created inbox {} <{}>", inbox.id, inbox.email_address);
            inbox
        }
    };
    Ok(inbox)
}
