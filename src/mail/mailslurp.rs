//! MailSlurp REST client

use super::{Email, Inbox, Mailbox};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentBase64 {
    base64_file_contents: Option<String>,
}

pub struct MailSlurpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MailSlurpClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.header(API_KEY_HEADER, &self.api_key).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BookingError::Mail(format!("unexpected status {}: {}", status, body)));
        }
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl Mailbox for MailSlurpClient {
    async fn create_inbox(&self) -> Result<Inbox> {
        self.send(self.client.post(self.url("/inboxes"))).await
    }

    async fn get_inbox(&self, inbox_id: &str) -> Result<Inbox> {
        self.send(self.client.get(self.url(&format!("/inboxes/{}", inbox_id))))
            .await
    }

    async fn mark_all_read(&self, inbox_id: &str) -> Result<usize> {
        let emails: Vec<serde_json::Value> = self
            .send(
                self.client
                    .get(self.url(&format!("/inboxes/{}/emails", inbox_id)))
                    .query(&[("unreadOnly", "true")]),
            )
            .await?;
        log::debug!("Drained {} unread email(s) from inbox {}", emails.len(), inbox_id);
        Ok(emails.len())
    }

    async fn wait_for_latest_email(&self, inbox_id: &str, timeout: Duration) -> Result<Email> {
        let timeout_ms = timeout.as_millis().to_string();
        let request = self
            .client
            .get(self.url("/waitForLatestEmail"))
            .query(&[
                ("inboxId", inbox_id),
                ("timeout", timeout_ms.as_str()),
                ("unreadOnly", "true"),
            ])
            // Long poll: give the server its full timeout plus slack
            .timeout(timeout + DEFAULT_REQUEST_TIMEOUT)
            .header(API_KEY_HEADER, &self.api_key);

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BookingError::EmailTimeout {
                    inbox_id: inbox_id.to_string(),
                    secs: timeout.as_secs(),
                }
            } else {
                BookingError::from(e)
            }
        })?;

        match resp.status() {
            status if status.is_success() => Ok(resp.json::<Email>().await?),
            StatusCode::REQUEST_TIMEOUT | StatusCode::NOT_FOUND | StatusCode::GATEWAY_TIMEOUT => {
                Err(BookingError::EmailTimeout {
                    inbox_id: inbox_id.to_string(),
                    secs: timeout.as_secs(),
                })
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(BookingError::Mail(format!("unexpected status {}: {}", status, body)))
            }
        }
    }

    async fn download_attachment(&self, email_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let dto: AttachmentBase64 = self
            .send(self.client.get(self.url(&format!(
                "/emails/{}/attachments/{}/base64",
                email_id, attachment_id
            ))))
            .await?;

        let contents = dto
            .base64_file_contents
            .filter(|c| !c.is_empty())
            .ok_or_else(|| BookingError::Mail(format!("attachment {} is empty", attachment_id)))?;

        general_purpose::STANDARD
            .decode(contents.trim())
            .map_err(|e| BookingError::Mail(format!("invalid attachment encoding: {}", e)))
    }
}
