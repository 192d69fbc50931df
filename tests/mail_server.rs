//! Local stand-in for the MailSlurp REST API
//!
//! Serves the handful of endpoints the client uses from an in-memory queue of
//! unread emails. Runs on a random port like the other test servers.

#![allow(dead_code)]

use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use warp::http::StatusCode;
use warp::Filter;

pub const API_KEY: &str = "test-key";
pub const INBOX_ID: &str = "inbox-1";
pub const INBOX_ADDRESS: &str = "booker@mailslurp.test";

#[derive(Default)]
pub struct MailState {
    pub unread: VecDeque<Value>,
    pub attachments: HashMap<String, Vec<u8>>,
    pub inboxes_created: usize,
    /// `timeout` query values seen by waitForLatestEmail
    pub wait_timeouts: Vec<String>,
}

pub struct MailServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Arc<Mutex<MailState>>,
}

fn inbox_json() -> Value {
    json!({ "id": INBOX_ID, "emailAddress": INBOX_ADDRESS, "createdAt": "2024-01-01T00:00:00Z" })
}

fn auth() -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::exact("x-api-key", API_KEY)
}

impl MailServer {
    pub async fn start() -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::new(Mutex::new(MailState::default()));

        let with_state = {
            let state = state.clone();
            warp::any().map(move || state.clone())
        };

        let create_inbox = warp::post()
            .and(warp::path!("inboxes"))
            .and(auth())
            .and(with_state.clone())
            .map(|state: Arc<Mutex<MailState>>| {
                state.lock().unwrap().inboxes_created += 1;
                warp::reply::with_status(warp::reply::json(&inbox_json()), StatusCode::CREATED)
            });

        let get_inbox = warp::get()
            .and(warp::path!("inboxes" / String))
            .and(auth())
            .map(|id: String| {
                if id == INBOX_ID {
                    warp::reply::with_status(warp::reply::json(&inbox_json()), StatusCode::OK)
                } else {
                    warp::reply::with_status(
                        warp::reply::json(&json!({ "message": "Inbox not found" })),
                        StatusCode::NOT_FOUND,
                    )
                }
            });

        let inbox_emails = warp::get()
            .and(warp::path!("inboxes" / String / "emails"))
            .and(warp::query::<HashMap<String, String>>())
            .and(auth())
            .and(with_state.clone())
            .map(
                |_id: String, query: HashMap<String, String>, state: Arc<Mutex<MailState>>| {
                    let mut state = state.lock().unwrap();
                    let unread_only = query.get("unreadOnly").map(String::as_str) == Some("true");
                    let emails: Vec<Value> = if unread_only {
                        state.unread.drain(..).collect()
                    } else {
                        state.unread.iter().cloned().collect()
                    };
                    warp::reply::json(&emails)
                },
            );

        let wait_for_latest = warp::get()
            .and(warp::path!("waitForLatestEmail"))
            .and(warp::query::<HashMap<String, String>>())
            .and(auth())
            .and(with_state.clone())
            .map(
                |query: HashMap<String, String>, state: Arc<Mutex<MailState>>| {
                    let mut state = state.lock().unwrap();
                    if let Some(timeout) = query.get("timeout") {
                        state.wait_timeouts.push(timeout.clone());
                    }
                    match state.unread.pop_front() {
                        Some(email) => {
                            warp::reply::with_status(warp::reply::json(&email), StatusCode::OK)
                        }
                        None => warp::reply::with_status(
                            warp::reply::json(&json!({ "message": "No email found" })),
                            StatusCode::REQUEST_TIMEOUT,
                        ),
                    }
                },
            );

        let attachment = warp::get()
            .and(warp::path!("emails" / String / "attachments" / String / "base64"))
            .and(auth())
            .and(with_state.clone())
            .map(
                |_email_id: String, attachment_id: String, state: Arc<Mutex<MailState>>| {
                    let state = state.lock().unwrap();
                    match state.attachments.get(&attachment_id) {
                        Some(bytes) => warp::reply::with_status(
                            warp::reply::json(&json!({
                                "base64FileContents": general_purpose::STANDARD.encode(bytes),
                                "contentType": "text/calendar",
                                "sizeBytes": bytes.len(),
                            })),
                            StatusCode::OK,
                        ),
                        None => warp::reply::with_status(
                            warp::reply::json(&json!({ "message": "Attachment not found" })),
                            StatusCode::NOT_FOUND,
                        ),
                    }
                },
            );

        let routes = create_inbox
            .or(inbox_emails)
            .or(get_inbox)
            .or(wait_for_latest)
            .or(attachment);

        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
                shutdown_rx.await.ok();
            });

        tokio::spawn(server);

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn push_email(&self, email: Value) {
        self.state.lock().unwrap().unread.push_back(email);
    }

    pub fn add_attachment(&self, id: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .attachments
            .insert(id.to_string(), bytes.to_vec());
    }

    pub fn inboxes_created(&self) -> usize {
        self.state.lock().unwrap().inboxes_created
    }

    pub fn wait_timeouts(&self) -> Vec<String> {
        self.state.lock().unwrap().wait_timeouts.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.lock().unwrap().unread.len()
    }
}

impl Drop for MailServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
