//! Notification sink for failures and messages that a user should see

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{ErrorResponse, ReposcopeError};

/// A message raised by a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub repo_id: String,
    pub message: String,
    pub is_error: bool,
    pub error: Option<ErrorResponseSummary>,
}

/// Code and details of the error behind a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponseSummary {
    pub code: String,
    pub details: Option<String>,
}

impl From<ErrorResponse> for ErrorResponseSummary {
    fn from(response: ErrorResponse) -> Self {
        ErrorResponseSummary {
            code: response.code,
            details: response.details,
        }
    }
}

/// Receives notifications raised by repositories
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, notification: Notification);

    fn notify(&self, repo_id: &str, message: &str) {
        self.dispatch(Notification {
            repo_id: repo_id.to_string(),
            message: message.to_string(),
            is_error: false,
            error: None,
        });
    }

    fn notify_error(&self, repo_id: &str, error: &ReposcopeError) {
        self.dispatch(Notification {
            repo_id: repo_id.to_string(),
            message: error.to_string(),
            is_error: true,
            error: Some(ErrorResponse::from(error).into()),
        });
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn dispatch(&self, notification: Notification) {
        if notification.is_error {
            tracing::error!(repo = %notification.repo_id, "{}", notification.message);
        } else {
            tracing::info!(repo = %notification.repo_id, "{}", notification.message);
        }
    }
}

/// Forwards notifications over a channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelNotifier {
    fn dispatch(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::debug!("Notification dropped, receiver closed");
        }
    }
}
