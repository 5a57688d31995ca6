//! Push notifications.
//!
//! The inbox row is the durable record and is written with the transition.
//! Pushes are fire-and-forget: a failing [`Notifier`] is logged, never
//! surfaced to the caller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use courier_core::UserId;

pub mod dispatcher;

pub use dispatcher::NotificationDispatcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("push delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: UserId, title: &str, body: &str, metadata: Value) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    async fn send(&self, user_id: UserId, title: &str, body: &str, metadata: Value) -> Result<(), NotifyError> {
        (**self).send(user_id, title, body, metadata).await
    }
}

/// Logs each push. The default when no push provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, user_id: UserId, title: &str, body: &str, metadata: Value) -> Result<(), NotifyError> {
        tracing::info!(%user_id, title, body, %metadata, "push notification");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
    pub metadata: Value,
}

/// Records pushes in memory. Can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<SentPush>>,
    failing: Mutex<bool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `send` fails while this is on.
    pub fn fail_all(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, user_id: UserId) -> Vec<SentPush> {
        self.sent()
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, user_id: UserId, title: &str, body: &str, metadata: Value) -> Result<(), NotifyError> {
        let failing = self.failing.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(NotifyError::Delivery(format!("simulated failure for {user_id}")));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentPush {
                user_id,
                title: title.to_string(),
                body: body.to_string(),
                metadata,
            });
        }
        Ok(())
    }
}
