use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::task::JoinHandle;

use courier_core::{NotificationId, UserId};
use courier_orders::{Notice, Recipient};

use super::Notifier;
use crate::repository::InboxEntry;

/// Turns audience notices into inbox rows and pushes them after commit.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// One inbox row per concrete recipient. `AllAdmins` expands to `admin_ids`;
    /// a user named twice for the same notice gets one row.
    pub fn inbox_entries(notices: &[Notice], admin_ids: &[UserId], now: DateTime<Utc>) -> Vec<InboxEntry> {
        let mut entries: Vec<InboxEntry> = Vec::new();
        for notice in notices {
            let recipients: Vec<UserId> = match notice.recipient {
                Recipient::User(id) => vec![id],
                Recipient::AllAdmins => admin_ids.to_vec(),
            };
            for user_id in recipients {
                let duplicate = entries.iter().any(|e| {
                    e.user_id == user_id && e.order_id == Some(notice.order_id) && e.title == notice.title
                });
                if duplicate {
                    continue;
                }
                entries.push(InboxEntry {
                    id: NotificationId::new(),
                    user_id,
                    order_id: Some(notice.order_id),
                    title: notice.title.clone(),
                    message: notice.body.clone(),
                    link: Some(notice.link.clone()),
                    is_read: false,
                    created_at: now,
                });
            }
        }
        entries
    }

    /// Push every entry in the background. Failures are logged at `warn`.
    pub fn dispatch(&self, entries: Vec<InboxEntry>) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            for entry in entries {
                let metadata = json!({
                    "notification_id": entry.id,
                    "order_id": entry.order_id,
                    "link": entry.link,
                });
                if let Err(err) = notifier
                    .send(entry.user_id, &entry.title, &entry.message, metadata)
                    .await
                {
                    tracing::warn!(
                        user_id = %entry.user_id,
                        notification_id = %entry.id,
                        error = %err,
                        "push notification failed"
                    );
                }
            }
        })
    }
}
