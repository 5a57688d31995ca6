use std::sync::Arc;

use tracing::instrument;

use courier_auth::Actor;
use courier_core::{DomainError, NotificationId};

use crate::error::ServiceResult;
use crate::repository::{InboxEntry, MarketRepository};

/// The caller's own notification inbox.
#[derive(Clone)]
pub struct InboxService {
    repo: Arc<dyn MarketRepository>,
}

impl InboxService {
    pub fn new(repo: Arc<dyn MarketRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, actor: &Actor) -> ServiceResult<Vec<InboxEntry>> {
        Ok(self.repo.list_notifications(actor.user_id).await?)
    }

    /// Someone else's notification reads as not found.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id), err)]
    pub async fn mark_read(&self, actor: &Actor, id: NotificationId) -> ServiceResult<()> {
        if self.repo.mark_notification_read(actor.user_id, id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found().into())
        }
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> ServiceResult<u64> {
        Ok(self.repo.mark_all_notifications_read(actor.user_id).await?)
    }
}
