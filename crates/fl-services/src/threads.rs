//! Thread Store service.
//!
//! Threads are created only on the posting path (`get_or_create_thread`).
//! Every lookup here is read-only.

use std::sync::Arc;

use fl_core::policy::can_moderate;
use fl_core::{Actor, AppError, ResourceRef, ResourceRepo, ResourceType, Result, Thread, ThreadRepo};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct ThreadService {
    threads: Arc<dyn ThreadRepo>,
    resources: Arc<dyn ResourceRepo>,
}

impl ThreadService {
    pub fn new(threads: Arc<dyn ThreadRepo>, resources: Arc<dyn ResourceRepo>) -> Self {
        Self { threads, resources }
    }

    /// Idempotent. An existing thread is returned unchanged, creator included.
    pub async fn get_or_create_thread(&self, resource: ResourceRef, creator_id: Uuid) -> Result<Thread> {
        Ok(self.threads.get_or_create_thread(resource, creator_id).await?)
    }

    pub async fn find_thread(&self, resource: ResourceRef) -> Result<Option<Thread>> {
        Ok(self.threads.find_thread(resource).await?)
    }

    pub async fn get_thread(&self, id: Uuid) -> Result<Thread> {
        self.threads
            .get_thread(id)
            .await?
            .ok_or_else(|| AppError::not_found("thread", id))
    }

    /// Landing-page thread for an actor:
    /// 1. the thread of their most recent farm record,
    /// 2. else the newest thread on any of their farm records,
    /// 3. else, for moderators, the newest farm-record thread anywhere.
    pub async fn find_thread_for_actor(&self, actor: &Actor) -> Result<Option<Thread>> {
        let records = self.resources.list_farm_records_for_owner(actor.id).await?;

        if let Some(latest) = records.first() {
            if let Some(thread) = self.threads.find_thread(ResourceRef::farm_data(latest.id)).await? {
                debug!(actor = %actor.id, thread = %thread.id, "landing thread from latest record");
                return Ok(Some(thread));
            }
            if let Some(thread) = self.threads.latest_farm_thread_for_owner(actor.id).await? {
                debug!(actor = %actor.id, thread = %thread.id, "landing thread from older record");
                return Ok(Some(thread));
            }
        }

        if can_moderate(actor.role) {
            return Ok(self.threads.latest_thread_of_kind(ResourceType::FarmData).await?);
        }
        Ok(None)
    }
}
