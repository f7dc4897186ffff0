//! Farm records and document uploads: plain validation plus storage.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use fl_core::policy::{self, AccessMode};
use fl_core::{
    Actor, AppError, FarmRecord, MediaKind, MediaStore, ResourceRef, ResourceRepo, Result, Role,
    StoredFile,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access::AccessGate;

/// A daily log entry as submitted by the input form.
#[derive(Debug, Clone)]
pub struct NewFarmRecord {
    /// Defaults to now when the form leaves it out.
    pub record_date: Option<DateTime<Utc>>,
    pub total_chickens: i64,
    pub eggs_today: i64,
    pub feed_cost: i64,
    pub medicine_cost: i64,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct FarmService {
    resources: Arc<dyn ResourceRepo>,
    gate: AccessGate,
}

impl FarmService {
    pub fn new(resources: Arc<dyn ResourceRepo>, gate: AccessGate) -> Self {
        Self { resources, gate }
    }

    pub async fn record(&self, actor: &Actor, input: NewFarmRecord) -> Result<FarmRecord> {
        if actor.role == Role::User {
            return Err(AppError::forbidden("read-only account"));
        }
        let counts = [
            ("totalChickens", input.total_chickens),
            ("eggsToday", input.eggs_today),
            ("feedCost", input.feed_cost),
            ("medicineCost", input.medicine_cost),
        ];
        if let Some((field, _)) = counts.iter().find(|(_, v)| *v < 0) {
            return Err(AppError::invalid(format!("{field} must not be negative")));
        }

        let now = Utc::now();
        let record = FarmRecord {
            id: Uuid::now_v7(),
            owner_id: actor.id,
            record_date: input.record_date.unwrap_or(now),
            total_chickens: input.total_chickens,
            eggs_today: input.eggs_today,
            feed_cost: input.feed_cost,
            medicine_cost: input.medicine_cost,
            notes: input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_at: now,
        };
        self.resources.create_farm_record(record.clone()).await?;
        info!(record = %record.id, owner = %actor.id, "farm record saved");
        Ok(record)
    }

    /// The actor's own records, newest first.
    pub async fn list_own(&self, actor: &Actor) -> Result<Vec<FarmRecord>> {
        Ok(self.resources.list_farm_records_for_owner(actor.id).await?)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<FarmRecord> {
        self.gate.authorize(actor, ResourceRef::farm_data(id), AccessMode::Read).await?;
        self.resources
            .get_farm_record(id)
            .await?
            .ok_or_else(|| AppError::not_found("farm record", id))
    }
}

#[derive(Clone)]
pub struct FileService {
    resources: Arc<dyn ResourceRepo>,
    gate: AccessGate,
    media: Arc<dyn MediaStore>,
}

impl FileService {
    pub fn new(resources: Arc<dyn ResourceRepo>, gate: AccessGate, media: Arc<dyn MediaStore>) -> Self {
        Self { resources, gate, media }
    }

    pub async fn upload(&self, actor: &Actor, filename: &str, content_type: &str, data: Bytes) -> Result<StoredFile> {
        if actor.role == Role::User {
            return Err(AppError::forbidden("read-only account"));
        }
        if data.is_empty() {
            return Err(AppError::invalid("file required"));
        }
        if !policy::is_allowed_mime(content_type) {
            return Err(AppError::invalid(format!("file type {content_type} not allowed")));
        }

        let path = self.media.save_upload(actor.id, MediaKind::File, data).await?;
        let file = StoredFile {
            id: Uuid::now_v7(),
            owner_id: actor.id,
            filename: filename.trim().to_string(),
            path,
            mime: content_type.trim().to_string(),
            created_at: Utc::now(),
        };
        if let Err(err) = self.resources.create_file(file.clone()).await {
            if let Err(cleanup) = self.media.remove(&file.path).await {
                warn!(path = %file.path, error = %cleanup, "orphaned upload after failed insert");
            }
            return Err(err.into());
        }
        info!(file = %file.id, owner = %actor.id, "file uploaded");
        Ok(file)
    }

    pub async fn download(&self, actor: &Actor, id: Uuid) -> Result<(StoredFile, Vec<u8>)> {
        self.gate.authorize(actor, ResourceRef::file(id), AccessMode::Read).await?;
        let file = self
            .resources
            .get_file(id)
            .await?
            .ok_or_else(|| AppError::not_found("file", id))?;
        let bytes = self.media.load(&file.path).await?;
        Ok((file, bytes))
    }
}
