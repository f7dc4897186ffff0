//! Shared fixtures: a full service stack over in-memory SQLite, a temp media
//! directory and the simple auth provider.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use fl_auth_simple::SimpleAuthProvider;
use fl_core::{
    AccountStatus, Actor, FarmRecord, MediaStore, ResourceRef, ResourceRepo, Role, StoredFile, User, UserRepo,
};
use fl_db_sqlite::SqliteFarmRepo;
use fl_services::Services;
use fl_storage_local::LocalMediaStore;
use uuid::Uuid;

pub struct World {
    pub repo: Arc<SqliteFarmRepo>,
    pub media: Arc<dyn MediaStore>,
    pub services: Services,
}

impl World {
    pub async fn new() -> anyhow::Result<Self> {
        let root: PathBuf = std::env::temp_dir().join(format!("farmlog-it-{}", Uuid::new_v4()));
        Self::with_media(Arc::new(LocalMediaStore::new(root))).await
    }

    pub async fn with_media(media: Arc<dyn MediaStore>) -> anyhow::Result<Self> {
        let repo = Arc::new(SqliteFarmRepo::new("sqlite::memory:").await?);
        let auth = Arc::new(SimpleAuthProvider::new(b"integration-secret-0123456789")?);
        let services = Services::new(repo.clone(), media.clone(), auth);
        Ok(Self { repo, media, services })
    }

    /// An active account with the given role.
    pub async fn actor(&self, role: Role) -> anyhow::Result<Actor> {
        let user = User {
            id: Uuid::now_v7(),
            email: format!("{}@farm.test", Uuid::new_v4().simple()),
            password_hash: String::new(),
            role,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        };
        self.repo.create_user(user.clone()).await?;
        Ok(Actor::from(&user))
    }

    /// A farm record owned by `owner`, dated `days_ago` days back.
    pub async fn farm_record_dated(&self, owner: &Actor, days_ago: i64) -> anyhow::Result<ResourceRef> {
        let record = FarmRecord {
            id: Uuid::now_v7(),
            owner_id: owner.id,
            record_date: Utc::now() - Duration::days(days_ago),
            total_chickens: 500,
            eggs_today: 410,
            feed_cost: 1_200_000,
            medicine_cost: 150_000,
            notes: None,
            created_at: Utc::now(),
        };
        self.repo.create_farm_record(record.clone()).await?;
        Ok(ResourceRef::farm_data(record.id))
    }

    pub async fn farm_record(&self, owner: &Actor) -> anyhow::Result<ResourceRef> {
        self.farm_record_dated(owner, 0).await
    }

    pub async fn file(&self, owner: &Actor) -> anyhow::Result<ResourceRef> {
        let file = StoredFile {
            id: Uuid::now_v7(),
            owner_id: owner.id,
            filename: "laporan.pdf".into(),
            path: format!("{}/files/{}", owner.id, Uuid::new_v4()),
            mime: "application/pdf".into(),
            created_at: Utc::now(),
        };
        self.repo.create_file(file.clone()).await?;
        Ok(ResourceRef::file(file.id))
    }
}
