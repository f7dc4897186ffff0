//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Ports report infrastructure failures through `anyhow`; "absent" is `Ok(None)`.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::models::{
    AccountStatus, Captcha, Comment, CommentStatus, FarmRecord, MediaKind, PinState,
    ResourceOwner, ResourceRef, ResourceType, Role, StoredFile, Thread, User,
};

/// Account persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create_user(&self, user: User) -> anyhow::Result<()>;
    async fn set_user_status(&self, id: Uuid, status: AccountStatus) -> anyhow::Result<()>;
    async fn set_user_role(&self, id: Uuid, role: Role) -> anyhow::Result<()>;
}

/// Farm records and uploaded files, the things comments attach to.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ResourceRepo: Send + Sync {
    /// Owner id and the owner's current role, or `None` for an unknown resource.
    async fn resource_owner(&self, resource: ResourceRef) -> anyhow::Result<Option<ResourceOwner>>;

    async fn create_farm_record(&self, record: FarmRecord) -> anyhow::Result<()>;
    async fn get_farm_record(&self, id: Uuid) -> anyhow::Result<Option<FarmRecord>>;
    /// Newest `record_date` first.
    async fn list_farm_records_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<FarmRecord>>;

    async fn create_file(&self, file: StoredFile) -> anyhow::Result<()>;
    async fn get_file(&self, id: Uuid) -> anyhow::Result<Option<StoredFile>>;
}

/// Thread persistence. One row per resource, guarded by a unique index.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// Atomic insert-if-absent keyed on the resource; returns the stored row.
    async fn get_or_create_thread(&self, resource: ResourceRef, creator_id: Uuid) -> anyhow::Result<Thread>;
    async fn find_thread(&self, resource: ResourceRef) -> anyhow::Result<Option<Thread>>;
    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>>;
    /// Most recently created thread on any farm record owned by `owner_id`.
    async fn latest_farm_thread_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Option<Thread>>;
    /// Most recently created thread of the given kind, system-wide.
    async fn latest_thread_of_kind(&self, kind: ResourceType) -> anyhow::Result<Option<Thread>>;
    async fn set_thread_locked(&self, id: Uuid, locked: bool) -> anyhow::Result<()>;
    /// Toggles the pin on `comment_id` inside one transaction, clearing any
    /// other pinned comment of the thread.
    async fn toggle_pin(&self, thread_id: Uuid, comment_id: Uuid) -> anyhow::Result<PinState>;
}

/// Comment persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()>;
    async fn get_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>>;
    /// Every comment of the thread, ascending by creation time.
    async fn list_comments(&self, thread_id: Uuid) -> anyhow::Result<Vec<Comment>>;
    /// Replaces the content and marks the comment edited.
    async fn update_comment_content(&self, id: Uuid, content: &str) -> anyhow::Result<()>;
    async fn set_comment_status(&self, id: Uuid, status: CommentStatus) -> anyhow::Result<()>;
    /// Deletes the comment and its whole reply subtree; returns what was removed.
    async fn delete_comment_tree(&self, id: Uuid) -> anyhow::Result<Vec<Comment>>;
}

/// Durable byte storage for uploads and comment attachments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Writes the bytes under a per-owner area with a fresh opaque name and
    /// returns the storage path. Returns only after the bytes are durable.
    async fn save_upload(&self, owner_id: Uuid, kind: MediaKind, data: Bytes) -> anyhow::Result<String>;
    async fn load(&self, path: &str) -> anyhow::Result<Vec<u8>>;
    async fn remove(&self, path: &str) -> anyhow::Result<()>;
}

/// Credentials, sessions and request tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AuthProvider: Send + Sync {
    fn hash_password(&self, password: &str) -> anyhow::Result<String>;
    fn verify_password(&self, password: &str, hash: &str) -> bool;

    /// Produces the opaque value stored in the session cookie.
    fn issue_session(&self, user_id: Uuid) -> String;
    /// Inverse of `issue_session`; `None` for anything forged or malformed.
    fn resolve_session(&self, token: &str) -> Option<Uuid>;

    fn issue_csrf_token(&self) -> String;
    fn verify_csrf(&self, expected: &str, presented: &str) -> bool;

    fn create_captcha(&self) -> Captcha;
    fn verify_captcha(&self, answer: &str, token: &str) -> bool;
}
