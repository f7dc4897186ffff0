//! Comment Engine.
//!
//! The entry point for posting, editing, deleting and listing comments. It
//! consults the Access Gate and the Thread Store synchronously, and applies the
//! Visibility Filter to every listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use fl_core::policy::{self, AccessMode};
use fl_core::{
    Actor, AppError, Attachment, Comment, CommentNode, CommentRepo, IssueTags, MediaKind,
    MediaStore, ResourceRef, Result, Role, Thread, ThreadView, User, UserRepo,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::access::AccessGate;
use crate::threads::ThreadService;
use crate::visibility::{is_visible, visible_forest};

/// A file submitted together with a comment.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub content_type: String,
    pub data: Bytes,
}

/// Input of `create_comment`.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub resource: ResourceRef,
    pub content: String,
    /// Raw comma-delimited tag list as submitted.
    pub issue_tags: Option<String>,
    pub parent_id: Option<Uuid>,
    pub attachment: Option<AttachmentUpload>,
}

impl NewComment {
    pub fn new(resource: ResourceRef, content: impl Into<String>) -> Self {
        Self {
            resource,
            content: content.into(),
            issue_tags: None,
            parent_id: None,
            attachment: None,
        }
    }

    pub fn reply_to(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.issue_tags = Some(tags.into());
        self
    }

    pub fn with_attachment(mut self, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.attachment = Some(AttachmentUpload { content_type: content_type.into(), data: data.into() });
        self
    }
}

/// The dashboard's discussion panel.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LandingView {
    pub thread: Option<Thread>,
    pub comments: Vec<CommentNode>,
    /// Whether the actor may post into `thread` right now.
    pub can_post: bool,
}

#[derive(Clone)]
pub struct CommentEngine {
    gate: AccessGate,
    threads: ThreadService,
    comments: Arc<dyn CommentRepo>,
    users: Arc<dyn UserRepo>,
    media: Arc<dyn MediaStore>,
}

fn require_content(raw: &str) -> Result<&str> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::invalid("content required"));
    }
    Ok(content)
}

impl CommentEngine {
    pub fn new(
        gate: AccessGate,
        threads: ThreadService,
        comments: Arc<dyn CommentRepo>,
        users: Arc<dyn UserRepo>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self { gate, threads, comments, users, media }
    }

    async fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.comments
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("comment", id))
    }

    async fn author_of(&self, comment: &Comment) -> Result<User> {
        self.users
            .get_user(comment.author_id)
            .await?
            .ok_or_else(|| AppError::not_found("user", comment.author_id))
    }

    /// Rejects a reply that would sit deeper than `MAX_REPLY_DEPTH`.
    async fn ensure_reply_depth(&self, parent: &Comment) -> Result<()> {
        let mut depth = 1;
        let mut ancestor = parent.parent_id;
        while let Some(id) = ancestor {
            depth += 1;
            if depth > policy::MAX_REPLY_DEPTH {
                return Err(AppError::invalid("reply nested too deeply"));
            }
            ancestor = self.comments.get_comment(id).await?.and_then(|c| c.parent_id);
        }
        Ok(())
    }

    async fn ensure_can_delete_replies(&self, actor: &Actor, root: &Comment) -> Result<()> {
        let thread = self.comments.list_comments(root.thread_id).await?;
        let mut authors = HashSet::new();
        for reply in descendants(root.id, &thread) {
            if authors.insert(reply.author_id) {
                let author = self.author_of(reply).await?;
                if !policy::can_delete_comment(actor, &Actor::from(&author)) {
                    return Err(AppError::forbidden("cannot delete replies beneath this comment"));
                }
            }
        }
        Ok(())
    }

    /// Posts a comment or reply.
    ///
    /// Every check runs before the first write. The thread upsert comes next,
    /// then the attachment bytes, then the comment row; a failed row insert
    /// removes the stored bytes again.
    #[instrument(skip_all, fields(actor = %actor.id, resource = %input.resource))]
    pub async fn create_comment(&self, actor: &Actor, input: NewComment) -> Result<Comment> {
        let content = require_content(&input.content)?.to_string();
        self.gate.authorize(actor, input.resource, AccessMode::Write).await?;

        let existing = self.threads.find_thread(input.resource).await?;
        if let Some(thread) = &existing {
            ensure_unlocked(actor, thread)?;
        }

        let parent = match input.parent_id {
            None => None,
            Some(parent_id) => {
                let thread_id = existing.as_ref().map(|t| t.id);
                let parent = self
                    .comments
                    .get_comment(parent_id)
                    .await?
                    .filter(|p| Some(p.thread_id) == thread_id)
                    .ok_or_else(|| AppError::invalid("invalid parent"))?;
                self.ensure_reply_depth(&parent).await?;
                Some(parent)
            }
        };

        let upload = input.attachment.filter(|a| !a.data.is_empty());
        if let Some(upload) = &upload {
            if !policy::is_allowed_mime(&upload.content_type) {
                return Err(AppError::invalid(format!("attachment type {} not allowed", upload.content_type)));
            }
        }

        let thread = match existing {
            Some(thread) => thread,
            None => {
                let thread = self.threads.get_or_create_thread(input.resource, actor.id).await?;
                // Another request may have created and locked it in between.
                ensure_unlocked(actor, &thread)?;
                thread
            }
        };

        let attachment = match upload {
            Some(upload) => {
                let path = self
                    .media
                    .save_upload(actor.id, MediaKind::CommentAttachment, upload.data)
                    .await?;
                Some(Attachment { path, mime: upload.content_type.trim().to_string() })
            }
            None => None,
        };

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::now_v7(),
            thread_id: thread.id,
            author_id: actor.id,
            parent_id: parent.as_ref().map(|p| p.id),
            content,
            issue_tags: input.issue_tags.as_deref().map(IssueTags::parse).unwrap_or_default(),
            status: policy::initial_status(actor.role, parent.as_ref().map(|p| p.status)),
            is_edited: false,
            is_pinned: false,
            attachment,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.comments.insert_comment(comment.clone()).await {
            if let Some(attachment) = &comment.attachment {
                if let Err(cleanup) = self.media.remove(&attachment.path).await {
                    warn!(path = %attachment.path, error = %cleanup, "orphaned attachment after failed insert");
                }
            }
            return Err(err.into());
        }

        info!(comment = %comment.id, thread = %thread.id, status = %comment.status, "comment created");
        Ok(comment)
    }

    /// Replaces a comment's content. Status is left alone.
    #[instrument(skip_all, fields(actor = %actor.id, comment = %comment_id))]
    pub async fn edit_comment(&self, actor: &Actor, comment_id: Uuid, new_content: &str) -> Result<Comment> {
        if actor.role == Role::User {
            return Err(AppError::forbidden("read-only account"));
        }
        let content = require_content(new_content)?;
        let comment = self.get_comment(comment_id).await?;
        let author = self.author_of(&comment).await?;
        if !policy::can_edit_comment(actor.role, author.role) {
            return Err(AppError::forbidden("cannot edit this comment"));
        }

        self.comments.update_comment_content(comment.id, content).await?;
        info!(comment = %comment.id, "comment edited");
        self.get_comment(comment.id).await
    }

    /// Deletes a comment together with every reply beneath it. Returns how many
    /// comments were removed. The actor needs delete permission on every
    /// comment of the subtree, not only its root.
    #[instrument(skip_all, fields(actor = %actor.id, comment = %comment_id))]
    pub async fn delete_comment(&self, actor: &Actor, comment_id: Uuid) -> Result<usize> {
        if actor.role == Role::User {
            return Err(AppError::forbidden("read-only account"));
        }
        let comment = self.get_comment(comment_id).await?;
        let author = self.author_of(&comment).await?;
        if !policy::can_delete_comment(actor, &Actor::from(&author)) {
            return Err(AppError::forbidden("cannot delete this comment"));
        }
        self.ensure_can_delete_replies(actor, &comment).await?;

        let removed = self.comments.delete_comment_tree(comment.id).await?;
        for attachment in removed.iter().filter_map(|c| c.attachment.as_ref()) {
            if let Err(err) = self.media.remove(&attachment.path).await {
                warn!(path = %attachment.path, error = %err, "failed to remove attachment");
            }
        }
        info!(comment = %comment.id, removed = removed.len(), "comment deleted");
        Ok(removed.len())
    }

    /// Lists what `actor` may see on `resource`. Never creates a thread.
    #[instrument(skip_all, fields(actor = %actor.id, %resource))]
    pub async fn visible_comments(&self, actor: &Actor, resource: ResourceRef) -> Result<ThreadView> {
        self.gate.authorize(actor, resource, AccessMode::Read).await?;
        match self.threads.find_thread(resource).await? {
            Some(thread) => self.view_of(actor, thread).await,
            None => Ok(ThreadView::empty()),
        }
    }

    async fn view_of(&self, actor: &Actor, thread: Thread) -> Result<ThreadView> {
        let comments = self.comments.list_comments(thread.id).await?;
        let comments: Vec<CommentNode> = visible_forest(actor, comments);
        Ok(ThreadView { thread: Some(thread), comments })
    }

    /// Loads an attachment's bytes and MIME type. The comment must be visible
    /// to the actor and the actor must be able to read the thread's resource.
    #[instrument(skip_all, fields(actor = %actor.id, comment = %comment_id))]
    pub async fn attachment(&self, actor: &Actor, comment_id: Uuid) -> Result<(Vec<u8>, String)> {
        let comment = self.get_comment(comment_id).await?;
        let attachment = comment
            .attachment
            .clone()
            .ok_or_else(|| AppError::not_found("attachment", comment_id))?;
        let thread = self.threads.get_thread(comment.thread_id).await?;
        self.gate.authorize(actor, thread.resource, AccessMode::Read).await?;
        if !is_visible(actor, &comment) {
            return Err(AppError::not_found("attachment", comment_id));
        }
        let bytes = self.media.load(&attachment.path).await?;
        Ok((bytes, attachment.mime))
    }

    /// The discussion panel shown on the dashboard.
    pub async fn landing_thread(&self, actor: &Actor) -> Result<LandingView> {
        let Some(thread) = self.threads.find_thread_for_actor(actor).await? else {
            return Ok(LandingView::default());
        };
        if !self.gate.can_access(actor, thread.resource, AccessMode::Read).await? {
            return Ok(LandingView::default());
        }
        let can_write = self.gate.can_access(actor, thread.resource, AccessMode::Write).await?;
        let can_post = can_write && (!thread.is_locked || actor.role == Role::Admin);
        let view = self.view_of(actor, thread).await?;
        Ok(LandingView { thread: view.thread, comments: view.comments, can_post })
    }
}

/// Every comment below `root` in `thread`.
fn descendants(root: Uuid, thread: &[Comment]) -> Vec<&Comment> {
    let mut children: HashMap<Uuid, Vec<&Comment>> = HashMap::new();
    for comment in thread {
        if let Some(parent) = comment.parent_id {
            children.entry(parent).or_default().push(comment);
        }
    }
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for reply in children.remove(&id).unwrap_or_default() {
            stack.push(reply.id);
            out.push(reply);
        }
    }
    out
}

fn ensure_unlocked(actor: &Actor, thread: &Thread) -> Result<()> {
    if thread.is_locked && actor.role != Role::Admin {
        return Err(AppError::Locked(format!("thread {} is locked", thread.id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::{
        CommentStatus, MockCommentRepo, MockMediaStore, MockResourceRepo, MockThreadRepo, MockUserRepo,
        ResourceOwner,
    };
    use mockall::predicate::eq;

    struct Mocks {
        threads: MockThreadRepo,
        comments: MockCommentRepo,
        media: MockMediaStore,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                threads: MockThreadRepo::new(),
                comments: MockCommentRepo::new(),
                media: MockMediaStore::new(),
            }
        }

        /// Engine whose every resource is owned by `owner`.
        fn engine(self, owner: &Actor) -> CommentEngine {
            let owner = ResourceOwner { owner_id: owner.id, owner_role: owner.role };
            let mut resources = MockResourceRepo::new();
            resources.expect_resource_owner().returning(move |_| Ok(Some(owner)));
            let resources: Arc<dyn fl_core::ResourceRepo> = Arc::new(resources);
            let gate = AccessGate::new(resources.clone());
            let threads = ThreadService::new(Arc::new(self.threads), resources);
            CommentEngine::new(
                gate,
                threads,
                Arc::new(self.comments),
                Arc::new(MockUserRepo::new()),
                Arc::new(self.media),
            )
        }
    }

    fn thread(resource: ResourceRef, locked: bool) -> Thread {
        Thread {
            id: Uuid::now_v7(),
            resource,
            created_by: Uuid::now_v7(),
            is_locked: locked,
            pinned_comment_id: None,
            created_at: Utc::now(),
        }
    }

    fn comment_in(thread_id: Uuid) -> Comment {
        Comment {
            id: Uuid::now_v7(),
            thread_id,
            author_id: Uuid::now_v7(),
            parent_id: None,
            content: "stok pakan menipis".into(),
            issue_tags: IssueTags::default(),
            status: CommentStatus::Approved,
            is_edited: false,
            is_pinned: false,
            attachment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn locked_thread_refuses_staff_before_any_write() {
        let staff = Actor::new(Uuid::now_v7(), Role::Staff);
        let resource = ResourceRef::farm_data(Uuid::now_v7());
        let locked = thread(resource, true);

        let mut mocks = Mocks::new();
        mocks.threads.expect_find_thread().returning(move |_| Ok(Some(locked.clone())));
        mocks.threads.expect_get_or_create_thread().never();
        mocks.media.expect_save_upload().never();
        mocks.comments.expect_insert_comment().never();

        let engine = mocks.engine(&staff);
        let input = NewComment::new(resource, "ayam sakit").with_attachment("image/png", &b"\x89PNG"[..]);
        let err = engine.create_comment(&staff, input).await.unwrap_err();
        assert!(matches!(err, AppError::Locked(_)));
    }

    #[tokio::test]
    async fn parent_from_another_thread_is_invalid() {
        let staff = Actor::new(Uuid::now_v7(), Role::Staff);
        let resource = ResourceRef::farm_data(Uuid::now_v7());
        let existing = thread(resource, false);
        let foreign_parent = comment_in(Uuid::now_v7());
        let parent_id = foreign_parent.id;

        let mut mocks = Mocks::new();
        mocks.threads.expect_find_thread().returning(move |_| Ok(Some(existing.clone())));
        mocks.threads.expect_get_or_create_thread().never();
        mocks
            .comments
            .expect_get_comment()
            .with(eq(parent_id))
            .returning(move |_| Ok(Some(foreign_parent.clone())));
        mocks.comments.expect_insert_comment().never();

        let engine = mocks.engine(&staff);
        let err = engine
            .create_comment(&staff, NewComment::new(resource, "balasan").reply_to(parent_id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn failed_insert_removes_the_stored_attachment() {
        let staff = Actor::new(Uuid::now_v7(), Role::Staff);
        let resource = ResourceRef::farm_data(Uuid::now_v7());
        let created = thread(resource, false);

        let mut mocks = Mocks::new();
        mocks.threads.expect_find_thread().returning(|_| Ok(None));
        mocks
            .threads
            .expect_get_or_create_thread()
            .times(1)
            .returning(move |_, _| Ok(created.clone()));
        mocks
            .media
            .expect_save_upload()
            .times(1)
            .returning(|owner, _, _| Ok(format!("{owner}/comments/a1")));
        mocks
            .comments
            .expect_insert_comment()
            .returning(|_| Err(anyhow::anyhow!("disk I/O error")));
        let expected_path = format!("{}/comments/a1", staff.id);
        mocks
            .media
            .expect_remove()
            .withf(move |path| path == expected_path)
            .times(1)
            .returning(|_| Ok(()));

        let engine = mocks.engine(&staff);
        let input = NewComment::new(resource, "foto kandang").with_attachment("image/jpeg", &b"\xff\xd8"[..]);
        let err = engine.create_comment(&staff, input).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn blank_content_is_rejected_first() {
        let staff = Actor::new(Uuid::now_v7(), Role::Staff);
        let mut mocks = Mocks::new();
        mocks.threads.expect_find_thread().never();
        let engine = mocks.engine(&staff);
        let err = engine
            .create_comment(&staff, NewComment::new(ResourceRef::file(Uuid::now_v7()), "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn read_only_account_is_refused_before_content_check() {
        let reader = Actor::new(Uuid::now_v7(), Role::User);
        let mut mocks = Mocks::new();
        mocks.comments.expect_get_comment().never();
        mocks.comments.expect_update_comment_content().never();
        let engine = mocks.engine(&reader);
        let err = engine.edit_comment(&reader, Uuid::now_v7(), "  ").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
