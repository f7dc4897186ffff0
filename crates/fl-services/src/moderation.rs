//! Moderation State Machine.
//!
//! Status moves freely between PENDING, APPROVED and REJECTED for moderators;
//! there is no terminal state. Pin and lock are ADMIN-only.

use std::sync::Arc;

use fl_core::policy::{can_moderate, can_pin_or_lock};
use fl_core::{Actor, AppError, Comment, CommentRepo, CommentStatus, PinState, Result, Thread, ThreadRepo};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct ModerationService {
    comments: Arc<dyn CommentRepo>,
    threads: Arc<dyn ThreadRepo>,
}

impl ModerationService {
    pub fn new(comments: Arc<dyn CommentRepo>, threads: Arc<dyn ThreadRepo>) -> Self {
        Self { comments, threads }
    }

    async fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.comments
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found("comment", id))
    }

    async fn get_thread(&self, id: Uuid) -> Result<Thread> {
        self.threads
            .get_thread(id)
            .await?
            .ok_or_else(|| AppError::not_found("thread", id))
    }

    #[instrument(skip_all, fields(actor = %actor.id, comment = %comment_id, %status))]
    pub async fn set_status(&self, actor: &Actor, comment_id: Uuid, status: CommentStatus) -> Result<Comment> {
        let mut comment = self.get_comment(comment_id).await?;
        if !can_moderate(actor.role) {
            return Err(AppError::forbidden("moderators only"));
        }
        if comment.status != status {
            self.comments.set_comment_status(comment.id, status).await?;
            info!(from = %comment.status, to = %status, "comment status changed");
            comment.status = status;
        }
        Ok(comment)
    }

    /// Pins the comment, or unpins it if it is the thread's pinned comment.
    #[instrument(skip_all, fields(actor = %actor.id, comment = %comment_id))]
    pub async fn toggle_pin(&self, actor: &Actor, comment_id: Uuid) -> Result<PinState> {
        let comment = self.get_comment(comment_id).await?;
        if !can_pin_or_lock(actor.role) {
            return Err(AppError::forbidden("admins only"));
        }
        let state = self.threads.toggle_pin(comment.thread_id, comment.id).await?;
        info!(thread = %comment.thread_id, ?state, "pin toggled");
        Ok(state)
    }

    #[instrument(skip_all, fields(actor = %actor.id, thread = %thread_id, locked = locked))]
    pub async fn set_lock(&self, actor: &Actor, thread_id: Uuid, locked: bool) -> Result<Thread> {
        let mut thread = self.get_thread(thread_id).await?;
        if !can_pin_or_lock(actor.role) {
            return Err(AppError::forbidden("admins only"));
        }
        self.threads.set_thread_locked(thread.id, locked).await?;
        info!("thread lock updated");
        thread.is_locked = locked;
        Ok(thread)
    }

    /// Lock by way of any comment in the thread, as the moderation form submits it.
    pub async fn set_lock_for_comment(&self, actor: &Actor, comment_id: Uuid, locked: bool) -> Result<Thread> {
        let comment = self.get_comment(comment_id).await?;
        self.set_lock(actor, comment.thread_id, locked).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fl_core::{IssueTags, MockCommentRepo, MockThreadRepo, Role};

    fn pending_comment() -> Comment {
        Comment {
            id: Uuid::now_v7(),
            thread_id: Uuid::now_v7(),
            author_id: Uuid::now_v7(),
            parent_id: None,
            content: "telur retak".into(),
            issue_tags: IssueTags::default(),
            status: CommentStatus::Pending,
            is_edited: false,
            is_pinned: false,
            attachment: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn staff_cannot_change_status() {
        let comment = pending_comment();
        let mut comments = MockCommentRepo::new();
        comments.expect_get_comment().returning(move |_| Ok(Some(comment.clone())));
        comments.expect_set_comment_status().never();

        let svc = ModerationService::new(Arc::new(comments), Arc::new(MockThreadRepo::new()));
        let staff = Actor::new(Uuid::now_v7(), Role::Staff);
        let err = svc
            .set_status(&staff, Uuid::now_v7(), CommentStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn supervisor_approves() {
        let comment = pending_comment();
        let id = comment.id;
        let mut comments = MockCommentRepo::new();
        comments.expect_get_comment().returning(move |_| Ok(Some(comment.clone())));
        comments
            .expect_set_comment_status()
            .withf(move |cid, status| *cid == id && *status == CommentStatus::Approved)
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = ModerationService::new(Arc::new(comments), Arc::new(MockThreadRepo::new()));
        let sup = Actor::new(Uuid::now_v7(), Role::Supervisor);
        let updated = svc.set_status(&sup, id, CommentStatus::Approved).await.unwrap();
        assert_eq!(updated.status, CommentStatus::Approved);
    }

    #[tokio::test]
    async fn supervisor_cannot_pin() {
        let comment = pending_comment();
        let mut comments = MockCommentRepo::new();
        comments.expect_get_comment().returning(move |_| Ok(Some(comment.clone())));
        let mut threads = MockThreadRepo::new();
        threads.expect_toggle_pin().never();

        let svc = ModerationService::new(Arc::new(comments), Arc::new(threads));
        let sup = Actor::new(Uuid::now_v7(), Role::Supervisor);
        assert!(matches!(
            svc.toggle_pin(&sup, Uuid::now_v7()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn missing_comment_is_not_found() {
        let mut comments = MockCommentRepo::new();
        comments.expect_get_comment().returning(|_| Ok(None));
        let svc = ModerationService::new(Arc::new(comments), Arc::new(MockThreadRepo::new()));
        let admin = Actor::new(Uuid::now_v7(), Role::Admin);
        assert!(matches!(
            svc.toggle_pin(&admin, Uuid::now_v7()).await,
            Err(AppError::NotFound(..))
        ));
    }
}
