//! # fl-services
//!
//! The comment visibility, threading and moderation engine, plus the thin
//! services around it. Everything here speaks fl-core types only.

pub mod access;
pub mod accounts;
pub mod comments;
pub mod farm;
pub mod moderation;
pub mod threads;
pub mod visibility;

use std::sync::Arc;

use fl_core::{AuthProvider, CommentRepo, MediaStore, ResourceRepo, ThreadRepo, UserRepo};

pub use access::AccessGate;
pub use accounts::{AccountService, LoginRequest};
pub use comments::{AttachmentUpload, CommentEngine, LandingView, NewComment};
pub use farm::{FarmService, FileService, NewFarmRecord};
pub use moderation::ModerationService;
pub use threads::ThreadService;

/// Every service, wired to one store, one media backend and one auth provider.
#[derive(Clone)]
pub struct Services {
    pub gate: AccessGate,
    pub threads: ThreadService,
    pub comments: CommentEngine,
    pub moderation: ModerationService,
    pub farm: FarmService,
    pub files: FileService,
    pub accounts: AccountService,
}

impl Services {
    pub fn new<R>(repo: Arc<R>, media: Arc<dyn MediaStore>, auth: Arc<dyn AuthProvider>) -> Self
    where
        R: UserRepo + ResourceRepo + ThreadRepo + CommentRepo + 'static,
    {
        let users: Arc<dyn UserRepo> = repo.clone();
        let resources: Arc<dyn ResourceRepo> = repo.clone();
        let thread_repo: Arc<dyn ThreadRepo> = repo.clone();
        let comment_repo: Arc<dyn CommentRepo> = repo;

        let gate = AccessGate::new(resources.clone());
        let threads = ThreadService::new(thread_repo.clone(), resources.clone());
        let comments = CommentEngine::new(
            gate.clone(),
            threads.clone(),
            comment_repo.clone(),
            users.clone(),
            media.clone(),
        );

        Self {
            moderation: ModerationService::new(comment_repo, thread_repo),
            farm: FarmService::new(resources.clone(), gate.clone()),
            files: FileService::new(resources, gate.clone(), media),
            accounts: AccountService::new(users, auth),
            gate,
            threads,
            comments,
        }
    }
}
