//! # Authority Rules
//!
//! Pure decisions over the closed `Role` set. Nothing here touches the store;
//! the services resolve owners and authors first and then ask these functions.

use crate::models::{Actor, CommentStatus, ResourceOwner, Role};

/// Comment attachments and document uploads must be one of these.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "application/pdf"];

/// Deepest reply level a new comment may take; a root sits at level 0.
/// Listings fold anything stored deeper onto this level.
pub const MAX_REPLY_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// ADMIN and SUPERVISOR change comment status and see every comment.
pub fn can_moderate(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Supervisor)
}

/// Pin and lock are reserved for ADMIN.
pub fn can_pin_or_lock(role: Role) -> bool {
    role == Role::Admin
}

fn is_staff_tier(role: Role) -> bool {
    matches!(role, Role::Staff | Role::Supervisor)
}

/// Resource access, first match wins.
///
/// Read and write share one rule today; the mode is kept in the signature so
/// the two can diverge without touching every call site.
pub fn can_access(actor: &Actor, owner: &ResourceOwner, _mode: AccessMode) -> bool {
    match actor.role {
        Role::User => false,
        Role::Admin => true,
        Role::Supervisor => owner.owner_id == actor.id || is_staff_tier(owner.owner_role),
        Role::Staff => owner.owner_id == actor.id,
    }
}

/// Edit permission by role. Deliberately coarse: below SUPERVISOR it only
/// compares the two roles, not the identities.
pub fn can_edit_comment(actor_role: Role, author_role: Role) -> bool {
    match actor_role {
        Role::Admin => true,
        Role::Supervisor => is_staff_tier(author_role),
        other => other == author_role,
    }
}

/// Delete permission: the author, a SUPERVISOR over staff-tier authors, or ADMIN.
pub fn can_delete_comment(actor: &Actor, author: &Actor) -> bool {
    match actor.role {
        Role::User => false,
        Role::Admin => true,
        Role::Supervisor => actor.id == author.id || is_staff_tier(author.role),
        Role::Staff => actor.id == author.id,
    }
}

/// Initial status of a new comment.
///
/// STAFF continue an approved discussion without review; everything else they
/// post waits for a moderator. Moderator comments are approved immediately.
pub fn initial_status(author_role: Role, parent_status: Option<CommentStatus>) -> CommentStatus {
    match author_role {
        Role::Staff => match parent_status {
            Some(CommentStatus::Approved) => CommentStatus::Approved,
            _ => CommentStatus::Pending,
        },
        _ => CommentStatus::Approved,
    }
}

/// Checks a declared content type against the allow-list, ignoring parameters
/// such as `charset`.
pub fn is_allowed_mime(content_type: &str) -> bool {
    match content_type.parse::<mime::Mime>() {
        Ok(parsed) => ALLOWED_MIME_TYPES.contains(&parsed.essence_str()),
        Err(_) => false,
    }
}
