//! Visibility Filter.
//!
//! Moderators see every comment. Everyone else sees approved comments plus
//! their own, whatever the status. Replies are judged on their own; an
//! approved reply under a parent this actor cannot see is surfaced as a root
//! and keeps its `parent_id`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use fl_core::policy::{can_moderate, MAX_REPLY_DEPTH};
use fl_core::{Actor, Comment, CommentNode, CommentStatus};
use uuid::Uuid;

pub fn is_visible(actor: &Actor, comment: &Comment) -> bool {
    can_moderate(actor.role) || comment.status == CommentStatus::Approved || comment.author_id == actor.id
}

/// Builds the visible forest. Every level is ascending by creation time, ties
/// broken by id. Nesting stops at `MAX_REPLY_DEPTH`: deeper replies are listed
/// beside their parent on that level and keep their `parent_id`.
pub fn visible_forest(actor: &Actor, mut comments: Vec<Comment>) -> Vec<CommentNode> {
    comments.retain(|c| is_visible(actor, c));
    comments.sort_by(by_creation);

    let visible_ids: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut roots = Vec::new();
    for comment in &comments {
        match comment.parent_id {
            Some(parent) if visible_ids.contains(&parent) => children.entry(parent).or_default().push(comment.id),
            _ => roots.push(comment.id),
        }
    }

    // (comment, node it is listed under), every node ahead of its listed replies.
    let mut placement: Vec<(Uuid, Option<Uuid>)> = Vec::with_capacity(comments.len());
    let mut stack: Vec<(Uuid, Option<Uuid>, usize)> = roots.into_iter().rev().map(|id| (id, None, 0)).collect();
    while let Some((id, listed_under, depth)) = stack.pop() {
        placement.push((id, listed_under));
        let (reply_under, reply_depth) = if depth < MAX_REPLY_DEPTH {
            (Some(id), depth + 1)
        } else {
            (listed_under, depth)
        };
        if let Some(replies) = children.remove(&id) {
            stack.extend(replies.into_iter().rev().map(|reply| (reply, reply_under, reply_depth)));
        }
    }

    let mut by_id: HashMap<Uuid, Comment> = comments.into_iter().map(|c| (c.id, c)).collect();
    let mut pending: HashMap<Uuid, Vec<CommentNode>> = HashMap::new();
    let mut forest = Vec::new();
    for (id, listed_under) in placement.into_iter().rev() {
        let Some(comment) = by_id.remove(&id) else { continue };
        let mut replies = pending.remove(&id).unwrap_or_default();
        replies.sort_by(|a, b| by_creation(&a.comment, &b.comment));
        let node = CommentNode { comment, replies };
        match listed_under {
            Some(parent) => pending.entry(parent).or_default().push(node),
            None => forest.push(node),
        }
    }
    forest.sort_by(|a, b| by_creation(&a.comment, &b.comment));
    forest
}

fn by_creation(a: &Comment, b: &Comment) -> Ordering {
    a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
}
