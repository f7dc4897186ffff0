//! # Domain Models
//!
//! These structs represent the core entities of Farmlog.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// The closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Supervisor,
    Staff,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Supervisor => "SUPERVISOR",
            Role::Staff => "STAFF",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "SUPERVISOR" => Ok(Role::Supervisor),
            "STAFF" => Ok(Role::Staff),
            "USER" => Ok(Role::User),
            other => Err(AppError::invalid(format!("unknown role {other:?}"))),
        }
    }
}

/// Account approval state. New registrations wait for an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Pending,
    Active,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "PENDING",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AccountStatus::Pending),
            "ACTIVE" => Ok(AccountStatus::Active),
            "REJECTED" => Ok(AccountStatus::Rejected),
            other => Err(AppError::invalid(format!("unknown account status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 PHC string; never serialized out of the process.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.id, user.role)
    }
}

/// Kinds of records a discussion thread can hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    FarmData,
    File,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::FarmData => "FARM_DATA",
            ResourceType::File => "FILE",
        }
    }

    /// Parses the tag accepted on the wire, including the lowercase aliases
    /// older forms still submit.
    pub fn parse_tag(tag: &str) -> crate::Result<Self> {
        match tag {
            "FARM_DATA" | "farm" | "farm_data" => Ok(ResourceType::FarmData),
            "FILE" | "file" => Ok(ResourceType::File),
            other => Err(AppError::invalid(format!("invalid resource type {other:?}"))),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a commentable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceType,
    pub id: Uuid,
}

impl ResourceRef {
    pub fn farm_data(id: Uuid) -> Self {
        Self { kind: ResourceType::FarmData, id }
    }

    pub fn file(id: Uuid) -> Self {
        Self { kind: ResourceType::File, id }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Who owns a resource, resolved by the store for access decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOwner {
    pub owner_id: Uuid,
    pub owner_role: Role,
}

/// A daily farm log entry recorded by a staff member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// The day the numbers describe; drives "most recent record" lookups.
    pub record_date: DateTime<Utc>,
    pub total_chickens: i64,
    pub eggs_today: i64,
    pub feed_cost: i64,
    pub medicine_cost: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Metadata of an uploaded document; the bytes live in the MediaStore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    #[serde(skip_serializing)]
    pub path: String,
    pub mime: String,
    pub created_at: DateTime<Utc>,
}

/// The single discussion container for one resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub resource: ResourceRef,
    pub created_by: Uuid,
    pub is_locked: bool,
    pub pinned_comment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentStatus::Pending => "PENDING",
            CommentStatus::Approved => "APPROVED",
            CommentStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(CommentStatus::Pending),
            "APPROVED" => Ok(CommentStatus::Approved),
            "REJECTED" => Ok(CommentStatus::Rejected),
            other => Err(AppError::invalid(format!("invalid status {other:?}"))),
        }
    }
}

/// Issue tags attached to a comment: trimmed, non-empty, first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueTags(Vec<String>);

impl IssueTags {
    pub const DELIMITER: char = ',';

    /// Parses a comma-delimited tag list as submitted by forms or stored in the DB.
    pub fn parse(raw: &str) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in raw.split(Self::DELIMITER).map(str::trim).filter(|t| !t.is_empty()) {
            if !tags.iter().any(|seen| seen == tag) {
                tags.push(tag.to_string());
            }
        }
        Self(tags)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Storage form; `None` when there are no tags.
    pub fn to_delimited(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(","))
        }
    }
}

/// A file attached to a comment. Owned by the comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(skip_serializing)]
    pub path: String,
    pub mime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub author_id: Uuid,
    /// Immutable once set; always a comment of the same thread.
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub issue_tags: IssueTags,
    pub status: CommentStatus,
    pub is_edited: bool,
    pub is_pinned: bool,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A visible comment with its visible replies nested beneath it.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of comments in this subtree, including the node itself.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.replies);
        }
        count
    }

    /// Depth-first walk over every comment in the subtree.
    pub fn walk(&self) -> Vec<&Comment> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(&node.comment);
            stack.extend(node.replies.iter().rev());
        }
        out
    }
}

/// What a listing returns: the thread (if one was ever created) and the visible forest.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadView {
    pub thread: Option<Thread>,
    pub comments: Vec<CommentNode>,
}

impl ThreadView {
    pub fn empty() -> Self {
        Self { thread: None, comments: Vec::new() }
    }

    /// All visible comments, flattened depth-first.
    pub fn flatten(&self) -> Vec<&Comment> {
        self.comments.iter().flat_map(CommentNode::walk).collect()
    }
}

/// Outcome of a pin toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    Pinned,
    Unpinned,
}

/// Which area of the media store an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Standalone document uploads.
    File,
    /// Attachments posted with a comment.
    CommentAttachment,
}

/// A challenge shown on the login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Captcha {
    pub question: String,
    #[serde(skip_serializing)]
    pub answer: String,
    pub token: String,
}
