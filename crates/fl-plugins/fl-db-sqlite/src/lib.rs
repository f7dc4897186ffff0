//! # fl-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `fl-core` domain models. Every repository port is implemented by the
//! one `SqliteFarmRepo`.

use std::str::FromStr;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use fl_core::models::{
    AccountStatus, Attachment, Comment, CommentStatus, FarmRecord, IssueTags, PinState,
    ResourceOwner, ResourceRef, ResourceType, Role, StoredFile, Thread, User,
};
use fl_core::traits::{CommentRepo, ResourceRepo, ThreadRepo, UserRepo};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, role, status, created_at";
const FARM_COLUMNS: &str =
    "id, owner_id, record_date, total_chickens, eggs_today, feed_cost, medicine_cost, notes, created_at";
const FILE_COLUMNS: &str = "id, owner_id, filename, path, mime, created_at";
const THREAD_COLUMNS: &str =
    "id, resource_type, resource_id, created_by, is_locked, pinned_comment_id, created_at";
const COMMENT_COLUMNS: &str = "id, thread_id, author_id, parent_id, content, issue_tags, status, \
     is_edited, is_pinned, attachment_path, attachment_mime, created_at, updated_at";

pub struct SqliteFarmRepo {
    pool: SqlitePool,
}

impl SqliteFarmRepo {
    /// Connects and brings the schema up to date.
    ///
    /// An in-memory database lives only as long as its connection, so those
    /// get a single connection that is never recycled.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };
        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!(url, "sqlite schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn user_from_row(row: &SqliteRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_str(row.try_get("role")?)?,
        status: AccountStatus::from_str(row.try_get("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

fn farm_from_row(row: &SqliteRow) -> anyhow::Result<FarmRecord> {
    Ok(FarmRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        record_date: row.try_get("record_date")?,
        total_chickens: row.try_get("total_chickens")?,
        eggs_today: row.try_get("eggs_today")?,
        feed_cost: row.try_get("feed_cost")?,
        medicine_cost: row.try_get("medicine_cost")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn file_from_row(row: &SqliteRow) -> anyhow::Result<StoredFile> {
    Ok(StoredFile {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        mime: row.try_get("mime")?,
        created_at: row.try_get("created_at")?,
    })
}

fn thread_from_row(row: &SqliteRow) -> anyhow::Result<Thread> {
    Ok(Thread {
        id: row.try_get("id")?,
        resource: ResourceRef {
            kind: ResourceType::parse_tag(row.try_get("resource_type")?)?,
            id: row.try_get("resource_id")?,
        },
        created_by: row.try_get("created_by")?,
        is_locked: row.try_get("is_locked")?,
        pinned_comment_id: row.try_get("pinned_comment_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn comment_from_row(row: &SqliteRow) -> anyhow::Result<Comment> {
    let path: Option<String> = row.try_get("attachment_path")?;
    let mime: Option<String> = row.try_get("attachment_mime")?;
    let tags: Option<String> = row.try_get("issue_tags")?;
    Ok(Comment {
        id: row.try_get("id")?,
        thread_id: row.try_get("thread_id")?,
        author_id: row.try_get("author_id")?,
        parent_id: row.try_get("parent_id")?,
        content: row.try_get("content")?,
        issue_tags: tags.as_deref().map(IssueTags::parse).unwrap_or_default(),
        status: CommentStatus::from_str(row.try_get("status")?)?,
        is_edited: row.try_get("is_edited")?,
        is_pinned: row.try_get("is_pinned")?,
        attachment: match (path, mime) {
            (Some(path), Some(mime)) => Some(Attachment { path, mime }),
            _ => None,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepo for SqliteFarmRepo {
    async fn get_user(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, user: User) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO users (id, email, password_hash, role, status, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(user.id)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_user_status(&self, id: Uuid, status: AccountStatus) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceRepo for SqliteFarmRepo {
    async fn resource_owner(&self, resource: ResourceRef) -> anyhow::Result<Option<ResourceOwner>> {
        let sql = match resource.kind {
            ResourceType::FarmData => {
                "SELECT r.owner_id, u.role FROM farm_records r JOIN users u ON u.id = r.owner_id WHERE r.id = ?"
            }
            ResourceType::File => {
                "SELECT r.owner_id, u.role FROM files r JOIN users u ON u.id = r.owner_id WHERE r.id = ?"
            }
        };
        let row = sqlx::query(sql).bind(resource.id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(ResourceOwner {
                owner_id: row.try_get("owner_id")?,
                owner_role: Role::from_str(row.try_get("role")?)?,
            })),
            None => Ok(None),
        }
    }

    async fn create_farm_record(&self, record: FarmRecord) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT INTO farm_records ({FARM_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(record.id)
        .bind(record.owner_id)
        .bind(record.record_date)
        .bind(record.total_chickens)
        .bind(record.eggs_today)
        .bind(record.feed_cost)
        .bind(record.medicine_cost)
        .bind(record.notes)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_farm_record(&self, id: Uuid) -> anyhow::Result<Option<FarmRecord>> {
        let row = sqlx::query(&format!("SELECT {FARM_COLUMNS} FROM farm_records WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(farm_from_row).transpose()
    }

    async fn list_farm_records_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Vec<FarmRecord>> {
        sqlx::query(&format!(
            "SELECT {FARM_COLUMNS} FROM farm_records WHERE owner_id = ? ORDER BY record_date DESC, id DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(farm_from_row)
        .collect()
    }

    async fn create_file(&self, file: StoredFile) -> anyhow::Result<()> {
        sqlx::query(&format!("INSERT INTO files ({FILE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"))
            .bind(file.id)
            .bind(file.owner_id)
            .bind(file.filename)
            .bind(file.path)
            .bind(file.mime)
            .bind(file.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> anyhow::Result<Option<StoredFile>> {
        let row = sqlx::query(&format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(file_from_row).transpose()
    }
}

#[async_trait]
impl ThreadRepo for SqliteFarmRepo {
    /// Single-statement upsert; the unique key on (resource_type, resource_id)
    /// settles concurrent first posts.
    async fn get_or_create_thread(&self, resource: ResourceRef, creator_id: Uuid) -> anyhow::Result<Thread> {
        let inserted = sqlx::query(
            "INSERT INTO threads (id, resource_type, resource_id, created_by, is_locked, pinned_comment_id, created_at) \
             VALUES (?, ?, ?, ?, 0, NULL, ?) \
             ON CONFLICT (resource_type, resource_id) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .bind(creator_id)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();
        if inserted > 0 {
            debug!(%resource, "thread created");
        }

        self.find_thread(resource)
            .await?
            .ok_or_else(|| anyhow!("thread for {resource} missing after upsert"))
    }

    async fn find_thread(&self, resource: ResourceRef) -> anyhow::Result<Option<Thread>> {
        let row = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE resource_type = ? AND resource_id = ?"
        ))
        .bind(resource.kind.as_str())
        .bind(resource.id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn get_thread(&self, id: Uuid) -> anyhow::Result<Option<Thread>> {
        let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn latest_farm_thread_for_owner(&self, owner_id: Uuid) -> anyhow::Result<Option<Thread>> {
        let row = sqlx::query(
            "SELECT t.id, t.resource_type, t.resource_id, t.created_by, t.is_locked, t.pinned_comment_id, t.created_at \
             FROM threads t JOIN farm_records f ON t.resource_id = f.id \
             WHERE t.resource_type = 'FARM_DATA' AND f.owner_id = ? \
             ORDER BY t.created_at DESC, t.id DESC LIMIT 1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn latest_thread_of_kind(&self, kind: ResourceType) -> anyhow::Result<Option<Thread>> {
        let row = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE resource_type = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(thread_from_row).transpose()
    }

    async fn set_thread_locked(&self, id: Uuid, locked: bool) -> anyhow::Result<()> {
        sqlx::query("UPDATE threads SET is_locked = ? WHERE id = ?")
            .bind(locked)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Thread pointer, old pinned comment and new pinned comment change in one
    /// transaction.
    async fn toggle_pin(&self, thread_id: Uuid, comment_id: Uuid) -> anyhow::Result<PinState> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Uuid> =
            sqlx::query_scalar::<_, Option<Uuid>>("SELECT pinned_comment_id FROM threads WHERE id = ?")
                .bind(thread_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| anyhow!("thread {thread_id} not found"))?;
        let unpin = current == Some(comment_id);

        sqlx::query("UPDATE comments SET is_pinned = 0 WHERE thread_id = ? AND is_pinned = 1")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE threads SET pinned_comment_id = ? WHERE id = ?")
            .bind(if unpin { None } else { Some(comment_id) })
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE comments SET is_pinned = ? WHERE id = ?")
            .bind(!unpin)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(if unpin { PinState::Unpinned } else { PinState::Pinned })
    }
}

#[async_trait]
impl CommentRepo for SqliteFarmRepo {
    async fn insert_comment(&self, comment: Comment) -> anyhow::Result<()> {
        let (path, mime) = match comment.attachment {
            Some(a) => (Some(a.path), Some(a.mime)),
            None => (None, None),
        };
        sqlx::query(&format!(
            "INSERT INTO comments ({COMMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(comment.id)
        .bind(comment.thread_id)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(comment.content)
        .bind(comment.issue_tags.to_delimited())
        .bind(comment.status.as_str())
        .bind(comment.is_edited)
        .bind(comment.is_pinned)
        .bind(path)
        .bind(mime)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> anyhow::Result<Option<Comment>> {
        let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn list_comments(&self, thread_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE thread_id = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(comment_from_row)
        .collect()
    }

    async fn update_comment_content(&self, id: Uuid, content: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET content = ?, is_edited = 1, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_comment_status(&self, id: Uuid, status: CommentStatus) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(chrono::Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Collects the subtree deepest-first, then deletes leaves before parents
    /// and clears any thread pin pointing into it, all in one transaction.
    async fn delete_comment_tree(&self, id: Uuid) -> anyhow::Result<Vec<Comment>> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "WITH RECURSIVE subtree(id, depth) AS ( \
                 SELECT id, 0 FROM comments WHERE id = ? \
                 UNION ALL \
                 SELECT c.id, s.depth + 1 FROM comments c JOIN subtree s ON c.parent_id = s.id \
             ) \
             SELECT c.id, c.thread_id, c.author_id, c.parent_id, c.content, c.issue_tags, c.status, \
                    c.is_edited, c.is_pinned, c.attachment_path, c.attachment_mime, c.created_at, c.updated_at \
             FROM comments c JOIN subtree s ON s.id = c.id \
             ORDER BY s.depth DESC",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(comment_from_row)
        .collect::<anyhow::Result<Vec<_>>>()?;

        for comment in &removed {
            sqlx::query("UPDATE threads SET pinned_comment_id = NULL WHERE pinned_comment_id = ?")
                .bind(comment.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(comment.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }
}
