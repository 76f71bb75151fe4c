use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::NOW;
use super::page::{Page, PageRequest};

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

/// A comment with the names of the things it points at, so a listing needs
/// no follow-up lookups.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub article_id: i64,
    pub article_title: String,
    pub author_id: i64,
    pub author_username: String,
    pub parent_id: Option<i64>,
    pub parent_author_username: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COMMENT: &str = "SELECT c.id, c.content, c.article_id, a.title AS article_title,
        c.author_id, u.username AS author_username,
        c.parent_id, pu.username AS parent_author_username,
        c.created_at, c.updated_at
    FROM comments c
    JOIN articles a ON a.id = c.article_id
    JOIN users u ON u.id = c.author_id
    LEFT JOIN comments p ON p.id = c.parent_id
    LEFT JOIN users pu ON pu.id = p.author_id";

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a comment. Returns the comment ID.
    pub async fn create(
        &self,
        article_id: i64,
        author_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO comments (article_id, author_id, parent_id, content) VALUES (?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(parent_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Comment>, sqlx::Error> {
        sqlx::query_as(&format!("{SELECT_COMMENT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Comments on an article, oldest first.
    pub async fn list_by_article(
        &self,
        article_id: i64,
        request: PageRequest,
    ) -> Result<Page<Comment>, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE article_id = ?")
            .bind(article_id)
            .fetch_one(&self.pool)
            .await?;
        let content: Vec<Comment> = sqlx::query_as(&format!(
            "{SELECT_COMMENT} WHERE c.article_id = ?
             ORDER BY c.created_at ASC, c.id ASC LIMIT ? OFFSET ?"
        ))
        .bind(article_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(content, request, total))
    }

    /// Comments written by one user, newest first.
    pub async fn list_by_author(
        &self,
        author_id: i64,
        request: PageRequest,
    ) -> Result<Page<Comment>, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        let content: Vec<Comment> = sqlx::query_as(&format!(
            "{SELECT_COMMENT} WHERE c.author_id = ?
             ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(author_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(content, request, total))
    }

    /// Replace a comment's text. Returns false if the comment doesn't exist.
    pub async fn update_content(&self, id: i64, content: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            "UPDATE comments SET content = ?, updated_at = {NOW} WHERE id = ?"
        ))
        .bind(content)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a comment. Replies cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
