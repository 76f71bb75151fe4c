//! Article storage. Tags live in `article_tags` keyed by position so their
//! order survives a round trip.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::NOW;
use super::page::{Page, PageRequest};

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub tags: Vec<String>,
    pub author_id: i64,
    pub author_username: String,
    pub comments_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewArticle<'a> {
    pub author_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub published: bool,
    pub tags: &'a [String],
}

/// Replacement values for an existing article. `tags: None` keeps the
/// current tags.
#[derive(Debug, Clone, Copy)]
pub struct ArticleChanges<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub published: bool,
    pub tags: Option<&'a [String]>,
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    author_id: i64,
    author_username: String,
    title: String,
    content: String,
    published: bool,
    created_at: String,
    updated_at: String,
    published_at: Option<String>,
    comments_count: i64,
    tags: Option<String>,
}

/// Separator for the aggregated tag column. Tags are validated to be printable.
const TAG_SEPARATOR: char = '\u{1f}';

/// Case folding used for title search. SQLite's `LOWER` only folds ASCII, so
/// titles are folded here and stored in `title_folded`.
pub(crate) fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            published: row.published,
            tags: row
                .tags
                .map(|tags| tags.split(TAG_SEPARATOR).map(str::to_string).collect())
                .unwrap_or_default(),
            author_id: row.author_id,
            author_username: row.author_username,
            comments_count: row.comments_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            published_at: row.published_at,
        }
    }
}

const SELECT_ARTICLE: &str = "SELECT a.id, a.author_id, u.username AS author_username,
        a.title, a.content, a.published, a.created_at, a.updated_at, a.published_at,
        (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) AS comments_count,
        (SELECT group_concat(t.tag, char(31) ORDER BY t.position)
         FROM article_tags t WHERE t.article_id = a.id) AS tags
    FROM articles a
    JOIN users u ON u.id = a.author_id";

async fn replace_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    article_id: i64,
    tags: &[String],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM article_tags WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut **tx)
        .await?;
    for (position, tag) in tags.iter().enumerate() {
        sqlx::query("INSERT INTO article_tags (article_id, position, tag) VALUES (?, ?, ?)")
            .bind(article_id)
            .bind(position as i64)
            .bind(tag)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an article and its tags. Returns the article ID.
    pub async fn create(&self, article: &NewArticle<'_>) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            "INSERT INTO articles (author_id, title, title_folded, content, published, published_at)
             VALUES (?, ?, ?, ?, ?, CASE WHEN ? THEN {NOW} END)"
        ))
        .bind(article.author_id)
        .bind(article.title)
        .bind(fold_case(article.title))
        .bind(article.content)
        .bind(article.published)
        .bind(article.published)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        replace_tags(&mut tx, id, article.tags).await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Article>, sqlx::Error> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!("{SELECT_ARTICLE} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::from))
    }

    /// Published articles, most recently published first.
    pub async fn list_published(&self, request: PageRequest) -> Result<Page<Article>, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE published = 1")
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "{SELECT_ARTICLE} WHERE a.published = 1
             ORDER BY a.published_at DESC, a.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Article::from).collect(),
            request,
            total,
        ))
    }

    /// All articles of one author, published or not, newest first.
    pub async fn list_by_author(
        &self,
        author_id: i64,
        request: PageRequest,
    ) -> Result<Page<Article>, sqlx::Error> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE author_id = ?")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "{SELECT_ARTICLE} WHERE a.author_id = ?
             ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(author_id)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Article::from).collect(),
            request,
            total,
        ))
    }

    /// Published articles whose title contains `keyword`, ignoring case.
    pub async fn search_published(
        &self,
        keyword: &str,
        request: PageRequest,
    ) -> Result<Page<Article>, sqlx::Error> {
        // instr() avoids treating % and _ in the keyword as LIKE wildcards.
        let keyword = fold_case(keyword);
        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM articles
             WHERE published = 1 AND instr(title_folded, ?) > 0",
        )
        .bind(&keyword)
        .fetch_one(&self.pool)
        .await?;
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "{SELECT_ARTICLE} WHERE a.published = 1 AND instr(a.title_folded, ?) > 0
             ORDER BY a.published_at DESC, a.id DESC LIMIT ? OFFSET ?"
        ))
        .bind(&keyword)
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Page::new(
            rows.into_iter().map(Article::from).collect(),
            request,
            total,
        ))
    }

    /// Overwrite an article. Moving from unpublished to published stamps
    /// `published_at`. Returns false if the article doesn't exist.
    pub async fn update(&self, id: i64, changes: &ArticleChanges<'_>) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            "UPDATE articles SET
                title = ?,
                title_folded = ?,
                content = ?,
                published_at = CASE WHEN ? AND published = 0 THEN {NOW} ELSE published_at END,
                published = ?,
                updated_at = {NOW}
             WHERE id = ?"
        ))
        .bind(changes.title)
        .bind(fold_case(changes.title))
        .bind(changes.content)
        .bind(changes.published)
        .bind(changes.published)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(tags) = changes.tags {
            replace_tags(&mut tx, id, tags).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Flip the published flag. Publishing stamps `published_at`; unpublishing
    /// keeps the previous stamp. Returns false if the article doesn't exist.
    pub async fn toggle_published(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            "UPDATE articles SET
                published_at = CASE WHEN published = 0 THEN {NOW} ELSE published_at END,
                published = 1 - published,
                updated_at = {NOW}
             WHERE id = ?"
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an article. Tags and comments cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
