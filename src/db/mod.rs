mod articles;
mod comments;
mod page;
mod role;
mod user;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use articles::{Article, ArticleChanges, ArticleStore, NewArticle};
pub use comments::{Comment, CommentStore};
pub use page::{Page, PageRequest};
pub use role::{ADMIN_ROLE, Role, RoleStore, USER_ROLE};
pub use user::{NewUser, User, UserChanges, UserStore};

/// SQLite timestamp expression with millisecond precision, used for every
/// `created_at`/`updated_at`/`published_at` column so ordering is stable.
pub(crate) const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Which unique column a failed insert/update collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Username,
    Email,
}

/// Classify a unique-constraint violation on the users table.
/// Returns `None` for any other error.
pub fn duplicate_key(err: &sqlx::Error) -> Option<DuplicateKey> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("users.username") {
        Some(DuplicateKey::Username)
    } else if message.contains("users.email") {
        Some(DuplicateKey::Email)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}", path)
        };

        let options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to ":memory:" is its own database, so keep exactly
        // one connection alive for the lifetime of the pool.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }
        if version < 2 {
            self.migrate_v2().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(&self, version: i32, queries: &[&str]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        let users = format!(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT ({NOW})
            )"
        );
        let articles = format!(
            "CREATE TABLE articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW}),
                published_at TEXT
            )"
        );
        let comments = format!(
            "CREATE TABLE comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW})
            )"
        );

        self.run_migration(
            1,
            &[
                users.as_str(),
                "CREATE TABLE roles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT UNIQUE NOT NULL,
                    description TEXT
                )",
                "CREATE TABLE user_roles (
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                    PRIMARY KEY (user_id, role_id)
                )",
                "INSERT INTO roles (name, description) VALUES
                    ('USER', 'Registered user'),
                    ('ADMIN', 'Can manage every article, comment and account')",
                articles.as_str(),
                "CREATE INDEX idx_articles_author_id ON articles(author_id)",
                "CREATE INDEX idx_articles_published ON articles(published, published_at)",
                "CREATE TABLE article_tags (
                    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    tag TEXT NOT NULL,
                    PRIMARY KEY (article_id, position)
                )",
                comments.as_str(),
                "CREATE INDEX idx_comments_article_id ON comments(article_id)",
                "CREATE INDEX idx_comments_author_id ON comments(author_id)",
                "CREATE INDEX idx_comments_parent_id ON comments(parent_id)",
            ],
        )
        .await
    }

    /// Add the case-folded title used by search and backfill it.
    async fn migrate_v2(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("ALTER TABLE articles ADD COLUMN title_folded TEXT NOT NULL DEFAULT ''")
            .execute(&mut *tx)
            .await?;

        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, title FROM articles")
            .fetch_all(&mut *tx)
            .await?;
        for (id, title) in rows {
            sqlx::query("UPDATE articles SET title_folded = ? WHERE id = ?")
                .bind(articles::fold_case(&title))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        Self::set_version(&mut tx, 2).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the role store.
    pub fn roles(&self) -> RoleStore {
        RoleStore::new(self.pool.clone())
    }

    /// Get the article store.
    pub fn articles(&self) -> ArticleStore {
        ArticleStore::new(self.pool.clone())
    }

    /// Get the comment store.
    pub fn comments(&self) -> CommentStore {
        CommentStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
