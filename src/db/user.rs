use std::fmt;

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// A persisted account. `roles` holds bare role names ("USER", "ADMIN").
#[derive(Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub created_at: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("roles", &self.roles)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Fields needed to insert a user.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Account fields to overwrite. `None` leaves the column as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserChanges<'a> {
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    roles: Option<String>,
    created_at: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let mut roles: Vec<String> = row
            .roles
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        roles.sort();
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            created_at: row.created_at,
        }
    }
}

const SELECT_USER: &str = "SELECT u.id, u.username, u.email, u.password_hash, u.created_at,
        (SELECT group_concat(r.name, ',') FROM user_roles ur
         JOIN roles r ON r.id = ur.role_id
         WHERE ur.user_id = u.id) AS roles
    FROM users u";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a user and its role assignments atomically. Returns the user ID.
    /// A taken username or email surfaces as a unique violation, see
    /// [`duplicate_key`](super::duplicate_key).
    pub async fn create(&self, user: &NewUser<'_>, role_ids: &[i64]) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, ?)")
                .bind(user.username)
                .bind(user.email)
                .bind(user.password_hash)
                .execute(&mut *tx)
                .await?;
        let id = result.last_insert_rowid();

        for role_id in role_ids {
            sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
                .bind(id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE u.username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE u.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 != 0)
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 != 0)
    }

    /// List all users, oldest first.
    pub async fn list_all(&self) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{SELECT_USER} ORDER BY u.id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Change a user's email. Returns false if the user doesn't exist.
    /// Whether a user other than `id` holds `email` (case-insensitive).
    pub async fn email_in_use_by_other(&self, email: &str, id: i64) -> Result<bool, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND id != ?)")
                .bind(email)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0 != 0)
    }

    /// Apply the given changes in one statement; `None` keeps the column.
    /// Returns false if the user doesn't exist.
    pub async fn update(&self, id: i64, changes: &UserChanges<'_>) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET
                email = COALESCE(?, email),
                password_hash = COALESCE(?, password_hash)
             WHERE id = ?",
        )
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a user. Their articles, comments and role assignments cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{ADMIN_ROLE, Database, USER_ROLE};

    use super::*;

    async fn role_id(db: &Database, name: &str) -> i64 {
        db.roles().find_by_name(name).await.unwrap().unwrap().id
    }

    fn alice() -> NewUser<'static> {
        NewUser {
            username: "alice",
            email: "a@x.com",
            password_hash: "hash",
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();
        let user_role = role_id(&db, USER_ROLE).await;
        let store = db.users();

        let id = store.create(&alice(), &[user_role]).await.unwrap();

        let user = store.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.roles, vec!["USER"]);

        let by_id = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(store.get_by_id(id + 1).await.unwrap().is_none());
        assert!(store.get_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roles_loaded_sorted() {
        let db = Database::open(":memory:").await.unwrap();
        let user_role = role_id(&db, USER_ROLE).await;
        let admin_role = role_id(&db, ADMIN_ROLE).await;

        let id = db
            .users()
            .create(&alice(), &[user_role, admin_role])
            .await
            .unwrap();
        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.roles, vec!["ADMIN", "USER"]);
    }

    #[tokio::test]
    async fn test_exists_checks_are_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create(&alice(), &[]).await.unwrap();

        assert!(db.users().exists_by_username("ALICE").await.unwrap());
        assert!(db.users().exists_by_email("A@X.COM").await.unwrap());
        assert!(!db.users().exists_by_username("bob").await.unwrap());
        assert!(!db.users().exists_by_email("b@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_email_in_use_by_other_skips_owner() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.users().create(&alice(), &[]).await.unwrap();

        assert!(!db.users().email_in_use_by_other("A@x.com", id).await.unwrap());
        assert!(db.users().email_in_use_by_other("A@x.com", id + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::open(":memory:").await.unwrap();
        let store = db.users();
        let id = store.create(&alice(), &[]).await.unwrap();

        let email_only = UserChanges {
            email: Some("new@x.com"),
            password_hash: None,
        };
        assert!(store.update(id, &email_only).await.unwrap());
        let user = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "new@x.com");
        assert_eq!(user.password_hash, "hash");

        let both = UserChanges {
            email: Some("New@X.com"),
            password_hash: Some("hash2"),
        };
        assert!(store.update(id, &both).await.unwrap());
        let user = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.email, "New@X.com");
        assert_eq!(user.password_hash, "hash2");
        assert!(!store.update(id + 1, &both).await.unwrap());

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_debug_redacts_password_hash() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.users().create(&alice(), &[]).await.unwrap();
        let user = db.users().get_by_id(id).await.unwrap().unwrap();

        let debug = format!("{user:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("\"hash\""));
    }
}
