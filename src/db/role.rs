use sqlx::sqlite::SqlitePool;

/// Role assigned to every newly registered user.
pub const USER_ROLE: &str = "USER";

/// Role allowed to manage every resource.
pub const ADMIN_ROLE: &str = "ADMIN";

#[derive(Clone)]
pub struct RoleStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

impl RoleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a role by its unique name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, description FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<Role>, sqlx::Error> {
        sqlx::query_as("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    /// Assign a role to a user. Assigning twice is a no-op.
    pub async fn assign(&self, user_id: i64, role_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
