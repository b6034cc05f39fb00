//! User directory backed by the `users` table.

use chrono::Utc;
use parley_types::error::RepositoryError;
use parley_types::identity::UserRecord;
use parley_types::ids::UserId;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, is_unique_violation, parse_datetime, query_error};

pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Create a user with a fresh id. `Conflict` if the username is taken.
    pub async fn create_user(&self, username: &str) -> Result<UserRecord, RepositoryError> {
        let record = UserRecord {
            id: UserId::new(Uuid::now_v7().to_string()),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)")
            .bind(record.id.as_str())
            .bind(&record.username)
            .bind(format_datetime(&record.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Conflict(format!("user '{username}' already exists"))
                } else {
                    query_error(e)
                }
            })?;
        Ok(record)
    }

    pub async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY username ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(user_from_row).collect()
    }
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_error)?;
    let username: String = row.try_get("username").map_err(query_error)?;
    let created_at: String = row.try_get("created_at").map_err(query_error)?;
    Ok(UserRecord {
        id: UserId::from(id),
        username,
        created_at: parse_datetime(&created_at)?,
    })
}
