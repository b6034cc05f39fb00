//! Group directory backed by `groups` and `group_members`.

use chrono::Utc;
use parley_core::repository::group::GroupDirectory;
use parley_types::error::RepositoryError;
use parley_types::group::{GroupRecord, GroupSummary};
use parley_types::ids::{GroupId, UserId};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

pub struct SqliteGroupDirectory {
    pool: DatabasePool,
}

impl SqliteGroupDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn create_group(&self, name: &str) -> Result<GroupRecord, RepositoryError> {
        let record = GroupRecord {
            id: GroupId::new(Uuid::now_v7().to_string()),
            name: name.to_string(),
            member_count: 0,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO groups (id, name, created_at) VALUES (?, ?, ?)")
            .bind(record.id.as_str())
            .bind(&record.name)
            .bind(format_datetime(&record.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(record)
    }

    /// Add a member (idempotent). `NotFound` if the group or user does not
    /// exist.
    pub async fn add_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(group_id.as_str())
            .bind(user_id.as_str())
            .execute(&self.pool.writer)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(query_error(e)),
        }
    }

    /// Returns `true` if the membership existed.
    pub async fn remove_member(
        &self,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id.as_str())
            .bind(user_id.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT g.id, g.name, g.created_at, COUNT(m.user_id) AS member_count
               FROM groups g
               LEFT JOIN group_members m ON m.group_id = g.id
               GROUP BY g.id
               ORDER BY g.name ASC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(query_error)?;
            let name: String = row.try_get("name").map_err(query_error)?;
            let created_at: String = row.try_get("created_at").map_err(query_error)?;
            let member_count: i64 = row.try_get("member_count").map_err(query_error)?;
            groups.push(GroupRecord {
                id: GroupId::from(id),
                name,
                member_count: member_count as u32,
                created_at: parse_datetime(&created_at)?,
            });
        }
        Ok(groups)
    }
}

impl GroupDirectory for SqliteGroupDirectory {
    async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT g.id, g.name FROM groups g
               JOIN group_members m ON m.group_id = g.id
               WHERE m.user_id = ?
               ORDER BY g.name ASC"#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(query_error)?;
            let name: String = row.try_get("name").map_err(query_error)?;
            groups.push(GroupSummary {
                id: GroupId::from(id),
                name,
            });
        }
        Ok(groups)
    }
}
