//! SQLite message log implementation.
//!
//! Implements `MessageRepository` from `parley-core`. Rows are append-only;
//! the only writes after insert are administrative deletes.

use parley_core::repository::message::MessageRepository;
use parley_types::error::RepositoryError;
use parley_types::ids::{GroupId, UserId};
use parley_types::message::{Message, MessageKind, MessageQuery, MessageTarget, Page, Visibility};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

const ORDER_AND_PAGE: &str = " ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?";

/// SQLite-backed implementation of `MessageRepository`.
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct MessageRow {
    id: String,
    content: String,
    sender_id: String,
    receiver_id: Option<String>,
    group_id: Option<String>,
    kind: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            group_id: row.try_get("group_id")?,
            kind: row.try_get("kind")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = self
            .id
            .parse::<Uuid>()
            .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
        let kind: MessageKind = self.kind.parse().map_err(RepositoryError::Query)?;

        let target = match kind {
            MessageKind::Private => MessageTarget::Private {
                receiver_id: self.receiver_id.map(UserId::from).ok_or_else(|| {
                    RepositoryError::Query("private message missing receiver_id".into())
                })?,
            },
            MessageKind::Group => MessageTarget::Group {
                group_id: self.group_id.map(GroupId::from).ok_or_else(|| {
                    RepositoryError::Query("group message missing group_id".into())
                })?,
            },
            MessageKind::Public => MessageTarget::Public,
        };

        Ok(Message {
            id,
            content: self.content,
            sender_id: UserId::from(self.sender_id),
            target,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn into_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    let mut msgs = Vec::with_capacity(rows.len());
    for row in rows {
        let r = MessageRow::from_row(row).map_err(query_error)?;
        msgs.push(r.into_message()?);
    }
    Ok(msgs)
}

/// Appends `AND <filters>` for every field set on `query`.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &MessageQuery) {
    match (&query.sender, &query.receiver) {
        (Some(sender), Some(receiver)) => {
            qb.push(" AND ((sender_id = ")
                .push_bind(sender.as_str().to_owned())
                .push(" AND receiver_id = ")
                .push_bind(receiver.as_str().to_owned())
                .push(") OR (sender_id = ")
                .push_bind(receiver.as_str().to_owned())
                .push(" AND receiver_id = ")
                .push_bind(sender.as_str().to_owned())
                .push("))");
        }
        (Some(sender), None) => {
            qb.push(" AND sender_id = ")
                .push_bind(sender.as_str().to_owned());
        }
        (None, Some(receiver)) => {
            qb.push(" AND receiver_id = ")
                .push_bind(receiver.as_str().to_owned());
        }
        (None, None) => {}
    }
    if let Some(group_id) = &query.group_id {
        qb.push(" AND group_id = ")
            .push_bind(group_id.as_str().to_owned());
    }
    if let Some(kind) = query.kind {
        qb.push(" AND kind = ").push_bind(kind.to_string());
    }
    if let Some(since) = &query.since {
        qb.push(" AND created_at >= ")
            .push_bind(format_datetime(since));
    }
    if let Some(until) = &query.until {
        qb.push(" AND created_at <= ")
            .push_bind(format_datetime(until));
    }
}

/// Appends the visibility clause: public, own private, or own groups.
fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &Visibility) {
    let user = scope.user_id.as_str().to_owned();
    qb.push(" AND (kind = 'public' OR (kind = 'private' AND (sender_id = ")
        .push_bind(user.clone())
        .push(" OR receiver_id = ")
        .push_bind(user)
        .push("))");
    if !scope.groups.is_empty() {
        qb.push(" OR (kind = 'group' AND group_id IN (");
        let mut separated = qb.separated(", ");
        for group in &scope.groups {
            separated.push_bind(group.as_str().to_owned());
        }
        separated.push_unseparated("))");
    }
    qb.push(")");
}

impl MessageRepository for SqliteMessageRepository {
    async fn append(&self, msg: &Message) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO messages
               (id, content, sender_id, receiver_id, group_id, kind, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(msg.id.to_string())
        .bind(&msg.content)
        .bind(msg.sender_id.as_str())
        .bind(msg.target.receiver_id().map(UserId::as_str))
        .bind(msg.target.group_id().map(GroupId::as_str))
        .bind(msg.kind().to_string())
        .bind(format_datetime(&msg.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if super::is_unique_violation(&e) {
                RepositoryError::Conflict(format!("message {} already exists", msg.id))
            } else {
                query_error(e)
            }
        })?;

        Ok(())
    }

    async fn private_history(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        let sql = format!(
            r#"SELECT * FROM messages
               WHERE kind = 'private'
                 AND ((sender_id = ? AND receiver_id = ?)
                   OR (sender_id = ? AND receiver_id = ?)){ORDER_AND_PAGE}"#
        );
        let rows = sqlx::query(&sql)
            .bind(user_a.as_str())
            .bind(user_b.as_str())
            .bind(user_b.as_str())
            .bind(user_a.as_str())
            .bind(page.limit as i64)
            .bind(page.skip as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        into_messages(&rows)
    }

    async fn group_history(
        &self,
        group_id: &GroupId,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        let sql = format!("SELECT * FROM messages WHERE kind = 'group' AND group_id = ?{ORDER_AND_PAGE}");
        let rows = sqlx::query(&sql)
            .bind(group_id.as_str())
            .bind(page.limit as i64)
            .bind(page.skip as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        into_messages(&rows)
    }

    async fn public_history(&self, page: Page) -> Result<Vec<Message>, RepositoryError> {
        let sql = format!("SELECT * FROM messages WHERE kind = 'public'{ORDER_AND_PAGE}");
        let rows = sqlx::query(&sql)
            .bind(page.limit as i64)
            .bind(page.skip as i64)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        into_messages(&rows)
    }

    async fn query(
        &self,
        query: &MessageQuery,
        scope: Option<&Visibility>,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT * FROM messages WHERE 1 = 1");
        push_filters(&mut qb, query);
        if let Some(scope) = scope {
            push_scope(&mut qb, scope);
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.skip as i64);

        let rows = qb
            .build()
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        into_messages(&rows)
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_public(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE kind = 'public'")
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    async fn test_repo() -> SqliteMessageRepository {
        let dir = tempfile::tempdir().unwrap();
        let url = super::super::pool::database_url(dir.path());
        std::mem::forget(dir);
        SqliteMessageRepository::new(DatabasePool::new(&url).await.unwrap())
    }

    fn private(from: &str, to: &str, content: &str) -> Message {
        Message::new(
            UserId::new(from),
            MessageTarget::Private {
                receiver_id: UserId::new(to),
            },
            content,
        )
    }

    fn group(from: &str, group_id: &str, content: &str) -> Message {
        Message::new(
            UserId::new(from),
            MessageTarget::Group {
                group_id: GroupId::new(group_id),
            },
            content,
        )
    }

    fn public(from: &str, content: &str) -> Message {
        Message::new(UserId::new(from), MessageTarget::Public, content)
    }

    fn page(limit: u32) -> Page {
        Page::new(limit, 0)
    }

    #[tokio::test]
    async fn test_append_and_read_back_private() {
        let repo = test_repo().await;
        let msg = private("alice", "bob", "hello bob");
        repo.append(&msg).await.unwrap();

        let history = repo
            .private_history(&UserId::new("bob"), &UserId::new("alice"), page(50))
            .await
            .unwrap();
        assert_eq!(history, vec![msg]);
    }

    #[tokio::test]
    async fn test_duplicate_append_conflicts() {
        let repo = test_repo().await;
        let msg = public("alice", "once");
        repo.append(&msg).await.unwrap();
        let err = repo.append(&msg).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_private_history_both_directions_newest_first() {
        let repo = test_repo().await;
        let m1 = private("alice", "bob", "1");
        let m2 = private("bob", "alice", "2");
        let other = private("alice", "carol", "3");
        for m in [&m1, &m2, &other] {
            repo.append(m).await.unwrap();
        }

        let history = repo
            .private_history(&UserId::new("alice"), &UserId::new("bob"), page(50))
            .await
            .unwrap();
        let ids: Vec<_> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, [m2.id, m1.id]);
    }

    #[tokio::test]
    async fn test_group_and_public_history_are_separate() {
        let repo = test_repo().await;
        repo.append(&group("alice", "g1", "in g1")).await.unwrap();
        repo.append(&group("alice", "g2", "in g2")).await.unwrap();
        repo.append(&public("alice", "everyone")).await.unwrap();

        let g1 = repo.group_history(&GroupId::new("g1"), page(50)).await.unwrap();
        assert_eq!(g1.len(), 1);
        assert_eq!(g1[0].content, "in g1");
        assert_eq!(g1[0].target.group_id(), Some(&GroupId::new("g1")));

        let all = repo.public_history(page(50)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind(), MessageKind::Public);
    }

    #[tokio::test]
    async fn test_history_paging() {
        let repo = test_repo().await;
        let mut sent = Vec::new();
        for i in 0..5 {
            let m = public("alice", &format!("m{i}"));
            repo.append(&m).await.unwrap();
            sent.push(m);
        }

        let second_page = repo.public_history(Page::new(2, 2)).await.unwrap();
        let ids: Vec<_> = second_page.iter().map(|m| m.id).collect();
        assert_eq!(ids, [sent[2].id, sent[1].id]);
    }

    #[tokio::test]
    async fn test_query_filters_by_kind_and_time() {
        let repo = test_repo().await;
        let mut old = public("alice", "old");
        old.created_at = Utc::now() - Duration::days(2);
        let fresh = public("alice", "fresh");
        repo.append(&old).await.unwrap();
        repo.append(&fresh).await.unwrap();
        repo.append(&group("alice", "g1", "grp")).await.unwrap();

        let query = MessageQuery {
            kind: Some(MessageKind::Public),
            since: Some(Utc::now() - Duration::days(1)),
            ..Default::default()
        };
        let hits = repo.query(&query, None, page(50)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "fresh");
    }

    #[tokio::test]
    async fn test_query_scope_limits_visibility() {
        let repo = test_repo().await;
        repo.append(&private("alice", "bob", "for bob")).await.unwrap();
        repo.append(&private("alice", "carol", "for carol")).await.unwrap();
        repo.append(&group("alice", "g1", "g1 chat")).await.unwrap();
        repo.append(&group("alice", "g2", "g2 chat")).await.unwrap();
        repo.append(&public("alice", "hi all")).await.unwrap();

        let scope = Visibility {
            user_id: UserId::new("carol"),
            groups: vec![GroupId::new("g2")],
        };
        let query = MessageQuery {
            sender: Some(UserId::new("alice")),
            ..Default::default()
        };
        let hits = repo.query(&query, Some(&scope), page(50)).await.unwrap();
        let mut contents: Vec<_> = hits.iter().map(|m| m.content.as_str()).collect();
        contents.sort();
        assert_eq!(contents, ["for carol", "g2 chat", "hi all"]);

        let no_groups = Visibility {
            user_id: UserId::new("dave"),
            groups: vec![],
        };
        let hits = repo.query(&query, Some(&no_groups), page(50)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_query_pair_matches_both_directions() {
        let repo = test_repo().await;
        repo.append(&private("alice", "bob", "a->b")).await.unwrap();
        repo.append(&private("bob", "alice", "b->a")).await.unwrap();
        repo.append(&private("bob", "carol", "b->c")).await.unwrap();

        let query = MessageQuery {
            sender: Some(UserId::new("alice")),
            receiver: Some(UserId::new("bob")),
            ..Default::default()
        };
        let hits = repo.query(&query, None, page(50)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_delete_public() {
        let repo = test_repo().await;
        let keep = private("alice", "bob", "keep");
        let gone = public("alice", "gone");
        repo.append(&keep).await.unwrap();
        repo.append(&gone).await.unwrap();
        repo.append(&public("bob", "also gone")).await.unwrap();

        assert!(repo.delete(&keep.id).await.unwrap());
        assert!(!repo.delete(&keep.id).await.unwrap());
        assert_eq!(repo.delete_public().await.unwrap(), 2);
        assert!(repo.public_history(page(50)).await.unwrap().is_empty());
    }
}
