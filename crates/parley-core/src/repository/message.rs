//! Message log trait definition.

use parley_types::error::RepositoryError;
use parley_types::ids::{GroupId, UserId};
use parley_types::message::{Message, MessageQuery, Page, Visibility};
use uuid::Uuid;

/// Append-only persistence for chat messages with filtered, paginated reads.
///
/// Every read returns messages most recent first (`created_at DESC`, then
/// `id DESC`).
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait MessageRepository: Send + Sync {
    /// Persist a message. Messages are never updated afterwards.
    fn append(
        &self,
        msg: &Message,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Private messages exchanged between two users, in either direction.
    fn private_history(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    fn group_history(
        &self,
        group_id: &GroupId,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    fn public_history(
        &self,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Filtered search. `query.limit`/`query.skip` are ignored in favour of
    /// `page`, which the caller has already clamped. With a `scope`, only
    /// messages visible to that user are returned.
    fn query(
        &self,
        query: &MessageQuery,
        scope: Option<&Visibility>,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Delete one message. Returns `true` if it existed.
    fn delete(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every public message. Returns the number removed.
    fn delete_public(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
