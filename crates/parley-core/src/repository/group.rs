//! Group directory trait definition.

use parley_types::error::RepositoryError;
use parley_types::group::GroupSummary;
use parley_types::ids::UserId;

/// Resolves a user to the groups they currently belong to.
pub trait GroupDirectory: Send + Sync {
    fn groups_for(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<GroupSummary>, RepositoryError>> + Send;
}
