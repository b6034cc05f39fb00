//! Identity service trait definition.

use parley_types::error::IdentityError;
use parley_types::identity::Identity;

/// Verifies bearer credentials.
///
/// An implementation must both validate the credential and confirm that the
/// identity it names still exists; a credential for a deleted user is
/// `IdentityError::UnknownIdentity`.
pub trait IdentityService: Send + Sync {
    fn verify(
        &self,
        credential: &str,
    ) -> impl std::future::Future<Output = Result<Identity, IdentityError>> + Send;
}
