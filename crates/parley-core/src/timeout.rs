//! Deadline for collaborator calls.

use std::future::Future;
use std::time::Duration;

use parley_types::error::GatewayError;

/// Run `fut` with an upper bound of `limit`.
///
/// Elapsing the deadline yields `GatewayError::Timeout` naming `what`; the
/// inner future is dropped.
pub async fn within<F>(limit: Duration, what: &str, fut: F) -> Result<F::Output, GatewayError>
where
    F: Future,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| GatewayError::Timeout(format!("{what} after {}ms", limit.as_millis())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let out = within(Duration::from_millis(100), "noop", async { 7 }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_a_timeout() {
        let slow = tokio::time::sleep(Duration::from_secs(10));
        let err = within(Duration::from_millis(50), "group lookup", slow)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Timeout("group lookup after 50ms".to_string())
        );
    }
}
