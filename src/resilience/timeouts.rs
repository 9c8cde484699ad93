//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap each transport attempt with the caller-supplied deadline
//! - Abandon the in-flight call on expiry; a late response is dropped with it
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::error::CallError;

/// Run `attempt` with a deadline, classifying expiry as `CallError::Timeout`.
pub async fn with_deadline<T, F>(deadline: Duration, attempt: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    match tokio::time::timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout { after: deadline }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let result: Result<(), CallError> = with_deadline(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(CallError::Timeout { after: Duration::from_millis(100) }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_attempt_passes_through() {
        let result = with_deadline(Duration::from_secs(1), async {
            Err::<(), _>(CallError::Remote { status: 500 })
        })
        .await;
        assert_eq!(result, Err(CallError::Remote { status: 500 }));
    }
}
