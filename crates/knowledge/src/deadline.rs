//! Bounded waits for external calls.

use mira_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Await `fut`, failing with `AppError::Timeout` once `limit` elapses.
pub async fn with_deadline<T, F>(stage: &str, limit: Duration, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(stage, ?limit, "Deadline exceeded");
            Err(AppError::Timeout(format!("{} after {:?}", stage, limit)))
        }
    }
}
