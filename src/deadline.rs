//! Request-scoped deadline applied to every database round trip.

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Deadline {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Await a database future, failing with [`AppError::Timeout`] once the deadline passes.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(res) => res.map_err(AppError::from),
            Err(_) => Err(AppError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_deadline_times_out() {
        let deadline = Deadline::after(Duration::from_millis(0));
        let res = deadline
            .run(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, sqlx::Error>(1)
            })
            .await;
        assert!(matches!(res, Err(AppError::Timeout)));
    }

    #[tokio::test]
    async fn passes_through_results_within_budget() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert_eq!(deadline.run(async { Ok::<_, sqlx::Error>(7) }).await.unwrap(), 7);
        let err = deadline
            .run(async { Err::<i32, _>(sqlx::Error::RowNotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Db(sqlx::Error::RowNotFound)));
        assert!(deadline.remaining() > Duration::ZERO);
    }
}
