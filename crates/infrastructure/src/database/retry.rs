//! 重试执行器
//!
//! Statements that hit the backend's lock-wait/deadlock error are retried after a fixed
//! delay; everything else propagates on the first failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use batch_core::RetryConfig;
use metrics::counter;
use sqlx::mysql::MySqlDatabaseError;
use tracing::warn;

/// SQLSTATE reported for serialization failures and deadlocks.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    transient_error_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, transient_error_codes: Vec<u16>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            transient_error_codes,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.delay(),
            config.transient_error_codes.clone(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// MySQL errors are matched on their numeric code; other backends on SQLSTATE `40001`.
    pub fn is_transient(&self, error: &sqlx::Error) -> bool {
        let sqlx::Error::Database(db_error) = error else {
            return false;
        };
        match db_error.try_downcast_ref::<MySqlDatabaseError>() {
            Some(mysql_error) => self.transient_error_codes.contains(&mysql_error.number()),
            None => db_error.code().as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE),
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the attempt budget
    /// is spent. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T, sqlx::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        self.run_with(label, op, |error| self.is_transient(error)).await
    }

    pub async fn run_with<T, E, F, Fut, C>(
        &self,
        label: &str,
        mut op: F,
        is_transient: C,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && is_transient(&error) => {
                    warn!(
                        statement = label,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %error,
                        "语句遇到瞬时错误，等待后重试"
                    );
                    counter!("batch_db_statement_retries_total", "statement" => label.to_string())
                        .increment(1);
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
