use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MySQL `ER_LOCK_DEADLOCK`
pub const MYSQL_LOCK_DEADLOCK: u16 = 1213;

/// Retry behaviour for single statements that hit lock contention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// 总尝试次数（包含第一次执行）
    pub max_attempts: u32,
    pub delay_ms: u64,
    /// Backend error numbers treated as transient
    pub transient_error_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 500,
            transient_error_codes: vec![MYSQL_LOCK_DEADLOCK],
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }
        if self.delay_ms > 60_000 {
            return Err(anyhow::anyhow!("重试间隔不能超过60秒"));
        }
        Ok(())
    }
}

/// Bulk insert sizing for the job-graph builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkInsertConfig {
    pub max_rows_per_statement: usize,
}

impl Default for BulkInsertConfig {
    fn default() -> Self {
        Self {
            max_rows_per_statement: 1000,
        }
    }
}

impl BulkInsertConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rows_per_statement == 0 {
            return Err(anyhow::anyhow!("每条语句的最大行数必须大于0"));
        }
        Ok(())
    }
}
