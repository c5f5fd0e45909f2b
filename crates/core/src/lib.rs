pub mod config;
pub mod errors;
pub mod logging;

pub use config::models::{AppConfig, BulkInsertConfig, DatabaseConfig, LoggingConfig, RetryConfig};
pub use errors::*;

/// 统一的Result类型
pub type BatchResult<T> = std::result::Result<T, BatchError>;
