pub mod app_config;
pub mod database;
pub mod logging;
pub mod retry;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use database::{DatabaseConfig, DatabaseCredentials};
pub use logging::LoggingConfig;
pub use retry::{BulkInsertConfig, RetryConfig};
