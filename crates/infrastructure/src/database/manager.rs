use std::sync::Arc;
use std::time::Duration;

use batch_core::{AppConfig, BatchError, BatchResult, BulkInsertConfig, DatabaseConfig};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::{debug, info};

use super::batch_table::BatchTable;
use super::executor::StatementExecutor;
use super::job_graph::JobsBuilder;
use super::job_parent_table::JobParentTable;
use super::job_table::JobTable;
use super::mapping::Statement;
use super::retry::RetryPolicy;
use super::schema;
use crate::error_handling::RepositoryOperation;
use crate::table_context;

/// Backend selected by the connection URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    MySql,
    Sqlite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> BatchResult<Self> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(DatabaseType::MySql)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseType::Sqlite)
        } else {
            Err(BatchError::config_error(format!("不支持的数据库URL: {url}")))
        }
    }
}

/// 数据库管理器
///
/// Owns the pool and hands out the tables and job-graph builders that share it.
#[derive(Debug, Clone)]
pub struct DatabaseManager {
    executor: StatementExecutor,
    database_type: DatabaseType,
    bulk_insert: BulkInsertConfig,
}

impl DatabaseManager {
    /// Connect using the pool and retry settings from `config`.
    pub async fn new(config: &AppConfig) -> BatchResult<Self> {
        let database_type = DatabaseType::from_url(&config.database.url)?;
        let pool = Self::connect(&config.database).await?;
        info!(database_type = ?database_type, "数据库连接池已建立");

        Ok(Self::from_pool(
            pool,
            database_type,
            RetryPolicy::from_config(&config.retry),
            config.bulk_insert.clone(),
        ))
    }

    pub fn from_pool(
        pool: AnyPool,
        database_type: DatabaseType,
        retry: RetryPolicy,
        bulk_insert: BulkInsertConfig,
    ) -> Self {
        Self {
            executor: StatementExecutor::new(pool, Arc::new(retry)),
            database_type,
            bulk_insert,
        }
    }

    async fn connect(config: &DatabaseConfig) -> BatchResult<AnyPool> {
        sqlx::any::install_default_drivers();
        debug!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "创建数据库连接池"
        );

        AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| BatchError::query_error("连接数据库失败", e))
    }

    pub fn pool(&self) -> &AnyPool {
        self.executor.pool()
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub async fn health_check(&self) -> BatchResult<()> {
        let context = table_context!(RepositoryOperation::Execute, "health");
        self.executor
            .fetch_count(&Statement::new("SELECT 1", Vec::new()), &context)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool().close().await;
        info!("数据库连接池已关闭");
    }

    pub async fn migrate(&self) -> BatchResult<()> {
        schema::migrate(&self.executor, &self.database_type).await
    }

    pub fn batches(&self) -> BatchTable {
        BatchTable::new(self.executor.clone())
    }

    pub fn jobs(&self) -> JobTable {
        JobTable::new(self.executor.clone())
    }

    pub fn jobs_parents(&self) -> JobParentTable {
        JobParentTable::new(self.executor.clone())
    }

    pub fn jobs_builder(&self, batch_id: i64) -> JobsBuilder {
        JobsBuilder::new(
            self.executor.clone(),
            batch_id,
            self.bulk_insert.max_rows_per_statement,
        )
    }
}
