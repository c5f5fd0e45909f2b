//! 数据库表结构
//!
//! Both backends share one DDL text; only the autoincrement column differs. Flags are stored as
//! `BIGINT` 0/1: the `Any` driver maps neither SQLite `BOOLEAN` nor MySQL `TINYINT(1)`.

use batch_domain::BatchResult;
use tracing::{debug, info};

use super::executor::StatementExecutor;
use super::manager::DatabaseType;
use super::mapping::Statement;
use crate::error_handling::RepositoryOperation;
use crate::table_context;

pub const BATCH_TABLE: &str = "batch";
pub const JOBS_TABLE: &str = "jobs";
pub const JOBS_PARENTS_TABLE: &str = "jobs-parents";

fn id_column(database_type: &DatabaseType) -> &'static str {
    match database_type {
        DatabaseType::MySql => "`id` BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
        DatabaseType::Sqlite => "`id` INTEGER PRIMARY KEY AUTOINCREMENT",
    }
}

/// DDL statements in dependency order.
pub fn schema_statements(database_type: &DatabaseType) -> Vec<String> {
    let mut statements = vec![
        format!(
            r#"CREATE TABLE IF NOT EXISTS `batch` (
                {},
                `user` VARCHAR(100) NOT NULL,
                `userdata` TEXT,
                `state` VARCHAR(40) NOT NULL DEFAULT 'Running',
                `attributes` TEXT,
                `callback` TEXT,
                `cancelled` BIGINT NOT NULL DEFAULT 0,
                `deleted` BIGINT NOT NULL DEFAULT 0,
                `n_jobs` BIGINT NOT NULL DEFAULT 0,
                `n_completed` BIGINT NOT NULL DEFAULT 0
            )"#,
            id_column(database_type)
        ),
        r#"CREATE TABLE IF NOT EXISTS `jobs` (
                `batch_id` BIGINT NOT NULL,
                `job_id` BIGINT NOT NULL,
                `state` VARCHAR(40) NOT NULL DEFAULT 'Pending',
                `pvc_size` VARCHAR(100),
                `callback` TEXT,
                `attributes` TEXT,
                `tasks` TEXT NOT NULL,
                `task_idx` BIGINT NOT NULL DEFAULT 0,
                `always_run` BIGINT NOT NULL DEFAULT 0,
                `duration` BIGINT,
                `token` VARCHAR(100) NOT NULL,
                `input_log_uri` TEXT,
                `main_log_uri` TEXT,
                `output_log_uri` TEXT,
                `input_exit_code` BIGINT,
                `main_exit_code` BIGINT,
                `output_exit_code` BIGINT,
                `input_pod_status` TEXT,
                `main_pod_status` TEXT,
                `output_pod_status` TEXT,
                PRIMARY KEY (`batch_id`, `job_id`),
                FOREIGN KEY (`batch_id`) REFERENCES `batch` (`id`) ON DELETE CASCADE
            )"#
        .to_string(),
        r#"CREATE TABLE IF NOT EXISTS `jobs-parents` (
                `batch_id` BIGINT NOT NULL,
                `job_id` BIGINT NOT NULL,
                `parent_id` BIGINT NOT NULL,
                PRIMARY KEY (`batch_id`, `job_id`, `parent_id`),
                FOREIGN KEY (`batch_id`, `job_id`) REFERENCES `jobs` (`batch_id`, `job_id`) ON DELETE CASCADE,
                FOREIGN KEY (`batch_id`, `parent_id`) REFERENCES `jobs` (`batch_id`, `job_id`) ON DELETE CASCADE
            )"#
        .to_string(),
    ];

    // MySQL 会为外键自动建立索引
    if *database_type == DatabaseType::Sqlite {
        statements.extend([
            "CREATE INDEX IF NOT EXISTS `jobs_state` ON `jobs` (`state`)".to_string(),
            "CREATE INDEX IF NOT EXISTS `jobs_parents_parent` ON `jobs-parents` (`batch_id`, `parent_id`)"
                .to_string(),
        ]);
    }

    statements
}

/// 运行数据库迁移
pub async fn migrate(executor: &StatementExecutor, database_type: &DatabaseType) -> BatchResult<()> {
    debug!(database_type = ?database_type, "Running database migrations");

    for sql in schema_statements(database_type) {
        let context = table_context!(RepositoryOperation::Migrate, "schema");
        executor
            .execute(&Statement::new(sql, Vec::new()), &context)
            .await?;
    }

    info!(database_type = ?database_type, "数据库迁移完成");
    Ok(())
}
