#![allow(dead_code)]

use std::sync::Once;

use anyhow::Result;
use batch_core::{AppConfig, DatabaseConfig};
use batch_domain::{BatchRepository, JobParent, NewBatch, NewJob};
use batch_infrastructure::DatabaseManager;

static INIT: Once = Once::new();

/// 初始化测试环境的日志记录
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory SQLite database with the schema applied.
///
/// The pool is pinned to one connection: every SQLite `:memory:` connection is its own database.
pub async fn setup_sqlite() -> Result<DatabaseManager> {
    init_test_logging();

    let config = AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connection_timeout_seconds: 5,
            idle_timeout_seconds: 600,
        },
        ..AppConfig::default()
    };

    let manager = DatabaseManager::new(&config).await?;
    manager.migrate().await?;
    Ok(manager)
}

pub async fn create_batch(manager: &DatabaseManager, user: &str, n_jobs: i64) -> Result<i64> {
    Ok(manager
        .batches()
        .create(&NewBatch::new(user, n_jobs).with_userdata(format!("{user}-data")))
        .await?)
}

/// Jobs `1..=n_jobs` of `batch_id`, committed with the given edges `(child, parent)`.
pub async fn create_graph(
    manager: &DatabaseManager,
    batch_id: i64,
    n_jobs: i64,
    edges: &[(i64, i64)],
) -> Result<()> {
    let mut builder = manager.jobs_builder(batch_id);
    for job_id in 1..=n_jobs {
        builder.add_job(NewJob::new(batch_id, job_id, format!("token-{job_id}")))?;
    }
    for &(job_id, parent_id) in edges {
        builder.add_edge(JobParent::new(batch_id, job_id, parent_id))?;
    }
    assert!(builder.commit().await?);
    Ok(())
}
