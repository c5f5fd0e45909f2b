use anyhow::Result;
use batch_core::{BatchError, BulkInsertConfig};
use batch_domain::{
    Filter, JobParent, JobParentColumn, JobParentRepository, JobRepository, JobState, NewJob,
};
use batch_infrastructure::{DatabaseManager, RetryPolicy};

mod database_test_utils;
use database_test_utils::{create_batch, create_graph, setup_sqlite};

/// The same database, with at most `max_rows` rows per insert statement.
fn with_chunk_size(manager: &DatabaseManager, max_rows: usize) -> DatabaseManager {
    DatabaseManager::from_pool(
        manager.pool().clone(),
        manager.database_type(),
        RetryPolicy::default(),
        BulkInsertConfig {
            max_rows_per_statement: max_rows,
        },
    )
}

async fn count(manager: &DatabaseManager, table: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM `{table}`"))
        .fetch_one(manager.pool())
        .await?;
    Ok(row.0)
}

async fn create_trigger(manager: &DatabaseManager, sql: &str) -> Result<()> {
    sqlx::query(sql).execute(manager.pool()).await?;
    Ok(())
}

#[tokio::test]
async fn test_empty_commit_succeeds_without_touching_database() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 0).await?;
    let builder = manager.jobs_builder(batch_id);

    manager.close().await;
    assert!(builder.commit().await?);
    Ok(())
}

#[tokio::test]
async fn test_commit_stores_jobs_and_edges() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 3).await?;

    let mut builder = manager.jobs_builder(batch_id);
    builder.add_job(NewJob::new(batch_id, 1, "t1").with_state(JobState::Ready))?;
    builder.add_job(
        NewJob::new(batch_id, 2, "t2")
            .with_pvc_size("10Gi")
            .with_attributes(serde_json::json!({"name": "train"})),
    )?;
    builder.add_job(NewJob::new(batch_id, 3, "t3").with_tasks(vec!["main".to_string()]))?;
    builder.add_edge(JobParent::new(batch_id, 2, 1))?;
    builder.add_edge(JobParent::new(batch_id, 3, 2))?;
    assert_eq!((builder.pending_jobs(), builder.pending_edges()), (3, 2));

    assert!(builder.commit().await?);
    assert_eq!(count(&manager, "jobs").await?, 3);
    assert_eq!(count(&manager, "jobs-parents").await?, 2);

    let jobs = manager.jobs().get(batch_id, &[1, 2, 3]).await?;
    let job = |id: i64| {
        jobs.iter()
            .find(|view| view.job.job_id == id)
            .map(|view| view.job.clone())
    };
    assert_eq!(job(1).map(|j| j.state), Some(JobState::Ready));
    assert_eq!(job(2).and_then(|j| j.pvc_size).as_deref(), Some("10Gi"));
    assert_eq!(
        job(2).and_then(|j| j.attributes),
        Some(serde_json::json!({"name": "train"}))
    );
    assert_eq!(job(3).map(|j| j.tasks), Some(vec!["main".to_string()]));
    Ok(())
}

#[tokio::test]
async fn test_commit_in_chunks() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 5).await?;
    let chunked = with_chunk_size(&manager, 2);

    let mut builder = chunked.jobs_builder(batch_id);
    for job_id in 1..=5 {
        builder.add_job(NewJob::new(batch_id, job_id, format!("t{job_id}")))?;
    }
    for job_id in 2..=5 {
        builder.add_edge(JobParent::new(batch_id, job_id, 1))?;
    }

    assert!(builder.commit().await?);
    assert_eq!(count(&manager, "jobs").await?, 5);
    assert_eq!(count(&manager, "jobs-parents").await?, 4);
    Ok(())
}

#[tokio::test]
async fn test_dropped_job_row_rolls_back_everything() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 5).await?;
    create_trigger(
        &manager,
        "CREATE TRIGGER `drop_job_3` BEFORE INSERT ON `jobs` WHEN NEW.`job_id` = 3 BEGIN SELECT RAISE(IGNORE); END",
    )
    .await?;

    // job 3 lands in the second statement, after the first has been applied
    let chunked = with_chunk_size(&manager, 2);
    let mut builder = chunked.jobs_builder(batch_id);
    for job_id in 1..=5 {
        builder.add_job(NewJob::new(batch_id, job_id, format!("t{job_id}")))?;
    }
    builder.add_edge(JobParent::new(batch_id, 2, 1))?;

    assert!(!builder.commit().await?);
    assert_eq!(count(&manager, "jobs").await?, 0);
    assert_eq!(count(&manager, "jobs-parents").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_job_mismatch_skips_edge_phase() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;
    create_trigger(
        &manager,
        "CREATE TRIGGER `drop_job_2` BEFORE INSERT ON `jobs` WHEN NEW.`job_id` = 2 BEGIN SELECT RAISE(IGNORE); END",
    )
    .await?;
    // any edge insert fails the commit with an error instead of a clean `false`
    create_trigger(
        &manager,
        "CREATE TRIGGER `reject_edges` BEFORE INSERT ON `jobs-parents` BEGIN SELECT RAISE(ABORT, 'edge insert attempted'); END",
    )
    .await?;

    let mut builder = manager.jobs_builder(batch_id);
    builder.add_job(NewJob::new(batch_id, 1, "t1"))?;
    builder.add_job(NewJob::new(batch_id, 2, "t2"))?;
    builder.add_edge(JobParent::new(batch_id, 2, 1))?;

    assert!(!builder.commit().await?);
    assert_eq!(count(&manager, "jobs").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_dropped_edge_row_rolls_back_jobs() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 3).await?;
    create_trigger(
        &manager,
        "CREATE TRIGGER `drop_edge` BEFORE INSERT ON `jobs-parents` WHEN NEW.`job_id` = 3 BEGIN SELECT RAISE(IGNORE); END",
    )
    .await?;

    let mut builder = manager.jobs_builder(batch_id);
    for job_id in 1..=3 {
        builder.add_job(NewJob::new(batch_id, job_id, format!("t{job_id}")))?;
    }
    builder.add_edge(JobParent::new(batch_id, 2, 1))?;
    builder.add_edge(JobParent::new(batch_id, 3, 1))?;

    assert!(!builder.commit().await?);
    assert_eq!(count(&manager, "jobs").await?, 0);
    assert_eq!(count(&manager, "jobs-parents").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_job_is_an_error() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;

    let mut builder = manager.jobs_builder(batch_id);
    builder.add_job(NewJob::new(batch_id, 1, "a"))?;
    builder.add_job(NewJob::new(batch_id, 1, "b"))?;

    let err = builder.commit().await.unwrap_err();
    let unique_violation = err
        .sqlx_error()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation());
    assert!(unique_violation, "{err:?}");
    assert_eq!(count(&manager, "jobs").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_rows_for_another_batch_are_rejected() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 1).await?;
    let mut builder = manager.jobs_builder(batch_id);

    let err = builder
        .add_job(NewJob::new(batch_id + 1, 1, "t1"))
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidArgument(_)));
    let err = builder
        .add_edge(JobParent::new(batch_id + 1, 2, 1))
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidArgument(_)));
    assert_eq!((builder.pending_jobs(), builder.pending_edges()), (0, 0));
    Ok(())
}

#[tokio::test]
async fn test_close_discards_pending_rows() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 1).await?;

    let mut builder = manager.jobs_builder(batch_id);
    builder.add_job(NewJob::new(batch_id, 1, "t1"))?;
    builder.close();

    assert!(!manager.jobs().exists(batch_id, 1).await?);
    Ok(())
}

#[tokio::test]
async fn test_job_parent_exists_and_delete_where() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 3).await?;
    create_graph(&manager, batch_id, 3, &[(2, 1), (3, 1), (3, 2)]).await?;
    let edges = manager.jobs_parents();

    assert!(edges.exists(batch_id, 3, 2).await?);
    assert!(!edges.exists(batch_id, 2, 3).await?);

    let removed = edges
        .delete_where(
            &Filter::new()
                .eq(JobParentColumn::BatchId, batch_id)
                .eq(JobParentColumn::ParentId, 1),
        )
        .await?;
    assert_eq!(removed, 2);
    assert!(!edges.exists(batch_id, 2, 1).await?);
    assert!(edges.exists(batch_id, 3, 2).await?);
    assert_eq!(count(&manager, "jobs-parents").await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_delete_where_requires_a_condition() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;
    create_graph(&manager, batch_id, 2, &[(2, 1)]).await?;

    let err = manager
        .jobs_parents()
        .delete_where(&Filter::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidArgument(_)));
    assert_eq!(count(&manager, "jobs-parents").await?, 1);
    Ok(())
}
