use anyhow::Result;
use batch_core::BatchError;
use batch_domain::{
    Assignments, BatchColumn, BatchRepository, BatchViewField, Filter, JobColumn, JobField,
    JobKey, JobParent, JobRepository, JobState, NewJob, Stage, StageOutcome,
};

mod database_test_utils;
use database_test_utils::{create_batch, create_graph, setup_sqlite};

fn job_ids(jobs: &[batch_domain::JobView]) -> Vec<i64> {
    let mut ids: Vec<_> = jobs.iter().map(|view| view.job.job_id).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_get_jobs_carries_batch_attributes() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 3).await?;
    create_graph(&manager, batch_id, 3, &[]).await?;

    let jobs = manager.jobs().get(batch_id, &[1, 3]).await?;
    assert_eq!(job_ids(&jobs), vec![1, 3]);
    for view in &jobs {
        assert_eq!(view.user, "alice");
        assert_eq!(view.userdata.as_deref(), Some("alice-data"));
        assert!(!view.cancelled);
        assert_eq!(view.job.state, JobState::Pending);
        assert_eq!(view.job.tasks, vec!["input", "main", "output"]);
        assert_eq!(view.job.token, format!("token-{}", view.job.job_id));
        assert_eq!(view.job.input.log_uri, None);
    }

    assert_eq!(job_ids(&manager.jobs().get_by_batch(batch_id).await?), vec![1, 2, 3]);
    assert!(manager.jobs().get(batch_id, &[]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_fields_mixes_job_and_batch_columns() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "bob", 1).await?;
    create_graph(&manager, batch_id, 1, &[]).await?;

    let records = manager
        .jobs()
        .get_fields(
            batch_id,
            &[1],
            &[
                JobField::Job(JobColumn::State),
                JobField::BatchView(BatchViewField::User),
            ],
        )
        .await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 2);
    assert_eq!(records[0].string("state")?, "Pending");
    assert_eq!(records[0].string("user")?, "bob");

    let err = manager
        .jobs()
        .get_fields(batch_id, &[1], &[])
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::InvalidArgument(_)));
    Ok(())
}

#[tokio::test]
async fn test_get_where_and_get_all_span_batches() -> Result<()> {
    let manager = setup_sqlite().await?;
    let first = create_batch(&manager, "alice", 2).await?;
    let second = create_batch(&manager, "bob", 1).await?;
    create_graph(&manager, first, 2, &[]).await?;
    create_graph(&manager, second, 1, &[]).await?;

    assert_eq!(manager.jobs().get_all().await?.len(), 3);

    let ones = manager
        .jobs()
        .get_where(&Filter::new().eq(JobColumn::JobId, 1))
        .await?;
    let mut owners: Vec<_> = ones.iter().map(|view| view.user.clone()).collect();
    owners.sort();
    assert_eq!(owners, vec!["alice", "bob"]);
    Ok(())
}

#[tokio::test]
async fn test_conditional_job_update() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 1).await?;
    create_graph(&manager, batch_id, 1, &[]).await?;
    let jobs = manager.jobs();

    let from_ready = Filter::new().eq(JobColumn::State, JobState::Ready);
    let to_running = Assignments::new().set(JobColumn::State, JobState::Running);
    assert_eq!(jobs.update(batch_id, 1, &from_ready, &to_running).await?, 0);

    let from_pending = Filter::new().eq(JobColumn::State, JobState::Pending);
    let to_ready = Assignments::new()
        .set(JobColumn::State, JobState::Ready)
        .set(JobColumn::TaskIdx, 1);
    assert_eq!(jobs.update(batch_id, 1, &from_pending, &to_ready).await?, 1);
    assert_eq!(jobs.update(batch_id, 1, &from_ready, &to_running).await?, 1);

    let job = &jobs.get(batch_id, &[1]).await?[0].job;
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.task_idx, 1);

    assert_eq!(
        jobs.update(batch_id, 1, &Filter::new(), &Assignments::new())
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_incomplete_parents_follow_parent_state() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;
    create_graph(&manager, batch_id, 2, &[(2, 1)]).await?;
    let jobs = manager.jobs();

    jobs.update(
        batch_id,
        1,
        &Filter::new(),
        &Assignments::new().set(JobColumn::State, JobState::Running),
    )
    .await?;
    assert_eq!(
        jobs.get_incomplete_parents(batch_id, 2).await?,
        vec![JobKey {
            batch_id,
            job_id: 1
        }]
    );
    assert!(jobs.get_incomplete_parents(batch_id, 1).await?.is_empty());

    jobs.update(
        batch_id,
        1,
        &Filter::new(),
        &Assignments::new().set(JobColumn::State, JobState::Success),
    )
    .await?;
    assert!(jobs.get_incomplete_parents(batch_id, 2).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_parents_and_children() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 4).await?;
    // 1 -> {2, 3} -> 4
    create_graph(&manager, batch_id, 4, &[(2, 1), (3, 1), (4, 2), (4, 3)]).await?;
    let jobs = manager.jobs();

    assert_eq!(job_ids(&jobs.get_parents(batch_id, 4).await?), vec![2, 3]);
    assert!(jobs.get_parents(batch_id, 1).await?.is_empty());
    assert_eq!(job_ids(&jobs.get_children(batch_id, 1).await?), vec![2, 3]);
    assert!(jobs.get_children(batch_id, 4).await?.is_empty());

    let parents = jobs.get_parents(batch_id, 2).await?;
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].user, "alice");
    Ok(())
}

#[tokio::test]
async fn test_stage_outcome_is_recorded() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 1).await?;
    create_graph(&manager, batch_id, 1, &[]).await?;
    let jobs = manager.jobs();

    let outcome = StageOutcome {
        log_uri: Some("gs://logs/1/main.log".to_string()),
        exit_code: Some(0),
        pod_status: Some("Succeeded".to_string()),
    };
    let compare = Filter::new().eq(JobColumn::State, JobState::Pending);
    let extra = Assignments::new()
        .set(JobColumn::State, JobState::Success)
        .set(JobColumn::log_uri(Stage::Main), "overridden");

    let affected = jobs
        .update_with_log_and_exit_code(batch_id, 1, Stage::Main, &outcome, &compare, &extra)
        .await?;
    assert_eq!(affected, 1);

    assert_eq!(
        jobs.get_log_uri(batch_id, 1, Stage::Main).await?.as_deref(),
        Some("gs://logs/1/main.log")
    );
    assert_eq!(
        jobs.get_pod_status(batch_id, 1, Stage::Main).await?.as_deref(),
        Some("Succeeded")
    );
    assert_eq!(jobs.get_log_uri(batch_id, 1, Stage::Input).await?, None);
    assert_eq!(jobs.get_log_uri(batch_id, 99, Stage::Main).await?, None);

    let job = &jobs.get(batch_id, &[1]).await?[0].job;
    assert_eq!(job.state, JobState::Success);
    assert_eq!(job.stage(Stage::Main).exit_code, Some(0));

    // the compare no longer matches
    let again = jobs
        .update_with_log_and_exit_code(batch_id, 1, Stage::Output, &outcome, &compare, &Assignments::new())
        .await?;
    assert_eq!(again, 0);
    assert_eq!(jobs.get_log_uri(batch_id, 1, Stage::Output).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_get_undeleted_checks_batch_owner() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;
    create_graph(&manager, batch_id, 2, &[]).await?;
    let jobs = manager.jobs();

    assert_eq!(
        job_ids(&jobs.get_undeleted(batch_id, &[1, 2], "alice").await?),
        vec![1, 2]
    );
    assert!(jobs.get_undeleted(batch_id, &[1, 2], "mallory").await?.is_empty());

    manager
        .batches()
        .update(
            batch_id,
            &Filter::new(),
            &Assignments::new().set(BatchColumn::Deleted, true),
        )
        .await?;
    assert!(jobs.get_undeleted(batch_id, &[1, 2], "alice").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_job_exists_and_delete() -> Result<()> {
    let manager = setup_sqlite().await?;
    let batch_id = create_batch(&manager, "alice", 2).await?;
    let mut builder = manager.jobs_builder(batch_id);
    builder.add_job(NewJob::new(batch_id, 1, "a").with_always_run(true))?;
    builder.add_job(NewJob::new(batch_id, 2, "b"))?;
    builder.add_edge(JobParent::new(batch_id, 2, 1))?;
    assert!(builder.commit().await?);
    let jobs = manager.jobs();

    assert!(jobs.exists(batch_id, 1).await?);
    assert!(jobs.get(batch_id, &[1]).await?[0].job.always_run);

    jobs.delete(batch_id, 1).await?;
    assert!(!jobs.exists(batch_id, 1).await?);
    assert!(jobs.exists(batch_id, 2).await?);
    // 依赖边随父作业级联删除
    assert!(jobs.get_parents(batch_id, 2).await?.is_empty());
    Ok(())
}
