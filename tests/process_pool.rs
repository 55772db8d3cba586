// tests/process_pool.rs

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use watchpool::config::PoolConfig;
use watchpool::dispatch::{DispatchError, DispatchResult, JobSubmitter};
use watchpool::pool::{
    Payload, PoolError, PoolProvider, ProcessPool, ProcessPoolProvider, WorkerPool, WorkerStatus,
    MODE_FILE_WATCH, MODE_TAG,
};

fn pool_config(command: &str, workers: usize) -> PoolConfig {
    let mut cfg = PoolConfig {
        command: command.to_string(),
        num_workers: workers,
        ..PoolConfig::default()
    };
    cfg.init_defaults();
    cfg
}

fn tags() -> BTreeMap<String, String> {
    BTreeMap::from([(MODE_TAG.to_string(), MODE_FILE_WATCH.to_string())])
}

#[tokio::test]
async fn worker_echoes_stdin_back() {
    init_tracing();
    let pool = ProcessPool::new(pool_config("cat", 1), tags()).unwrap();

    let mut rx = with_timeout(pool.exec(Payload::raw("ping"))).await.unwrap();
    let response = rx.try_recv().unwrap();

    assert_eq!(response.body, b"ping");
    let workers = pool.workers();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].status, WorkerStatus::Ready);
    assert_eq!(workers[0].num_execs, 1);
    // No live process, so nothing to measure.
    assert_eq!(workers[0].pid, 0);
    assert_eq!(workers[0].memory_usage, 0);
}

#[tokio::test]
async fn silent_worker_is_an_ack() {
    let pool = ProcessPool::new(pool_config("cat > /dev/null", 1), tags()).unwrap();

    let result = JobSubmitter::default().submit(&pool, Payload::raw("data")).await;

    assert!(matches!(result, DispatchResult::Ok(None)));
}

#[tokio::test]
async fn non_zero_exit_is_a_failed_job() {
    let pool = ProcessPool::new(pool_config("echo broken >&2; exit 3", 1), tags()).unwrap();

    let err = pool.exec(Payload::raw("x")).await.unwrap_err();

    match err {
        PoolError::WorkerFailed { code, stderr } => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "broken");
        }
        other => panic!("expected WorkerFailed, got {other:?}"),
    }
    // The slot is free again.
    assert_eq!(pool.workers()[0].status, WorkerStatus::Ready);
}

#[tokio::test]
async fn mode_tag_and_env_reach_the_worker() {
    let mut cfg = pool_config("printf '%s:%s' \"$RR_MODE\" \"$APP_ENV\"", 1);
    cfg.env.insert("APP_ENV".to_string(), "test".to_string());
    let pool = ProcessPool::new(cfg, tags()).unwrap();

    let mut rx = pool.exec(Payload::raw("")).await.unwrap();

    assert_eq!(rx.try_recv().unwrap().body, b"file_watch:test");
}

#[tokio::test]
async fn deadline_frees_the_slot() {
    let pool = ProcessPool::new(pool_config("sleep 5", 1), tags()).unwrap();
    let submitter = JobSubmitter::new(Duration::from_millis(100));

    let result = with_timeout(submitter.submit(&pool, Payload::raw("x"))).await;
    assert!(matches!(result, DispatchResult::Err(DispatchError::Timeout(_))));

    // The abandoned process was killed and its slot released.
    assert_eq!(pool.workers()[0].status, WorkerStatus::Ready);
}

#[tokio::test]
async fn busy_pool_times_out_on_allocation() {
    let mut cfg = pool_config("sleep 1", 1);
    cfg.allocate_timeout = Some(Duration::from_millis(50));
    let pool = Arc::new(ProcessPool::new(cfg, tags()).unwrap());

    let busy = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.exec(Payload::raw("")).await.is_ok() }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = pool.exec(Payload::raw("")).await.unwrap_err();
    assert!(matches!(err, PoolError::NoFreeWorkers(d) if d == Duration::from_millis(50)));

    assert!(with_timeout(busy).await.unwrap());
}

#[tokio::test]
async fn reset_kills_running_jobs() {
    let pool = Arc::new(ProcessPool::new(pool_config("sleep 5", 2), tags()).unwrap());

    let job = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.exec(Payload::raw("")).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let busy = pool
        .workers()
        .into_iter()
        .find(|w| w.status == WorkerStatus::Working && w.pid != 0)
        .expect("a working slot with a live pid");
    assert!(busy.memory_usage > 0, "no memory reading for pid {}", busy.pid);

    pool.reset().await.unwrap();

    let result = with_timeout(job).await.unwrap();
    assert!(matches!(result, Err(PoolError::Closed)));
    assert_eq!(pool.generation(), 1);
    assert!(pool.workers().iter().all(|w| w.status == WorkerStatus::Ready));
}

#[tokio::test]
async fn empty_command_is_rejected_by_the_provider() {
    let provider = ProcessPoolProvider;

    let result = provider.new_pool(PoolConfig::default(), tags()).await;

    assert!(matches!(result, Err(PoolError::Spawn(_))));
}
