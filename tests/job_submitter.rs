// tests/job_submitter.rs

mod common;
use crate::common::fake_pool::{Behaviour, FakePool};
use crate::common::init_tracing;

use std::time::{Duration, Instant};

use watchpool::dispatch::submitter::classify;
use watchpool::dispatch::{DispatchError, DispatchResult, JobSubmitter, RejectReason};
use watchpool::pool::{Flags, Payload, PoolError};

fn job() -> Payload {
    Payload::raw("job")
}

#[tokio::test]
async fn ack_without_body_is_ok_none() {
    init_tracing();
    let pool = FakePool::new();

    let result = JobSubmitter::default().submit(&pool, job()).await;

    assert!(matches!(result, DispatchResult::Ok(None)));
    assert!(result.failure().is_none());
    assert_eq!(pool.received_bodies(), vec!["job"]);
}

#[tokio::test]
async fn response_body_is_accepted() {
    let pool = FakePool::with_default(Behaviour::Respond(b"done".to_vec()));

    let result = JobSubmitter::default().submit(&pool, job()).await;

    match result {
        DispatchResult::Ok(Some(payload)) => assert_eq!(payload.body, b"done"),
        other => panic!("expected Ok(Some(_)), got {other:?}"),
    }
}

#[tokio::test]
async fn stream_response_is_rejected() {
    let pool = FakePool::with_default(Behaviour::Stream);

    let result = JobSubmitter::default().submit(&pool, job()).await;

    assert!(matches!(
        result,
        DispatchResult::Rejected(RejectReason::StreamingUnsupported)
    ));
    assert_eq!(result.failure().as_deref(), Some("streaming-unsupported"));
}

#[tokio::test]
async fn empty_result_channel_is_rejected() {
    let pool = FakePool::with_default(Behaviour::NoResult);

    let result = JobSubmitter::default().submit(&pool, job()).await;

    assert!(matches!(
        result,
        DispatchResult::Rejected(RejectReason::EmptyResponse)
    ));
}

#[tokio::test]
async fn exec_error_is_reported_once() {
    let pool = FakePool::with_default(Behaviour::Fail("boom".to_string()));

    let result = JobSubmitter::default().submit(&pool, job()).await;

    match &result {
        DispatchResult::Err(DispatchError::Exec(PoolError::WorkerFailed { stderr, .. })) => {
            assert_eq!(stderr, "boom");
        }
        other => panic!("expected exec error, got {other:?}"),
    }
    assert!(result.failure().unwrap().contains("boom"));
    // No retries.
    assert_eq!(pool.received().len(), 1);
}

#[tokio::test]
async fn hanging_worker_times_out_at_the_deadline() {
    let pool = FakePool::with_default(Behaviour::Hang);
    let submitter = JobSubmitter::new(Duration::from_millis(100));

    let start = Instant::now();
    let result = submitter.submit(&pool, job()).await;
    let elapsed = start.elapsed();

    assert!(matches!(
        result,
        DispatchResult::Err(DispatchError::Timeout(d)) if d == Duration::from_millis(100)
    ));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn default_deadline_is_ten_seconds() {
    assert_eq!(JobSubmitter::default().deadline(), Duration::from_secs(10));
}

#[test]
fn classify_checks_stream_flag_before_body() {
    let empty_stream = Payload::default().with_flags(Flags::STREAM);
    assert!(matches!(
        classify(empty_stream),
        DispatchResult::Rejected(RejectReason::StreamingUnsupported)
    ));
    assert!(matches!(classify(Payload::default()), DispatchResult::Ok(None)));
    assert!(classify(Payload::raw("x")).is_ok());
}
