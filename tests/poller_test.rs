//! Integration tests for the image job pipeline (submitter, poller,
//! `generate_image`) against a scripted queue. Time is paused, so the
//! 10-second intervals cost nothing.
//!
//! Run: cargo test --test poller_test

mod common;

use chatdesk_lib::ai::{AiError, JobHandle};
use chatdesk_lib::imaging::{generate_image, JobPoller, JobSubmitter, PollPolicy};
use common::{request, tiny_png_base64, ScriptedQueue, Step};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        max_attempts,
        interval: Duration::from_secs(10),
    }
}

async fn poll(queue: &Arc<ScriptedQueue>, max_attempts: u32) -> Result<Vec<String>, AiError> {
    JobPoller::new(queue.clone())
        .poll(
            &JobHandle::new("job-1"),
            &policy(max_attempts),
            &CancellationToken::new(),
        )
        .await
}

// ---------------------------------------------------------------------------
// JobPoller
// ---------------------------------------------------------------------------

/// PENDING, PENDING, DONE with a budget of 5 returns after the third check.
#[tokio::test(start_paused = true)]
async fn done_on_third_check_returns_artifacts() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Pending,
        Step::Done(vec!["QQ==".into()]),
    ]));
    let start = Instant::now();

    let artifacts = poll(&queue, 5).await.unwrap();

    assert_eq!(artifacts, vec!["QQ==".to_string()]);
    assert_eq!(queue.status_calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

/// DONE on the N-th check: no (N+1)-th check and no trailing wait.
#[tokio::test(start_paused = true)]
async fn done_on_last_allowed_check() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Pending,
        Step::Done(vec!["QQ==".into()]),
    ]));
    let start = Instant::now();

    assert!(poll(&queue, 3).await.is_ok());
    assert_eq!(queue.status_calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

/// All pending: `PollTimeout` after exactly N checks and N-1 waits.
#[tokio::test(start_paused = true)]
async fn all_pending_times_out_after_budget() {
    let queue = Arc::new(ScriptedQueue::new(vec![]));
    let start = Instant::now();

    let err = poll(&queue, 3).await.unwrap_err();

    assert!(matches!(err, AiError::PollTimeout { attempts: 3 }), "{err:?}");
    assert_eq!(queue.status_calls(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

/// Consecutive checks are at least one interval apart.
#[tokio::test(start_paused = true)]
async fn checks_are_spaced_by_interval() {
    let queue = Arc::new(ScriptedQueue::new(vec![]).with_status_latency(Duration::from_millis(300)));

    let _ = poll(&queue, 4).await;

    let times = queue.status_times();
    assert_eq!(times.len(), 4);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(10));
    }
}

/// A transport error before the last attempt is not fatal.
#[tokio::test(start_paused = true)]
async fn transport_error_consumes_one_attempt() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Transport("connection reset".into()),
        Step::Pending,
        Step::Done(vec!["QQ==".into()]),
    ]));

    let artifacts = poll(&queue, 3).await.unwrap();

    assert_eq!(artifacts.len(), 1);
    assert_eq!(queue.status_calls(), 3);
}

/// Transport errors never push the total past the budget.
#[tokio::test(start_paused = true)]
async fn transport_errors_respect_budget() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Transport("timeout".into()),
        Step::Pending,
        Step::Transport("timeout".into()),
        Step::Done(vec!["QQ==".into()]),
    ]));

    let err = poll(&queue, 4).await.unwrap_err();

    assert_eq!(queue.status_calls(), 4);
    match err {
        AiError::Poll(msg) => assert!(msg.contains("timeout"), "{msg}"),
        other => panic!("expected Poll, got {other:?}"),
    }
}

/// A final pending check after earlier errors reports a timeout.
#[tokio::test(start_paused = true)]
async fn pending_after_error_reports_timeout() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Transport("reset".into()),
        Step::Pending,
    ]));

    let err = poll(&queue, 2).await.unwrap_err();
    assert!(matches!(err, AiError::PollTimeout { attempts: 2 }), "{err:?}");
}

/// A FAILED status ends polling at once.
#[tokio::test(start_paused = true)]
async fn failed_status_short_circuits() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Failed("censored".into()),
    ]));
    let start = Instant::now();

    let err = poll(&queue, 10).await.unwrap_err();

    assert!(matches!(&err, AiError::Poll(reason) if reason == "censored"), "{err:?}");
    assert_eq!(queue.status_calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

/// Only transport errors are retried; anything else ends polling as is.
#[tokio::test(start_paused = true)]
async fn non_transport_error_is_not_retried() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Fatal("job unknown".into()),
        Step::Done(vec!["QQ==".into()]),
    ]));
    let start = Instant::now();

    let err = poll(&queue, 5).await.unwrap_err();

    assert!(matches!(&err, AiError::Poll(msg) if msg == "job unknown"), "{err:?}");
    assert_eq!(queue.status_calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn zero_attempts_rejected_without_query() {
    let queue = Arc::new(ScriptedQueue::new(vec![Step::Done(vec!["QQ==".into()])]));

    let err = poll(&queue, 0).await.unwrap_err();

    assert!(matches!(err, AiError::Poll(_)));
    assert_eq!(queue.status_calls(), 0);
}

/// Cancelling during a wait stops the loop before the next check.
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_wait() {
    let queue = Arc::new(ScriptedQueue::new(vec![]));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        trigger.cancel();
    });
    let start = Instant::now();

    let err = JobPoller::new(queue.clone())
        .poll(&JobHandle::new("job-1"), &policy(10), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Cancelled));
    assert_eq!(queue.status_calls(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_makes_no_query() {
    let queue = Arc::new(ScriptedQueue::new(vec![]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = JobPoller::new(queue.clone())
        .poll(&JobHandle::new("job-1"), &policy(3), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Cancelled));
    assert_eq!(queue.status_calls(), 0);
}

// ---------------------------------------------------------------------------
// JobSubmitter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submitter_uses_first_model() {
    let queue = Arc::new(ScriptedQueue::new(vec![]));

    let handle = JobSubmitter::new(queue.clone())
        .submit(&request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(handle.as_str(), "job-1");
    assert_eq!(*queue.submitted_models.lock().unwrap(), vec!["4".to_string()]);
}

/// The model list is fetched again for every submission.
#[tokio::test]
async fn model_list_is_not_cached() {
    let queue = Arc::new(ScriptedQueue::new(vec![]));
    let submitter = JobSubmitter::new(queue.clone());
    let cancel = CancellationToken::new();

    submitter.submit(&request(), &cancel).await.unwrap();
    submitter.submit(&request(), &cancel).await.unwrap();

    assert_eq!(queue.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_model_list_fails_resolution() {
    let queue = Arc::new(ScriptedQueue::new(vec![]).with_models(Ok(vec![])));

    let err = JobSubmitter::new(queue.clone())
        .submit(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::ModelResolution(_)));
    assert_eq!(queue.submit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_list_transport_error_fails_resolution() {
    let queue =
        Arc::new(ScriptedQueue::new(vec![]).with_models(Err("dns failure".into())));

    let err = JobSubmitter::new(queue)
        .resolve_model(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(&err, AiError::ModelResolution(msg) if msg.contains("dns failure")));
}

#[tokio::test]
async fn rejected_submission_maps_to_submission_error() {
    let queue = Arc::new(ScriptedQueue::new(vec![]).with_submit_error("HTTP 500"));

    let err = JobSubmitter::new(queue)
        .submit(&request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Submission(_)), "{err:?}");
}

// ---------------------------------------------------------------------------
// generate_image
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn generate_image_decodes_first_artifact() {
    let queue = Arc::new(ScriptedQueue::new(vec![
        Step::Pending,
        Step::Done(vec![tiny_png_base64(), "QQ==".into()]),
    ]));

    let image = generate_image(queue.clone(), request(), policy(5), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(image.dimensions, Some((3, 2)));
    assert_eq!(image.extension(), "png");
    assert_eq!(queue.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn generate_image_without_artifacts_fails() {
    let queue = Arc::new(ScriptedQueue::new(vec![Step::Done(vec![])]));

    let err = generate_image(queue, request(), policy(5), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Poll(_)), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn generate_image_stops_at_submission_failure() {
    let queue = Arc::new(ScriptedQueue::new(vec![]).with_submit_error("quota exceeded"));

    let err = generate_image(queue.clone(), request(), policy(5), CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, AiError::Submission(_)));
    assert_eq!(queue.status_calls(), 0);
}
