mod common;

use std::time::{Duration, Instant};

use common::{spawn_worker, test_config, unreachable_url, Reply};
use devspace_relay::error::RelayError;
use devspace_relay::events::RelayEvent;
use devspace_relay::execution::{ExecutionRequest, ExecutionStatus, FailureKind};
use devspace_relay::manager::{RelayConfig, RelayManager};
use uuid::Uuid;

fn request(content: &str) -> ExecutionRequest {
    ExecutionRequest::new(Uuid::new_v4(), "main.py", "python", content)
}

// ---------------------------------------------------------------------------
// Test: a submitted file is forwarded and its result correlated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completes_submitted_execution() {
    let worker = spawn_worker(Reply::Complete, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;
    assert!(relay.is_connected());

    let req = request("print(1)");
    let file_id = req.file_id;
    let handle = relay.submit(req).await.unwrap();
    let request_id = handle.request_id();

    let result = handle.wait().await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.output, "print(1)");
    assert_eq!(result.exit_code, Some(0));
    assert!(result.completed_at.is_some());

    let frames = worker.received();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["requestId"], request_id.to_string());
    assert_eq!(frames[0]["fileId"], file_id.to_string());
    assert_eq!(frames[0]["filename"], "main.py");
    assert_eq!(frames[0]["language"], "python");

    let polled = relay.get_result(request_id).await.unwrap();
    assert_eq!(polled.status, ExecutionStatus::Completed);

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: concurrent submissions are sent in order, one at a time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_are_sent_in_submission_order_one_at_a_time() {
    let worker = spawn_worker(Reply::Complete, Duration::from_millis(20)).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        handles.push(relay.submit(request(&format!("job {i}"))).await.unwrap());
    }
    let results = futures::future::join_all(handles.into_iter().map(|h| h.wait())).await;

    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, format!("job {i}"));
    }

    let order: Vec<String> = worker
        .received()
        .iter()
        .map(|f| f["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["job 0", "job 1", "job 2", "job 3", "job 4"]);
    assert!(!worker.saw_overlap());

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: a worker that never answers yields TimedOut at the deadline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn silent_worker_times_out() {
    let worker = spawn_worker(Reply::Silent, Duration::ZERO).await;
    let config = RelayConfig {
        request_timeout: Duration::from_millis(200),
        ..test_config(&worker.url)
    };
    let relay = RelayManager::start(config).await;

    let started = Instant::now();
    let handle = relay.submit(request("while True: pass")).await.unwrap();
    let request_id = handle.request_id();
    let result = handle.wait().await;
    let elapsed = started.elapsed();
    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert!(
        elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(400),
        "timed out after {elapsed:?}, expected about 200ms",
    );

    let polled = relay.get_result(request_id).await.unwrap();
    assert_eq!(polled.status, ExecutionStatus::TimedOut);
    assert_eq!(worker.received().len(), 1);

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: an unreachable worker fails the request with a connection error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_worker_fails_with_connection_error() {
    let relay = RelayManager::start(test_config(&unreachable_url())).await;
    assert!(!relay.is_connected());
    assert!(relay.link_status().last_error.is_some());

    let result = relay.submit(request("print(1)")).await.unwrap().wait().await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Connection);
    assert!(failure.message.starts_with("Worker unreachable"));

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: the link is re-established after the worker drops it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnects_after_worker_drops_link() {
    let worker = spawn_worker(Reply::Complete, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;
    let mut events = relay.subscribe();

    worker.drop_connections();

    let disconnected = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(RelayEvent::WorkerDisconnected { .. }) = events.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(disconnected.is_ok());

    assert!(relay.wait_connected(Duration::from_secs(2)).await);

    let result = relay.submit(request("print(2)")).await.unwrap().wait().await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(worker.connections(), 2);

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: losing the link mid-flight fails the request and frees the queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn link_drop_after_send_fails_in_flight_request() {
    let worker = spawn_worker(Reply::Complete, Duration::from_millis(500)).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;
    let mut events = relay.subscribe();

    let first = relay.submit(request("first")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(worker.received().len(), 1);

    let dropped_at = Instant::now();
    worker.drop_connections();

    let first = first.wait().await;
    assert!(dropped_at.elapsed() < Duration::from_secs(1));
    assert_eq!(first.status, ExecutionStatus::Failed);
    let failure = first.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Connection);
    assert_eq!(failure.message, "Worker link lost after send");

    let disconnected = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(RelayEvent::WorkerDisconnected { .. }) = events.recv().await {
                break;
            }
        }
    })
    .await;
    assert!(disconnected.is_ok());
    assert!(relay.wait_connected(Duration::from_secs(2)).await);

    // The next request is not stuck behind the dead one's 3s deadline.
    let started = Instant::now();
    let second = relay.submit(request("second")).await.unwrap().wait().await;
    assert_eq!(second.status, ExecutionStatus::Completed);
    assert_eq!(second.output, "second");
    assert!(
        started.elapsed() < Duration::from_millis(1500),
        "second request took {:?}",
        started.elapsed(),
    );

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: duplicate replies resolve the request exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_replies_resolve_once() {
    let worker = spawn_worker(Reply::Duplicate, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;
    let mut events = relay.subscribe();

    let handle = relay.submit(request("print(1)")).await.unwrap();
    let request_id = handle.request_id();
    let result = handle.wait().await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    // Let the trailing frames arrive.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        relay.get_result(request_id).await.unwrap().status,
        ExecutionStatus::Completed
    );

    let mut finished = 0;
    while let Ok(event) = events.try_recv() {
        if let RelayEvent::ExecutionFinished { request_id: id, .. } = event {
            assert_eq!(id, request_id);
            finished += 1;
        }
    }
    assert_eq!(finished, 1);
    assert!(relay.is_connected());

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: output chunks and worker failures are recorded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn output_chunks_are_accumulated() {
    let worker = spawn_worker(Reply::Chunked, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;

    let result = relay.submit(request("print(1)")).await.unwrap().wait().await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.output, "line1\ndone");

    relay.shutdown().await;
}

#[tokio::test]
async fn worker_failure_is_reported() {
    let worker = spawn_worker(Reply::Fail, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;

    let result = relay.submit(request("raise")).await.unwrap().wait().await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, Some(1));
    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::Worker);
    assert_eq!(failure.message, "boom");

    relay.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test: shutdown fails outstanding requests and closes the queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_fails_outstanding_requests() {
    let worker = spawn_worker(Reply::Silent, Duration::ZERO).await;
    let relay = RelayManager::start(test_config(&worker.url)).await;

    let in_flight = relay.submit(request("first")).await.unwrap().request_id();
    let queued = relay.submit(request("second")).await.unwrap().request_id();
    tokio::time::sleep(Duration::from_millis(100)).await;

    relay.shutdown().await;

    for id in [in_flight, queued] {
        let result = relay.get_result(id).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.failure.unwrap().kind, FailureKind::Shutdown);
    }
    assert_eq!(worker.received().len(), 1);

    let rejected = relay.submit(request("third")).await;
    assert!(matches!(rejected, Err(RelayError::QueueClosed)));
}

#[tokio::test]
async fn unknown_request_id_has_no_result() {
    let relay = RelayManager::start(test_config(&unreachable_url())).await;
    assert!(relay.get_result(Uuid::new_v4()).await.is_none());
    relay.shutdown().await;
}
