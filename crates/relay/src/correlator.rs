//! Result table keyed by correlation id.
//!
//! [`ResultCorrelator`] owns every tracked [`ExecutionResult`] and is the
//! only component that mutates them. Each result lives in a
//! [`watch`] channel so waiters wake on every change, and every mutation
//! goes through the terminal-once transitions on [`ExecutionResult`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;

use crate::events::RelayEvent;
use crate::execution::{
    ExecutionFailure, ExecutionRequest, ExecutionResult, ExecutionStatus, FailureKind, RequestId,
};
use crate::messages::{parse_message, WorkerMessage, WorkerStatus};

struct Entry {
    tx: watch::Sender<ExecutionResult>,
    deadline: Instant,
    /// Set when the result turns terminal; drives retention.
    finished_at: Option<Instant>,
}

/// What happened to one inbound worker frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// An output chunk was recorded on a live request.
    Appended(RequestId),
    /// The request reached the given terminal state.
    Resolved(RequestId, ExecutionStatus),
    /// The request was already terminal; the frame was dropped.
    Duplicate(RequestId),
    /// No request with this id is tracked.
    Unmatched(RequestId),
    /// The frame could not be parsed.
    Malformed,
}

/// Counts from one [`ResultCorrelator::sweep`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub timed_out: usize,
    pub pruned: usize,
}

pub struct ResultCorrelator {
    entries: Mutex<HashMap<RequestId, Entry>>,
    event_tx: broadcast::Sender<RelayEvent>,
}

impl ResultCorrelator {
    pub fn new(event_tx: broadcast::Sender<RelayEvent>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            event_tx,
        }
    }

    /// Start tracking `request` as `Pending` until `deadline`.
    pub async fn register(
        &self,
        request: &ExecutionRequest,
        deadline: Instant,
    ) -> watch::Receiver<ExecutionResult> {
        let (tx, rx) = watch::channel(ExecutionResult::pending(request));
        self.entries.lock().await.insert(
            request.id,
            Entry {
                tx,
                deadline,
                finished_at: None,
            },
        );
        rx
    }

    /// A new receiver for a tracked result.
    pub async fn subscribe(&self, id: RequestId) -> Option<watch::Receiver<ExecutionResult>> {
        self.entries.lock().await.get(&id).map(|e| e.tx.subscribe())
    }

    /// Snapshot of a tracked result.
    ///
    /// A non-terminal result whose deadline has passed is timed out first,
    /// so a poll never observes `Pending` or `Sent` past the deadline.
    pub async fn get(&self, id: RequestId) -> Option<ExecutionResult> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&id)?;
        self.expire_if_due(id, entry, Instant::now());
        let snapshot = entry.tx.borrow().clone();
        Some(snapshot)
    }

    pub async fn mark_sent(&self, id: RequestId) -> bool {
        self.with_entry(id, ExecutionResult::mark_sent).await
    }

    pub async fn fail(&self, id: RequestId, failure: ExecutionFailure) -> bool {
        self.with_entry(id, |r| r.fail(failure, None)).await
    }

    pub async fn time_out(&self, id: RequestId) -> bool {
        self.with_entry(id, ExecutionResult::time_out).await
    }

    /// Parse and apply one inbound text frame.
    pub async fn handle_text(&self, text: &str) -> Correlation {
        match parse_message(text) {
            Ok(msg) => self.resolve(msg).await,
            Err(e) => {
                tracing::warn!(error = %e, raw_message = %text, "Discarding malformed worker message");
                Correlation::Malformed
            }
        }
    }

    /// Apply a parsed worker frame to the matching result.
    pub async fn resolve(&self, msg: WorkerMessage) -> Correlation {
        let id = msg.request_id;
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get_mut(&id) else {
            tracing::warn!(request_id = %id, status = ?msg.status, "Worker message for unknown request");
            return Correlation::Unmatched(id);
        };

        // A frame arriving after the deadline must not revive the request.
        self.expire_if_due(id, entry, Instant::now());

        let output = msg.output.as_deref();
        let exit_code = msg.exit_code;
        let changed = match msg.status {
            WorkerStatus::Output => {
                self.update(id, entry, |r| r.append_output(output.unwrap_or_default()))
            }
            WorkerStatus::Completed => self.update(id, entry, |r| r.complete(output, exit_code)),
            WorkerStatus::Failed => {
                let failure = ExecutionFailure {
                    kind: FailureKind::Worker,
                    message: worker_failure_message(output, exit_code),
                };
                self.update(id, entry, |r| {
                    if let Some(chunk) = output {
                        r.append_output(chunk);
                    }
                    r.fail(failure, exit_code)
                })
            }
        };

        let status = entry.tx.borrow().status;
        if changed && status.is_terminal() {
            tracing::debug!(request_id = %id, ?status, "Execution resolved");
            Correlation::Resolved(id, status)
        } else if changed || !status.is_terminal() {
            Correlation::Appended(id)
        } else {
            tracing::warn!(
                request_id = %id,
                current = ?status,
                incoming = ?msg.status,
                "Duplicate worker message for finished request",
            );
            Correlation::Duplicate(id)
        }
    }

    /// Time out overdue results and forget terminal ones older than `retention`.
    pub async fn sweep(&self, retention: Duration) -> SweepStats {
        let now = Instant::now();
        let mut stats = SweepStats::default();
        let mut entries = self.entries.lock().await;

        for (id, entry) in entries.iter_mut() {
            if self.expire_if_due(*id, entry, now) {
                stats.timed_out += 1;
            }
        }

        let before = entries.len();
        entries.retain(|_, e| {
            e.finished_at
                .map_or(true, |t| now.saturating_duration_since(t) < retention)
        });
        stats.pruned = before - entries.len();
        stats
    }

    /// Number of results currently tracked.
    pub async fn tracked(&self) -> usize {
        self.entries.lock().await.len()
    }

    // ---- private helpers ----

    async fn with_entry(
        &self,
        id: RequestId,
        f: impl FnOnce(&mut ExecutionResult) -> bool,
    ) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&id) {
            Some(entry) => self.update(id, entry, f),
            None => false,
        }
    }

    fn expire_if_due(&self, id: RequestId, entry: &mut Entry, now: Instant) -> bool {
        if now < entry.deadline {
            return false;
        }
        let expired = self.update(id, entry, ExecutionResult::time_out);
        if expired {
            tracing::warn!(request_id = %id, "Execution timed out waiting for the worker");
        }
        expired
    }

    fn update(
        &self,
        id: RequestId,
        entry: &mut Entry,
        f: impl FnOnce(&mut ExecutionResult) -> bool,
    ) -> bool {
        let changed = entry.tx.send_if_modified(f);
        if changed {
            let status = entry.tx.borrow().status;
            if status.is_terminal() {
                entry.finished_at = Some(Instant::now());
                let _ = self.event_tx.send(RelayEvent::ExecutionFinished {
                    request_id: id,
                    status,
                });
            }
        }
        changed
    }
}

fn worker_failure_message(output: Option<&str>, exit_code: Option<i32>) -> String {
    match (output.map(str::trim).filter(|o| !o.is_empty()), exit_code) {
        (Some(text), _) => text.to_string(),
        (None, Some(code)) => format!("Worker reported failure (exit code {code})"),
        (None, None) => "Worker reported failure".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn correlator() -> (ResultCorrelator, broadcast::Receiver<RelayEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (ResultCorrelator::new(tx), rx)
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest::new(Uuid::new_v4(), "main.py", "python", "print(1)")
    }

    fn frame(id: RequestId, status: &str, output: &str) -> String {
        format!(r#"{{"requestId":"{id}","status":"{status}","output":"{output}","exitCode":0}}"#)
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn completed_frame_resolves_matching_request() {
        let (c, _events) = correlator();
        let req = request();
        let rx = c.register(&req, far_deadline()).await;
        c.mark_sent(req.id).await;

        let outcome = c.handle_text(&frame(req.id, "completed", "1")).await;
        assert_eq!(outcome, Correlation::Resolved(req.id, ExecutionStatus::Completed));

        let result = rx.borrow().clone();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, "1");
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn output_chunks_accumulate_without_changing_status() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, far_deadline()).await;
        c.mark_sent(req.id).await;

        assert_eq!(
            c.handle_text(&frame(req.id, "output", "a")).await,
            Correlation::Appended(req.id)
        );
        c.handle_text(&frame(req.id, "output", "b")).await;

        let result = c.get(req.id).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Sent);
        assert_eq!(result.output, "a\nb");
    }

    #[tokio::test]
    async fn duplicate_terminal_frame_is_a_noop() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, far_deadline()).await;

        c.handle_text(&frame(req.id, "completed", "1")).await;
        let first = c.get(req.id).await.unwrap();

        let outcome = c.handle_text(&frame(req.id, "failed", "boom")).await;
        assert_eq!(outcome, Correlation::Duplicate(req.id));

        let second = c.get(req.id).await.unwrap();
        assert_eq!(second.status, ExecutionStatus::Completed);
        assert_eq!(second.output, first.output);
        assert_eq!(second.completed_at, first.completed_at);
    }

    #[tokio::test]
    async fn unmatched_and_malformed_frames_are_discarded() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, far_deadline()).await;

        let stranger = Uuid::new_v4();
        assert_eq!(
            c.handle_text(&frame(stranger, "completed", "x")).await,
            Correlation::Unmatched(stranger)
        );
        assert_eq!(c.handle_text("{ nope").await, Correlation::Malformed);

        assert_eq!(c.get(req.id).await.unwrap().status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn worker_failure_is_recorded_with_kind_worker() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, far_deadline()).await;

        let text = format!(
            r#"{{"requestId":"{}","status":"failed","output":"SyntaxError","exitCode":1}}"#,
            req.id
        );
        assert_eq!(
            c.handle_text(&text).await,
            Correlation::Resolved(req.id, ExecutionStatus::Failed)
        );

        let result = c.get(req.id).await.unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert_matches!(
            result.failure,
            Some(ExecutionFailure { kind: FailureKind::Worker, ref message }) if message == "SyntaxError"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_after_deadline_times_out() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, Instant::now() + Duration::from_secs(5)).await;
        c.mark_sent(req.id).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let result = c.get(req.id).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::TimedOut);
        assert!(result.completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_deadline_does_not_complete() {
        let (c, _events) = correlator();
        let req = request();
        c.register(&req, Instant::now() + Duration::from_secs(5)).await;
        c.mark_sent(req.id).await;

        tokio::time::advance(Duration::from_secs(6)).await;

        let outcome = c.handle_text(&frame(req.id, "completed", "1")).await;
        assert_eq!(outcome, Correlation::Duplicate(req.id));
        assert_eq!(c.get(req.id).await.unwrap().status, ExecutionStatus::TimedOut);
    }

    #[tokio::test]
    async fn finished_event_is_emitted_once() {
        let (c, mut events) = correlator();
        let req = request();
        c.register(&req, far_deadline()).await;

        c.time_out(req.id).await;
        c.time_out(req.id).await;
        c.handle_text(&frame(req.id, "completed", "1")).await;

        assert_matches!(
            events.try_recv(),
            Ok(RelayEvent::ExecutionFinished { request_id, status: ExecutionStatus::TimedOut }) if request_id == req.id
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_times_out_overdue_and_prunes_old_results() {
        let (c, _events) = correlator();
        let finished = request();
        let overdue = request();
        let live = request();
        c.register(&finished, far_deadline()).await;
        c.register(&overdue, Instant::now() + Duration::from_secs(1)).await;
        c.register(&live, far_deadline()).await;

        c.handle_text(&frame(finished.id, "completed", "ok")).await;
        tokio::time::advance(Duration::from_secs(10)).await;

        let stats = c.sweep(Duration::from_secs(5)).await;
        assert_eq!(stats, SweepStats { timed_out: 1, pruned: 1 });
        assert!(c.get(finished.id).await.is_none());
        assert_eq!(c.get(overdue.id).await.unwrap().status, ExecutionStatus::TimedOut);
        assert_eq!(c.get(live.id).await.unwrap().status, ExecutionStatus::Pending);
        assert_eq!(c.tracked().await, 2);
    }
}
