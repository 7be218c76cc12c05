//! In-process fake execution worker for relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devspace_relay::manager::RelayConfig;
use devspace_relay::reconnect::ReconnectConfig;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

/// How the fake worker answers each request.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// `completed` with the request content echoed as output.
    Complete,
    /// One `output` chunk, then `completed`.
    Chunked,
    /// `failed` with exit code 1.
    Fail,
    /// `completed` twice, then `failed`.
    Duplicate,
    /// Never answers.
    Silent,
}

pub struct FakeWorker {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
    overlap: Arc<AtomicBool>,
    kick: broadcast::Sender<()>,
}

impl FakeWorker {
    /// Frames received so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Number of WebSocket connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Whether a request ever arrived while another was unanswered.
    pub fn saw_overlap(&self) -> bool {
        self.overlap.load(Ordering::SeqCst)
    }

    /// Drop every open connection without a close handshake.
    pub fn drop_connections(&self) {
        let _ = self.kick.send(());
    }
}

/// Start a fake worker on an ephemeral port.
pub async fn spawn_worker(reply: Reply, delay: Duration) -> FakeWorker {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (kick, _) = broadcast::channel(4);

    let worker = FakeWorker {
        url: format!("ws://{addr}/ws"),
        received: Arc::new(Mutex::new(Vec::new())),
        connections: Arc::new(AtomicUsize::new(0)),
        overlap: Arc::new(AtomicBool::new(false)),
        kick: kick.clone(),
    };

    let received = Arc::clone(&worker.received);
    let connections = Arc::clone(&worker.connections);
    let overlap = Arc::clone(&worker.overlap);
    let in_flight = Arc::new(AtomicUsize::new(0));

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                continue;
            };
            connections.fetch_add(1, Ordering::SeqCst);

            let received = Arc::clone(&received);
            let overlap = Arc::clone(&overlap);
            let in_flight = Arc::clone(&in_flight);
            let mut kicked = kick.subscribe();

            tokio::spawn(async move {
                let (mut sink, mut stream) = ws.split();
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

                loop {
                    tokio::select! {
                        _ = kicked.recv() => break,
                        Some(out) = out_rx.recv() => {
                            if sink.send(Message::Text(out)).await.is_err() {
                                break;
                            }
                        }
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                let frame: Value = serde_json::from_str(&text).unwrap();
                                received.lock().unwrap().push(frame.clone());
                                if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                                    overlap.store(true, Ordering::SeqCst);
                                }

                                let replies = plan(reply, &frame);
                                if replies.is_empty() {
                                    continue;
                                }
                                let out_tx = out_tx.clone();
                                let in_flight = Arc::clone(&in_flight);
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    in_flight.fetch_sub(1, Ordering::SeqCst);
                                    for r in replies {
                                        let _ = out_tx.send(r);
                                    }
                                });
                            }
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            });
        }
    });

    worker
}

fn plan(reply: Reply, frame: &Value) -> Vec<String> {
    let id = frame["requestId"].clone();
    let content = frame["content"].clone();
    let completed = json!({"requestId": id, "status": "completed", "output": content, "exitCode": 0});

    let replies = match reply {
        Reply::Complete => vec![completed],
        Reply::Chunked => vec![
            json!({"requestId": id, "status": "output", "output": "line1"}),
            json!({"requestId": id, "status": "completed", "output": "done", "exitCode": 0}),
        ],
        Reply::Fail => vec![json!({"requestId": id, "status": "failed", "output": "boom", "exitCode": 1})],
        Reply::Duplicate => vec![
            completed.clone(),
            completed,
            json!({"requestId": id, "status": "failed", "output": "late", "exitCode": 1}),
        ],
        Reply::Silent => vec![],
    };
    replies.into_iter().map(|v| v.to_string()).collect()
}

/// A closed local port, for unreachable-worker tests.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/ws")
}

pub fn test_config(worker_url: &str) -> RelayConfig {
    RelayConfig {
        worker_url: worker_url.to_string(),
        connect_timeout: Duration::from_secs(1),
        send_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(3),
        connect_wait: Duration::from_millis(300),
        reconnect: ReconnectConfig {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        },
        result_retention: Duration::from_secs(60),
    }
}
