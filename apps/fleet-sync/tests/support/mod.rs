//! Local fleet manager stream for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

/// What the server pushes to every open socket.
#[derive(Debug, Clone)]
pub enum Push {
    Text(String),
    Close,
}

/// WebSocket server that accepts any number of clients and pushes
/// broadcast frames to each of them.
pub struct StreamServer {
    addr: SocketAddr,
    push: broadcast::Sender<Push>,
    accepted: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl StreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push, _) = broadcast::channel(64);

        let accepted = Arc::new(AtomicUsize::new(0));
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let task = {
            let push = push.clone();
            let accepted = Arc::clone(&accepted);
            let live = Arc::clone(&live);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                while let Ok((tcp, _)) = listener.accept().await {
                    let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                        continue;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);

                    let mut rx = push.subscribe();
                    let live = Arc::clone(&live);
                    tokio::spawn(async move {
                        let (mut write, mut read) = ws.split();
                        loop {
                            tokio::select! {
                                cmd = rx.recv() => match cmd {
                                    Ok(Push::Text(text)) => {
                                        if write.send(Message::text(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Push::Close) | Err(_) => {
                                        let _ = write.send(Message::Close(None)).await;
                                        break;
                                    }
                                },
                                msg = read.next() => match msg {
                                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                },
                            }
                        }
                        live.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            })
        };

        Self {
            addr,
            push,
            accepted,
            live,
            peak,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn send(&self, text: impl Into<String>) {
        let _ = self.push.send(Push::Text(text.into()));
    }

    pub fn close_all(&self) {
        let _ = self.push.send(Push::Close);
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Stop accepting new sockets.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Poll `condition` every 10 ms until it holds or `limit` passes.
pub async fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
