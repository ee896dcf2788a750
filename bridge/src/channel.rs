//! Native (non-wasm) transport: the same id-tagged request/response
//! bookkeeping a real `MessageChannel` would carry, built on
//! `tokio::sync::mpsc` so the protocol (§6) and the `Bridge`'s dispatch are
//! fully unit-testable without a browser (SPEC_FULL.md §4.6). Grounded on
//! `octofhir-otter`'s `WorkerThreadManager`/`MessagePortHandle` id-pairing
//! style: two ends of a channel, each with its own id space, connected by
//! a background dispatch task.
//!
//! `wasm32` builds additionally expose the same [`crate::Bridge`] over a
//! real Service Worker (see [`crate::wasm`]); only the transport differs,
//! the message shapes in [`crate::protocol`] do not.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::protocol::{Message, RequestData};
use crate::server::Bridge;

/// Dead-man's-switch keepalive period (spec.md §4.6 step 6, §9 Open
/// Questions: "pegged empirically", kept as a constructor parameter so a
/// host can retune without a code change).
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(20);

/// The page-side endpoint of a native channel: sends `request`/`keepalive`
/// messages to the SW-side dispatch loop and awaits matching
/// `response`/`stream-*` messages by id.
pub struct PageConnection {
    next_id: AtomicU64,
    to_sw: mpsc::UnboundedSender<Message>,
    pending: Arc<Mutex<std::collections::HashMap<u64, oneshot::Sender<Message>>>>,
    stream_txs: Arc<Mutex<std::collections::HashMap<u64, mpsc::UnboundedSender<Message>>>>,
}

impl PageConnection {
    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a non-streaming request and await its response, the native
    /// analogue of the SW posting `{type:'request', ...}` and the page
    /// eventually posting back `{type:'response', ...}`.
    pub async fn request(&self, mut data: RequestData) -> crate::protocol::ResponseData {
        data.streaming = false;
        let id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        let _ = self.to_sw.send(Message::Request { id, data });
        match rx.await {
            Ok(Message::Response { data, .. }) => data,
            _ => crate::protocol::ResponseData {
                status_code: 503,
                status_message: "Service Unavailable".into(),
                headers: vec![],
                body_base64: crate::protocol::encode_body(b"channel closed before a response arrived"),
            },
        }
    }

    /// Send a streaming request; the returned receiver yields
    /// `stream-start`/`stream-chunk`/`stream-end` messages in order
    /// (spec.md §5 "Stream chunks for a given id are delivered in order").
    pub async fn request_streaming(&self, mut data: RequestData) -> mpsc::UnboundedReceiver<Message> {
        data.streaming = true;
        let id = self.next_request_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.stream_txs.lock().await.insert(id, tx);
        let _ = self.to_sw.send(Message::Request { id, data });
        rx
    }

    pub fn send_keepalive(&self) {
        let _ = self.to_sw.send(Message::Keepalive);
    }
}

/// Runs the SW-side dispatch loop against a [`Bridge`]: for every
/// `Request` it dispatches via `Bridge::handle_request`/
/// `handle_streaming_request` and posts the matching response back,
/// exactly as spec.md §4.6 describes the real SW's job.
async fn run_dispatch_loop(bridge: Arc<Bridge>, mut from_page: mpsc::UnboundedReceiver<Message>, responses: mpsc::UnboundedSender<Message>) {
    while let Some(msg) = from_page.recv().await {
        match msg {
            Message::Request { id, data } => {
                if data.streaming {
                    let responses = responses.clone();
                    let r1 = responses.clone();
                    let r2 = responses.clone();
                    let result = bridge.handle_streaming_request(
                        &data,
                        move |code, msg, headers| {
                            let _ = r1.send(Message::StreamStart { id, data: crate::server::stream_start_wire(code, msg, headers) });
                        },
                        move |chunk| {
                            let _ = r2.send(Message::StreamChunk { id, data: crate::server::stream_chunk_wire(&chunk) });
                        },
                        move || {
                            let _ = responses.send(Message::StreamEnd { id });
                        },
                    );
                    if result.is_err() {
                        let resp = Bridge::to_wire_response(&crate::server::HandledResponse::not_found());
                        let _ = responses.send(Message::Response { id, data: resp });
                    }
                } else {
                    let response = bridge.handle_request(&data);
                    let _ = responses.send(Message::Response { id, data: Bridge::to_wire_response(&response) });
                }
            }
            Message::Keepalive => { /* resets the dead-man's-switch on the real SW; no-op here */ }
            _ => {}
        }
    }
}

/// Spawns a native channel pair wired to `bridge`'s dispatch, returning the
/// page-side handle. The background task (the "SW side") fans responses
/// back out to either the matching oneshot (non-streaming) or the matching
/// stream receiver.
pub fn spawn_native_channel(bridge: Arc<Bridge>) -> Arc<PageConnection> {
    let (to_sw, from_page) = mpsc::unbounded_channel::<Message>();
    let (to_page, mut from_sw) = mpsc::unbounded_channel::<Message>();

    let conn = Arc::new(PageConnection {
        next_id: AtomicU64::new(1),
        to_sw,
        pending: Arc::new(Mutex::new(std::collections::HashMap::new())),
        stream_txs: Arc::new(Mutex::new(std::collections::HashMap::new())),
    });

    tokio::spawn(run_dispatch_loop(bridge, from_page, to_page));

    let pending = conn.pending.clone();
    let stream_txs = conn.stream_txs.clone();
    tokio::spawn(async move {
        while let Some(msg) = from_sw.recv().await {
            match &msg {
                Message::Response { id, .. } => {
                    if let Some(tx) = pending.lock().await.remove(id) {
                        let _ = tx.send(msg);
                        continue;
                    }
                    if let Some(tx) = stream_txs.lock().await.get(id) {
                        let _ = tx.send(msg);
                    }
                }
                Message::StreamStart { id, .. } | Message::StreamChunk { id, .. } => {
                    if let Some(tx) = stream_txs.lock().await.get(id) {
                        let _ = tx.send(msg);
                    }
                }
                Message::StreamEnd { id } => {
                    if let Some(tx) = stream_txs.lock().await.remove(id) {
                        let _ = tx.send(msg);
                    }
                }
                _ => {}
            }
        }
    });

    conn
}

/// Starts the 20-second (by default) keepalive ping loop on a page
/// connection (spec.md §4.6 step 6). Returns a `JoinHandle` the caller can
/// abort to stop pinging, e.g. on page teardown.
pub fn start_keepalive(conn: Arc<PageConnection>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            conn.send_keepalive();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Bridge, HandledResponse, VirtualServer};

    struct Echo;
    impl VirtualServer for Echo {
        fn handle_request(&self, method: &str, url: &str, _h: &[(String, String)], _b: Option<&[u8]>) -> HandledResponse {
            HandledResponse { status_code: 200, status_message: "OK".into(), headers: vec![], body: format!("{method} {url}").into_bytes() }
        }
    }

    fn req(port: u16) -> RequestData {
        RequestData { port, method: "GET".into(), url: "/ping".into(), headers: vec![], body_base64: None, streaming: false }
    }

    #[tokio::test]
    async fn request_round_trips_over_native_channel() {
        let bridge = Arc::new(Bridge::new("http://host"));
        bridge.register_server(Arc::new(Echo), 4000);
        let conn = spawn_native_channel(bridge);
        let resp = conn.request(req(4000)).await;
        assert_eq!(resp.status_code, 200);
        let body = crate::protocol::decode_body(&resp.body_base64).unwrap();
        assert_eq!(body, b"GET /ping");
    }

    #[tokio::test]
    async fn missing_server_round_trips_503() {
        let bridge = Arc::new(Bridge::new("http://host"));
        let conn = spawn_native_channel(bridge);
        let resp = conn.request(req(9999)).await;
        assert_eq!(resp.status_code, 503);
    }

    #[tokio::test]
    async fn streaming_request_yields_start_then_chunk_then_end() {
        let bridge = Arc::new(Bridge::new("http://host"));
        bridge.register_server(Arc::new(Echo), 4000);
        let conn = spawn_native_channel(bridge);
        let mut rx = conn.request_streaming(req(4000)).await;
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, Message::StreamStart { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, Message::StreamChunk { .. }));
        let third = rx.recv().await.unwrap();
        assert!(matches!(third, Message::StreamEnd { .. }));
    }
}
