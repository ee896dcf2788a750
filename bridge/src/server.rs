//! Virtual server registry (spec.md §3 "Virtual server record", §4.6).
//!
//! A [`VirtualServer`] is anything that can answer `handleRequest`, and
//! optionally `handleStreamingRequest`, the same contract spec.md §3 gives
//! an in-memory HTTP server. The [`Bridge`] keeps at most one registration
//! per port (spec.md §3 invariant) and is the single owner of that state —
//! routed through an explicit struct rather than process-global statics,
//! per spec.md §9's "Global mutable state" design note.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::protocol::{RequestData, ResponseData, StreamChunkData, StreamStartData};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no server registered on port {0}")]
    NoServer(u16),
    #[error("service worker unavailable: {0}")]
    ServiceWorkerUnavailable(String),
}

/// A response a [`VirtualServer`] produces for a non-streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct HandledResponse {
    pub status_code: u16,
    pub status_message: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HandledResponse {
    pub fn not_found() -> Self {
        Self { status_code: 404, status_message: "Not Found".into(), headers: vec![], body: vec![] }
    }

    fn service_unavailable(port: u16) -> Self {
        Self {
            status_code: 503,
            status_message: "Service Unavailable".into(),
            headers: vec![("content-type".into(), "text/plain".into())],
            body: format!("no server registered on port {port}").into_bytes(),
        }
    }
}

/// Streaming callbacks a [`VirtualServer`] drives, per spec.md §4.6
/// "Streaming path". Boxed closures rather than an associated trait (the
/// call count per request is small and the closures already capture the
/// request id, matching how the bridge posts messages back to the SW).
pub struct StreamSink {
    pub on_start: Box<dyn FnMut(u16, String, Vec<(String, String)>) + Send>,
    pub on_chunk: Box<dyn FnMut(Vec<u8>) + Send>,
    pub on_end: Box<dyn FnMut() + Send>,
}

/// The contract spec.md §3 gives a "virtual server" and §4.6 routes requests
/// into. Implementations are small in-process HTTP-shaped handlers (a dev
/// server, a mock API) — never a real socket listener.
pub trait VirtualServer: Send + Sync {
    fn handle_request(&self, method: &str, url: &str, headers: &[(String, String)], body: Option<&[u8]>) -> HandledResponse;

    /// Streaming responses are opt-in: a server that doesn't override this
    /// falls back to the bridge fabricating a single-chunk stream from
    /// `handle_request`'s result (spec.md §4.6).
    fn supports_streaming(&self) -> bool {
        false
    }

    fn handle_streaming_request(&self, method: &str, url: &str, headers: &[(String, String)], body: Option<&[u8]>, sink: &mut StreamSink) {
        let response = self.handle_request(method, url, headers, body);
        (sink.on_start)(response.status_code, response.status_message, response.headers);
        (sink.on_chunk)(response.body);
        (sink.on_end)();
    }
}

#[derive(Clone, Debug)]
pub enum BridgeEvent {
    ServerReady { port: u16, url: String },
    ServerUnregistered { port: u16 },
    SwReady,
}

/// Registers virtual HTTP servers by port and routes `fetch` traffic back
/// into them. One `Bridge` instance per page, per spec.md §9's "single
/// bridge singleton per page is correct" design note.
pub struct Bridge {
    servers: DashMap<u16, Arc<dyn VirtualServer>>,
    base_url: String,
    events: broadcast::Sender<BridgeEvent>,
}

impl Bridge {
    pub fn new(base_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { servers: DashMap::new(), base_url: base_url.into(), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// `getServerUrl(port) = <baseUrl>/__virtual__/<port>` (spec.md §4.6).
    pub fn server_url(&self, port: u16) -> String {
        format!("{}/__virtual__/{port}", self.base_url)
    }

    /// Registers `server` at `port`, replacing any existing registration
    /// (spec.md §3: "at most one server is registered per port").
    #[tracing::instrument(skip(self, server))]
    pub fn register_server(&self, server: Arc<dyn VirtualServer>, port: u16) {
        self.servers.insert(port, server);
        let url = self.server_url(port);
        tracing::debug!(port, %url, "server registered");
        let _ = self.events.send(BridgeEvent::ServerReady { port, url });
    }

    #[tracing::instrument(skip(self))]
    pub fn unregister_server(&self, port: u16) {
        self.servers.remove(&port);
        let _ = self.events.send(BridgeEvent::ServerUnregistered { port });
    }

    pub fn is_registered(&self, port: u16) -> bool {
        self.servers.contains_key(&port)
    }

    fn server_for(&self, port: u16) -> Option<Arc<dyn VirtualServer>> {
        self.servers.get(&port).map(|e| e.clone())
    }

    /// Dispatches a single, non-streaming request (spec.md §4.6 "Request
    /// path"). Missing server -> 503 naming the port (spec.md §7).
    pub fn handle_request(&self, req: &RequestData) -> HandledResponse {
        let body = req.body_base64.as_deref().and_then(|b| crate::protocol::decode_body(b).ok());
        match self.server_for(req.port) {
            Some(server) => server.handle_request(&req.method, &req.url, &req.headers, body.as_deref()),
            None => {
                tracing::debug!(port = req.port, "no server registered");
                HandledResponse::service_unavailable(req.port)
            }
        }
    }

    /// Dispatches a streaming request (spec.md §4.6 "Streaming path").
    /// Returns `Err` only when no server is registered for the port; a
    /// registered but non-streaming server still streams, via
    /// [`VirtualServer`]'s default single-chunk fallback.
    pub fn handle_streaming_request(
        &self,
        req: &RequestData,
        on_start: impl FnMut(u16, String, Vec<(String, String)>) + Send + 'static,
        on_chunk: impl FnMut(Vec<u8>) + Send + 'static,
        on_end: impl FnMut() + Send + 'static,
    ) -> Result<(), BridgeError> {
        let server = self.server_for(req.port).ok_or(BridgeError::NoServer(req.port))?;
        let body = req.body_base64.as_deref().and_then(|b| crate::protocol::decode_body(b).ok());
        let mut sink = StreamSink { on_start: Box::new(on_start), on_chunk: Box::new(on_chunk), on_end: Box::new(on_end) };
        server.handle_streaming_request(&req.method, &req.url, &req.headers, body.as_deref(), &mut sink);
        Ok(())
    }

    /// `ResponseData` as the bridge sends it back to the SW: body
    /// base64-encoded in a single message (spec.md §4.6).
    pub fn to_wire_response(response: &HandledResponse) -> ResponseData {
        ResponseData {
            status_code: response.status_code,
            status_message: response.status_message.clone(),
            headers: response.headers.clone(),
            body_base64: crate::protocol::encode_body(&response.body),
        }
    }

    pub fn announce_sw_ready(&self) {
        let _ = self.events.send(BridgeEvent::SwReady);
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new("")
    }
}

pub fn stream_start_wire(status_code: u16, status_message: String, headers: Vec<(String, String)>) -> StreamStartData {
    StreamStartData { status_code, status_message, headers }
}

pub fn stream_chunk_wire(chunk: &[u8]) -> StreamChunkData {
    StreamChunkData { chunk_base64: crate::protocol::encode_body(chunk) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl VirtualServer for Echo {
        fn handle_request(&self, method: &str, url: &str, _headers: &[(String, String)], _body: Option<&[u8]>) -> HandledResponse {
            HandledResponse {
                status_code: 200,
                status_message: "OK".into(),
                headers: vec![],
                body: format!("{method} {url}").into_bytes(),
            }
        }
    }

    fn req(port: u16) -> RequestData {
        RequestData { port, method: "GET".into(), url: "/".into(), headers: vec![], body_base64: None, streaming: false }
    }

    #[test]
    fn missing_server_returns_503() {
        let bridge = Bridge::new("http://host");
        let resp = bridge.handle_request(&req(3000));
        assert_eq!(resp.status_code, 503);
        assert!(String::from_utf8_lossy(&resp.body).contains("3000"));
    }

    #[test]
    fn unregister_then_request_returns_503() {
        let bridge = Bridge::new("http://host");
        bridge.register_server(Arc::new(Echo), 3000);
        assert_eq!(bridge.handle_request(&req(3000)).status_code, 200);
        bridge.unregister_server(3000);
        assert_eq!(bridge.handle_request(&req(3000)).status_code, 503);
    }

    #[test]
    fn server_url_shape() {
        let bridge = Bridge::new("http://host");
        assert_eq!(bridge.server_url(3000), "http://host/__virtual__/3000");
    }

    #[test]
    fn default_streaming_fabricates_single_chunk() {
        let bridge = Bridge::new("http://host");
        bridge.register_server(Arc::new(Echo), 3000);
        let started = Arc::new(std::sync::Mutex::new(None));
        let chunks = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ended = Arc::new(std::sync::Mutex::new(false));
        let (s1, c1, e1) = (started.clone(), chunks.clone(), ended.clone());
        bridge
            .handle_streaming_request(
                &req(3000),
                move |code, _msg, _headers| *s1.lock().unwrap() = Some(code),
                move |chunk| c1.lock().unwrap().push(chunk),
                move || *e1.lock().unwrap() = true,
            )
            .unwrap();
        assert_eq!(*started.lock().unwrap(), Some(200));
        assert_eq!(chunks.lock().unwrap().len(), 1);
        assert!(*ended.lock().unwrap());
    }
}
