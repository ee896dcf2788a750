//! Service-Worker-mediated request bridge (spec.md §4.6, §6).
//!
//! A running sprout page can register in-memory "virtual servers" by port;
//! a Service Worker intercepts same-origin fetches under
//! `/__virtual__/<port>/...` and routes them back to the page, which
//! dispatches into the matching [`VirtualServer`] and posts the result
//! back over a `MessageChannel`. On non-wasm targets the exact same
//! [`Bridge`] dispatch logic runs over an in-process `tokio::mpsc`
//! transport ([`channel`]) so it is fully unit-testable without a browser;
//! [`wasm`] supplies the real Service Worker transport.
//!
//! `Bridge::fetch_handler()` bypasses the channel and the SW entirely,
//! dispatching directly into a registered [`VirtualServer`] in-process —
//! the native equivalent of spec.md §7's `createFetchHandler()` escape
//! hatch for hosts that can't or don't want a Service Worker.

pub mod channel;
pub mod protocol;
pub mod server;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use channel::{spawn_native_channel, start_keepalive, PageConnection, DEFAULT_KEEPALIVE};
pub use protocol::{Message, RequestData, RequestId, ResponseData, StreamChunkData, StreamStartData};
pub use server::{Bridge, BridgeError, BridgeEvent, HandledResponse, StreamSink, VirtualServer};

impl Bridge {
    /// In-process request dispatch with no channel, no SW, no message
    /// serialization round-trip — the synchronous fallback spec.md §7
    /// calls out for hosts running without a Service Worker.
    pub fn fetch_handler(&self, method: &str, url: &str, port: u16, headers: &[(String, String)], body: Option<&[u8]>) -> HandledResponse {
        let req = RequestData {
            port,
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.to_vec(),
            body_base64: body.map(protocol::encode_body),
            streaming: false,
        };
        self.handle_request(&req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Ok200;
    impl VirtualServer for Ok200 {
        fn handle_request(&self, _method: &str, _url: &str, _headers: &[(String, String)], _body: Option<&[u8]>) -> HandledResponse {
            HandledResponse { status_code: 200, status_message: "OK".into(), headers: vec![], body: b"hi".to_vec() }
        }
    }

    #[test]
    fn fetch_handler_bypasses_the_channel() {
        let bridge = Bridge::new("http://host");
        bridge.register_server(Arc::new(Ok200), 5000);
        let resp = bridge.fetch_handler("GET", "/", 5000, &[], None);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, b"hi");
    }

    #[test]
    fn fetch_handler_on_unregistered_port_is_503() {
        let bridge = Bridge::new("http://host");
        let resp = bridge.fetch_handler("GET", "/", 5001, &[], None);
        assert_eq!(resp.status_code, 503);
    }
}
