//! The page<->Service-Worker message protocol (spec.md §6).
//!
//! All messages are JSON-cloneable; binary payloads travel as base64 strings
//! to avoid structured-clone restrictions (spec.md §6). Wire shape is
//! `{type, id?, data?}` with `id` a top-level sibling of `data` exactly as
//! spec.md §6 lists it (`{type:'request', id, data:{...}}`), so `Message`
//! serializes through an explicit wire struct rather than serde's adjacently
//! tagged representation (which would nest `id` under `data`).

use serde::{Deserialize, Serialize};

/// Monotonically increasing per-request id, assigned by whichever side
/// first sees the request (the SW, for real browser fetches; the `Bridge`
/// itself for `fetch_handler()` callers).
pub type RequestId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestData {
    pub port: u16,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Base64-encoded body, absent for bodiless requests.
    #[serde(default)]
    pub body_base64: Option<String>,
    #[serde(default)]
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseData {
    pub status_code: u16,
    pub status_message: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamStartData {
    pub status_code: u16,
    pub status_message: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamChunkData {
    pub chunk_base64: String,
}

/// One tagged sum type for every message kind spec.md §6 names, rather than
/// a family of loosely related structs — the set is small and closed, so a
/// tagged variant is the right shape (spec.md §9 "Dynamic dispatch -> tagged
/// variants").
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Carries a transferable port in the real wasm transport; on the
    /// native in-process transport the "port" is just the mpsc sender/
    /// receiver pair already held by the `Bridge`, so this variant exists
    /// only to keep the wire shape identical across both targets.
    Init,
    Request { id: RequestId, data: RequestData },
    Response { id: RequestId, data: ResponseData },
    StreamStart { id: RequestId, data: StreamStartData },
    StreamChunk { id: RequestId, data: StreamChunkData },
    StreamEnd { id: RequestId },
    ServerRegistered { port: u16 },
    ServerUnregistered { port: u16 },
    Keepalive,
    SwNeedsInit,
}

/// On-the-wire shape: `{type, id?, data?}`, matching spec.md §6 literally.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Wire {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Serialize for Message {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;
        let wire = match self {
            Message::Init => Wire { kind: "init".into(), id: None, data: None },
            Message::Request { id, data } => Wire {
                kind: "request".into(),
                id: Some(*id),
                data: Some(serde_json::to_value(data).map_err(S::Error::custom)?),
            },
            Message::Response { id, data } => Wire {
                kind: "response".into(),
                id: Some(*id),
                data: Some(serde_json::to_value(data).map_err(S::Error::custom)?),
            },
            Message::StreamStart { id, data } => Wire {
                kind: "stream-start".into(),
                id: Some(*id),
                data: Some(serde_json::to_value(data).map_err(S::Error::custom)?),
            },
            Message::StreamChunk { id, data } => Wire {
                kind: "stream-chunk".into(),
                id: Some(*id),
                data: Some(serde_json::to_value(data).map_err(S::Error::custom)?),
            },
            Message::StreamEnd { id } => Wire { kind: "stream-end".into(), id: Some(*id), data: None },
            Message::ServerRegistered { port } => Wire {
                kind: "server-registered".into(),
                id: None,
                data: Some(serde_json::json!({ "port": port })),
            },
            Message::ServerUnregistered { port } => Wire {
                kind: "server-unregistered".into(),
                id: None,
                data: Some(serde_json::json!({ "port": port })),
            },
            Message::Keepalive => Wire { kind: "keepalive".into(), id: None, data: None },
            Message::SwNeedsInit => Wire { kind: "sw-needs-init".into(), id: None, data: None },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let wire = Wire::deserialize(deserializer)?;
        let need_id = || wire.id.ok_or_else(|| D::Error::missing_field("id"));
        let need_data = || wire.data.clone().ok_or_else(|| D::Error::missing_field("data"));
        let parse = |v: serde_json::Value| serde_json::from_value(v).map_err(D::Error::custom);

        Ok(match wire.kind.as_str() {
            "init" => Message::Init,
            "request" => Message::Request { id: need_id()?, data: parse(need_data()?)? },
            "response" => Message::Response { id: need_id()?, data: parse(need_data()?)? },
            "stream-start" => Message::StreamStart { id: need_id()?, data: parse(need_data()?)? },
            "stream-chunk" => Message::StreamChunk { id: need_id()?, data: parse(need_data()?)? },
            "stream-end" => Message::StreamEnd { id: need_id()? },
            "server-registered" => {
                let data = need_data()?;
                Message::ServerRegistered { port: data["port"].as_u64().unwrap_or_default() as u16 }
            }
            "server-unregistered" => {
                let data = need_data()?;
                Message::ServerUnregistered { port: data["port"].as_u64().unwrap_or_default() as u16 }
            }
            "keepalive" => Message::Keepalive,
            "sw-needs-init" => Message::SwNeedsInit,
            other => return Err(D::Error::custom(format!("unknown message kind `{other}`"))),
        })
    }
}

/// Encode bytes for transport. `base64-simd` is already a pack-wide choice
/// (see `modules`'s `crypto`/`text` builtins); reused here instead of
/// pulling in a second base64 crate.
pub fn encode_body(bytes: &[u8]) -> String {
    base64_simd::STANDARD.encode_to_string(bytes)
}

pub fn decode_body(encoded: &str) -> Result<Vec<u8>, base64_simd::Error> {
    base64_simd::STANDARD.decode_to_vec(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trips() {
        for s in ["", "hello", "binary\0\x01\xffbytes"] {
            let encoded = encode_body(s.as_bytes());
            let decoded = decode_body(&encoded).unwrap();
            assert_eq!(decoded, s.as_bytes());
        }
    }

    #[test]
    fn request_serializes_with_id_as_sibling_of_data() {
        let msg = Message::Request {
            id: 7,
            data: RequestData {
                port: 3000,
                method: "GET".into(),
                url: "/".into(),
                headers: vec![],
                body_base64: None,
                streaming: false,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["id"], 7);
        assert_eq!(json["data"]["port"], 3000);
        assert!(json.get("data").unwrap().get("id").is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let msg = Message::StreamChunk { id: 3, data: StreamChunkData { chunk_base64: "aGk=".into() } };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
