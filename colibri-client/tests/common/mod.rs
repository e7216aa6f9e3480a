/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Shared test doubles: a scriptable media engine and a minimal in-process
//! bridge speaking just enough HTTP for the conference RPC.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colibri_client::engine::{
    EngineError, EventHandler, IceConnectionState, IceGatheringState, MediaEngine, MediaSession,
    SdpKind, SessionConfig,
};
use colibri_client::AudioTrack;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serializes tests that assert on the global event bus.
pub static BUS_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

// ---------------------------------------------------------------------------
// Mock media engine
// ---------------------------------------------------------------------------

pub struct MockEngine {
    auto_connect: bool,
    counter: AtomicUsize,
    pub sessions: Arc<Mutex<Vec<MockSession>>>,
}

impl MockEngine {
    /// With `auto_connect`, a session reports ICE connected and the data
    /// channel open as soon as its local answer is applied.
    pub fn new(auto_connect: bool) -> Self {
        Self {
            auto_connect,
            counter: AtomicUsize::new(0),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn session(&self, index: usize) -> MockSession {
        self.sessions.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    type Session = MockSession;

    async fn create_session(&self, _config: SessionConfig) -> Result<MockSession, EngineError> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let session = MockSession::new(index, self.auto_connect);
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// The ssrc id the mock engine assigns to session `index`.
pub fn mock_ssrc(index: usize) -> u32 {
    1000 + index as u32
}

#[derive(Clone)]
pub struct MockSession {
    inner: Arc<MockSessionInner>,
}

pub struct MockSessionInner {
    pub index: usize,
    auto_connect: bool,
    pub closed: AtomicBool,
    gathering: Mutex<IceGatheringState>,
    /// Every trait call, in order, for call-ordering assertions.
    pub ops: Mutex<Vec<String>>,
    pub local_descriptions: Mutex<Vec<(SdpKind, String)>>,
    pub remote_descriptions: Mutex<Vec<(SdpKind, String)>>,
    on_connection: Mutex<Option<EventHandler<IceConnectionState>>>,
    on_gathering: Mutex<Option<EventHandler<IceGatheringState>>>,
    on_dc_open: Mutex<Option<EventHandler<()>>>,
    on_dc_message: Mutex<Option<EventHandler<String>>>,
}

impl MockSession {
    pub fn new(index: usize, auto_connect: bool) -> Self {
        Self {
            inner: Arc::new(MockSessionInner {
                index,
                auto_connect,
                closed: AtomicBool::new(false),
                gathering: Mutex::new(IceGatheringState::New),
                ops: Mutex::new(Vec::new()),
                local_descriptions: Mutex::new(Vec::new()),
                remote_descriptions: Mutex::new(Vec::new()),
                on_connection: Mutex::new(None),
                on_gathering: Mutex::new(None),
                on_dc_open: Mutex::new(None),
                on_dc_message: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> &MockSessionInner {
        &self.inner
    }

    fn record(&self, op: &str) {
        self.inner.ops.lock().unwrap().push(op.to_string());
    }

    pub fn ops(&self) -> Vec<String> {
        self.inner.ops.lock().unwrap().clone()
    }

    pub fn is_session_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn remote_descriptions(&self) -> Vec<(SdpKind, String)> {
        self.inner.remote_descriptions.lock().unwrap().clone()
    }

    pub fn fire_connection_state(&self, state: IceConnectionState) {
        if let Some(handler) = self.inner.on_connection.lock().unwrap().as_ref() {
            handler(state);
        }
    }

    pub fn fire_data_channel_message(&self, message: &str) {
        if let Some(handler) = self.inner.on_dc_message.lock().unwrap().as_ref() {
            handler(message.to_string());
        }
    }
}

#[async_trait]
impl MediaSession for MockSession {
    async fn add_audio_source(&self, _track: AudioTrack) -> Result<(), EngineError> {
        self.record("add_audio_source");
        Ok(())
    }

    async fn create_data_channel(&self, _label: &str) -> Result<(), EngineError> {
        self.record("create_data_channel");
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, EngineError> {
        self.record("create_offer");
        let index = self.inner.index;
        let ssrc = mock_ssrc(index);
        Ok(format!(
            "v=0\r\n\
             o=- 0 2 IN IP4 127.0.0.1\r\n\
             s=-\r\n\
             t=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
             a=ice-ufrag:mockufrag{index}\r\n\
             a=ice-pwd:mockpwd{index}\r\n\
             a=fingerprint:sha-256 0{index}:AA:BB:CC\r\n\
             a=setup:actpass\r\n\
             a=mid:0\r\n\
             a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
             a=rtpmap:111 opus/48000/2\r\n\
             a=fmtp:111 minptime=10;useinbandfec=1\r\n\
             a=ssrc:{ssrc} cname:mock{index}\r\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
             a=mid:1\r\n\
             a=sctp-port:5000\r\n"
        ))
    }

    async fn create_answer(&self) -> Result<String, EngineError> {
        self.record("create_answer");
        Ok(format!(
            "v=0\r\no=- 0 3 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=ice-ufrag:mockufrag{}\r\n",
            self.inner.index
        ))
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError> {
        self.record(&format!("set_local_description {kind:?}"));
        self.inner
            .local_descriptions
            .lock()
            .unwrap()
            .push((kind, sdp.to_string()));
        if kind == SdpKind::Answer {
            // The join sequence ends with the local answer: report
            // gathering complete, and connectivity if scripted to.
            *self.inner.gathering.lock().unwrap() = IceGatheringState::Complete;
            if let Some(handler) = self.inner.on_gathering.lock().unwrap().as_ref() {
                handler(IceGatheringState::Complete);
            }
            if self.inner.auto_connect {
                self.fire_connection_state(IceConnectionState::Connected);
                if let Some(handler) = self.inner.on_dc_open.lock().unwrap().as_ref() {
                    handler(());
                }
            }
        }
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError> {
        self.record(&format!("set_remote_description {kind:?}"));
        self.inner
            .remote_descriptions
            .lock()
            .unwrap()
            .push((kind, sdp.to_string()));
        Ok(())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        *self.inner.gathering.lock().unwrap()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn on_connection_state_change(&self, handler: EventHandler<IceConnectionState>) {
        self.record("on_connection_state_change");
        *self.inner.on_connection.lock().unwrap() = Some(handler);
    }

    fn on_ice_gathering_state_change(&self, handler: EventHandler<IceGatheringState>) {
        self.record("on_ice_gathering_state_change");
        *self.inner.on_gathering.lock().unwrap() = Some(handler);
    }

    fn on_data_channel_open(&self, handler: EventHandler<()>) {
        self.record("on_data_channel_open");
        *self.inner.on_dc_open.lock().unwrap() = Some(handler);
    }

    fn on_data_channel_message(&self, handler: EventHandler<String>) {
        self.record("on_data_channel_message");
        *self.inner.on_dc_message.lock().unwrap() = Some(handler);
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record("close");
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock bridge
// ---------------------------------------------------------------------------

pub struct MockBridge {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl MockBridge {
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn first_request(&self) -> Value {
        self.requests.lock().unwrap()[0].clone()
    }
}

/// Spawn a one-endpoint HTTP server. `make_answer` maps each parsed
/// request body to the JSON answer to return.
pub async fn spawn_bridge<F>(make_answer: F) -> MockBridge
where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = read_request_body(&mut socket).await;
            let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            captured.lock().unwrap().push(request.clone());
            let answer = make_answer(&request).to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{answer}",
                answer.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    MockBridge { addr, requests }
}

async fn read_request_body(socket: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut buf).await else {
            return Vec::new();
        };
        if n == 0 {
            return Vec::new();
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&data[..pos]).to_ascii_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = pos + 4;
            if data.len() >= body_start + content_length {
                return data[body_start..body_start + content_length].to_vec();
            }
        }
    }
}

/// Build a well-formed bridge answer echoing the request's peers: every
/// bundle gets ICE credentials, a DTLS fingerprint and a candidate list
/// whose last UDP entry is the one peers must select.
pub fn answer_for_request(request: &Value, conference_id: &str) -> Value {
    let bundles = request["channel-bundles"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let channels = request["contents"][0]["channels"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let sctpconnections = request["contents"][1]["sctpconnections"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    json!({
        "id": conference_id,
        "channel-bundles": bundles.iter().map(|bundle| json!({
            "id": bundle["id"],
            "transport": {
                "xmlns": "urn:xmpp:jingle:transports:ice-udp:1",
                "rtcp-mux": true,
                "ufrag": "bridgeufrag",
                "pwd": "bridgepwd",
                "fingerprints": [
                    { "fingerprint": "11:22:33:44", "setup": "actpass", "hash": "sha-256" }
                ],
                "candidates": [
                    { "generation": 0, "component": 1, "protocol": "tcp", "port": 443,
                      "ip": "203.0.113.5", "foundation": "1", "id": "tcp1",
                      "priority": 1, "type": "host", "network": 0 },
                    { "generation": 0, "component": 1, "protocol": "udp", "port": 10000,
                      "ip": "203.0.113.5", "foundation": "2", "id": "udp1",
                      "priority": 2, "type": "host", "network": 0 },
                    { "generation": 0, "component": 1, "protocol": "udp", "port": 10001,
                      "ip": "203.0.113.5", "foundation": "3", "id": "udp2",
                      "priority": 3, "type": "host", "network": 0 }
                ]
            }
        })).collect::<Vec<_>>(),
        "endpoints": channels.iter().map(|channel| json!({
            "id": channel["endpoint"]
        })).collect::<Vec<_>>(),
        "contents": [
            {
                "name": "audio",
                "channels": channels.iter().enumerate().map(|(i, channel)| json!({
                    "endpoint": channel["endpoint"],
                    "channel-bundle-id": channel["channel-bundle-id"],
                    "sources": channel["sources"],
                    "ssrcs": [],
                    "rtp-level-relay-type": "translator",
                    "expire": 60,
                    "initiator": true,
                    "id": format!("chan{i}"),
                    "direction": "sendrecv"
                })).collect::<Vec<_>>()
            },
            {
                "name": "data",
                "sctpconnections": sctpconnections.iter().enumerate().map(|(i, connection)| json!({
                    "endpoint": connection["endpoint"],
                    "channel-bundle-id": connection["channel-bundle-id"],
                    "port": 5000,
                    "expire": 60,
                    "initiator": true,
                    "id": format!("sctp{i}")
                })).collect::<Vec<_>>()
            }
        ]
    })
}
