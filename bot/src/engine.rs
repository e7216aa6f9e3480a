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

//! Signaling-only stand-in for a real media engine.
//!
//! It fabricates a plausible local offer (random ICE credentials, DTLS
//! fingerprint and synchronization source), accepts any remote
//! description, and reports candidate gathering as complete once a local
//! description is applied. It never reaches ICE-connected (there is no
//! real transport underneath), which is enough to load the bridge's
//! allocate/expire signaling path. Real deployments plug a full WebRTC
//! engine into the same traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colibri_client::audio::AudioTrack;
use colibri_client::engine::{
    EngineError, EventHandler, IceConnectionState, IceGatheringState, MediaEngine, MediaSession,
    SdpKind, SessionConfig,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn token(rng: &mut SmallRng, len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

fn fabricated_fingerprint(rng: &mut SmallRng) -> String {
    let bytes: Vec<String> = (0..32).map(|_| format!("{:02X}", rng.gen::<u8>())).collect();
    bytes.join(":")
}

pub struct SignalingEngine;

impl SignalingEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SignalingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaEngine for SignalingEngine {
    type Session = SignalingSession;

    async fn create_session(&self, _config: SessionConfig) -> Result<SignalingSession, EngineError> {
        Ok(SignalingSession::new())
    }
}

pub struct SignalingSession {
    inner: Arc<Inner>,
}

struct Inner {
    ufrag: String,
    pwd: String,
    fingerprint: String,
    ssrc: u32,
    cname: String,
    closed: AtomicBool,
    gathering: Mutex<IceGatheringState>,
    on_gathering: Mutex<Option<EventHandler<IceGatheringState>>>,
    // Registered but never fired: no transport exists to connect.
    on_connection: Mutex<Option<EventHandler<IceConnectionState>>>,
    on_dc_open: Mutex<Option<EventHandler<()>>>,
    on_dc_message: Mutex<Option<EventHandler<String>>>,
}

impl SignalingSession {
    fn new() -> Self {
        let mut rng = SmallRng::from_entropy();
        Self {
            inner: Arc::new(Inner {
                ufrag: token(&mut rng, 4),
                pwd: token(&mut rng, 24),
                fingerprint: fabricated_fingerprint(&mut rng),
                ssrc: rng.gen_range(1..u32::MAX),
                cname: token(&mut rng, 8),
                closed: AtomicBool::new(false),
                gathering: Mutex::new(IceGatheringState::New),
                on_gathering: Mutex::new(None),
                on_connection: Mutex::new(None),
                on_dc_open: Mutex::new(None),
                on_dc_message: Mutex::new(None),
            }),
        }
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(EngineError("session is closed".to_string()));
        }
        Ok(())
    }

    fn complete_gathering(&self) {
        {
            let mut gathering = self.inner.gathering.lock().unwrap();
            if *gathering == IceGatheringState::Complete {
                return;
            }
            *gathering = IceGatheringState::Complete;
        }
        if let Some(handler) = self.inner.on_gathering.lock().unwrap().as_ref() {
            handler(IceGatheringState::Complete);
        }
    }
}

#[async_trait]
impl MediaSession for SignalingSession {
    async fn add_audio_source(&self, track: AudioTrack) -> Result<(), EngineError> {
        self.ensure_open()?;
        debug!(
            "signaling engine: accepted audio track ({} samples at {} Hz)",
            track.samples.len(),
            track.sample_rate
        );
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        debug!("signaling engine: created data channel '{label}'");
        Ok(())
    }

    async fn create_offer(&self) -> Result<String, EngineError> {
        self.ensure_open()?;
        let inner = &self.inner;
        Ok(format!(
            "v=0\r\n\
             o=- 0 2 IN IP4 127.0.0.1\r\n\
             s=-\r\n\
             t=0 0\r\n\
             a=group:BUNDLE 0 1\r\n\
             a=msid-semantic:WMS *\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
             c=IN IP4 0.0.0.0\r\n\
             a=ice-ufrag:{ufrag}\r\n\
             a=ice-pwd:{pwd}\r\n\
             a=fingerprint:sha-256 {fingerprint}\r\n\
             a=setup:actpass\r\n\
             a=mid:0\r\n\
             a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
             a=sendonly\r\n\
             a=rtcp-mux\r\n\
             a=rtpmap:111 opus/48000/2\r\n\
             a=fmtp:111 minptime=10;useinbandfec=1\r\n\
             a=ssrc:{ssrc} cname:{cname}\r\n\
             a=ssrc:{ssrc} msid:{cname} audio0\r\n\
             m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n\
             a=mid:1\r\n\
             a=sctp-port:5000\r\n",
            ufrag = inner.ufrag,
            pwd = inner.pwd,
            fingerprint = inner.fingerprint,
            ssrc = inner.ssrc,
            cname = inner.cname,
        ))
    }

    async fn create_answer(&self) -> Result<String, EngineError> {
        self.ensure_open()?;
        let inner = &self.inner;
        Ok(format!(
            "v=0\r\n\
             o=- 0 3 IN IP4 127.0.0.1\r\n\
             s=-\r\n\
             t=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
             a=ice-ufrag:{ufrag}\r\n\
             a=ice-pwd:{pwd}\r\n\
             a=fingerprint:sha-256 {fingerprint}\r\n\
             a=setup:active\r\n\
             a=mid:0\r\n",
            ufrag = inner.ufrag,
            pwd = inner.pwd,
            fingerprint = inner.fingerprint,
        ))
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        if sdp.is_empty() {
            return Err(EngineError("empty local description".to_string()));
        }
        debug!("signaling engine: applied local {kind:?}");
        // With no real ICE agent there is nothing to gather; report
        // completion as soon as a local description exists.
        self.complete_gathering();
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        if sdp.is_empty() {
            return Err(EngineError("empty remote description".to_string()));
        }
        debug!("signaling engine: applied remote {kind:?}");
        Ok(())
    }

    fn ice_gathering_state(&self) -> IceGatheringState {
        *self.inner.gathering.lock().unwrap()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn on_connection_state_change(&self, handler: EventHandler<IceConnectionState>) {
        *self.inner.on_connection.lock().unwrap() = Some(handler);
    }

    fn on_ice_gathering_state_change(&self, handler: EventHandler<IceGatheringState>) {
        *self.inner.on_gathering.lock().unwrap() = Some(handler);
    }

    fn on_data_channel_open(&self, handler: EventHandler<()>) {
        *self.inner.on_dc_open.lock().unwrap() = Some(handler);
    }

    fn on_data_channel_message(&self, handler: EventHandler<String>) {
        *self.inner.on_dc_message.lock().unwrap() = Some(handler);
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.inner.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
