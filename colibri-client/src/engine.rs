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

//! Capability interface over the media engine.
//!
//! ICE gathering, DTLS/SRTP and actual audio encoding are external
//! collaborators; this crate only drives the offer/answer dance and
//! observes connectivity events. Any engine (a native WebRTC stack, a
//! browser-class runtime, a signaling-only stand-in) plugs in by
//! implementing these two traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioTrack;

/// Boxed event callback registered on a session.
pub type EventHandler<T> = Box<dyn Fn(T) + Send + Sync>;

/// ICE connection states a session reports through
/// [`on_connection_state_change`](MediaSession::on_connection_state_change).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// ICE candidate-gathering states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceGatheringState {
    New,
    Gathering,
    Complete,
}

/// Which side of the offer/answer exchange an SDP blob belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// How media lines are multiplexed onto transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundlePolicy {
    Balanced,
    #[default]
    MaxBundle,
}

/// Session construction parameters handed to the engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rtcp_mux: bool,
    pub bundle_policy: BundlePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rtcp_mux: true,
            bundle_policy: BundlePolicy::MaxBundle,
        }
    }
}

/// An engine-side failure. Carried as a plain message so it stays `Clone`
/// across the completion signals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("media engine: {0}")]
pub struct EngineError(pub String);

/// Factory for media sessions.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    type Session: MediaSession;

    async fn create_session(&self, config: SessionConfig) -> Result<Self::Session, EngineError>;
}

/// One live media session: offer/answer, a data channel, and connectivity
/// events. All callbacks may fire from the engine's own context; handlers
/// must hand real work back to the owner's serial queue.
#[async_trait]
pub trait MediaSession: Send + Sync + 'static {
    /// Attach a continuous audio track to the session.
    async fn add_audio_source(&self, track: AudioTrack) -> Result<(), EngineError>;

    /// Create the session's data channel. The open event is delivered
    /// through [`on_data_channel_open`](Self::on_data_channel_open).
    async fn create_data_channel(&self, label: &str) -> Result<(), EngineError>;

    async fn create_offer(&self) -> Result<String, EngineError>;

    async fn create_answer(&self) -> Result<String, EngineError>;

    async fn set_local_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), EngineError>;

    fn ice_gathering_state(&self) -> IceGatheringState;

    /// Whether the session has been closed (locally or by failure).
    fn is_closed(&self) -> bool;

    fn on_connection_state_change(&self, handler: EventHandler<IceConnectionState>);

    fn on_ice_gathering_state_change(&self, handler: EventHandler<IceGatheringState>);

    fn on_data_channel_open(&self, handler: EventHandler<()>);

    fn on_data_channel_message(&self, handler: EventHandler<String>);

    /// Close the session and release its media resources.
    async fn close(&self) -> Result<(), EngineError>;
}
