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

//! Peer signaling and session-lifecycle client for colibri-dialect video
//! bridges.
//!
//! This crate synthesizes simulated conference participants: it collects a
//! local media offer from each peer, batches them into one conference-
//! creation request, fans the bridge's answer back out per peer, drives
//! each peer's media engine through the synthetic SDP answer/offer
//! exchange, and reports join/connect/leave outcomes. The media engine
//! itself (ICE, DTLS/SRTP, audio encode) stays behind the capability
//! traits in [`engine`]; anything that can run the offer/answer dance can
//! power a peer.
//!
//! # Outline of usage
//!
//! ```no_run
//! # use std::time::Duration;
//! # use colibri_client::{ConferenceCallbacks, ConferenceOptions, ConferenceOrchestrator};
//! # async fn example(engine: impl colibri_client::MediaEngine) -> Result<(), colibri_client::ClientError> {
//! let options = ConferenceOptions {
//!     bridge_endpoint: "http://127.0.0.1:8080".to_string(),
//!     peers_count: 5,
//!     session_time: Duration::from_secs(30),
//!     no_ice_connectivity_checks: false,
//!     no_data_channel_opened_checks: false,
//!     noise: true,
//!     audio_file: None,
//!     expire: 60,
//! };
//! let callbacks = ConferenceCallbacks::default(); // set per-phase callbacks
//! ConferenceOrchestrator::new(engine, options, callbacks).run().await
//! # }
//! ```
//!
//! Lifecycle observability beyond the four callbacks comes from the
//! structured event bus: [`subscribe_session_events`] yields every state
//! transition, phase change and connectivity event.

pub mod audio;
pub mod client;
pub mod conference;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod peer;
pub mod sdp;
pub mod sync;

pub use audio::{AudioError, AudioTrack};
pub use client::{BridgeClient, CreatedConference};
pub use conference::{
    ConferenceCallbacks, ConferenceOptions, ConferenceOrchestrator, LifecycleCallback,
};
pub use engine::{
    BundlePolicy, EngineError, EventHandler, IceConnectionState, IceGatheringState, MediaEngine,
    MediaSession, SdpKind, SessionConfig,
};
pub use error::ClientError;
pub use event_bus::{emit_session_event, subscribe_session_events};
pub use events::{LifecyclePhase, SessionEvent};
pub use peer::{MediaOffer, Peer, PeerConfig, PeerState};
pub use sync::{CompletionSignal, SerialQueue};
