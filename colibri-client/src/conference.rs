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

//! Drives one complete conference attempt across all peers.
//!
//! The orchestrator collects offers, creates the conference, joins every
//! peer in index order, waits for connectivity, holds the session open,
//! and always tears down, reporting each lifecycle phase exactly once
//! through the caller's callbacks.

use std::path::PathBuf;
use std::time::Duration;

use colibri_types::PeerIdentity;
use futures::future::try_join_all;
use log::{error, info, warn};

use crate::client::{BridgeClient, CreatedConference};
use crate::engine::{MediaEngine, SessionConfig};
use crate::error::ClientError;
use crate::event_bus::emit_session_event;
use crate::events::{LifecyclePhase, SessionEvent};
use crate::peer::{Peer, PeerConfig};

/// Configuration of one conference attempt.
#[derive(Debug, Clone)]
pub struct ConferenceOptions {
    /// Bridge base URL, e.g. `"http://127.0.0.1:8080"`.
    pub bridge_endpoint: String,
    pub peers_count: usize,
    /// How long to hold the conference open after all peers joined.
    pub session_time: Duration,
    /// Skip waiting for ICE connectivity. The negotiation itself still
    /// runs; only the waits are skipped.
    pub no_ice_connectivity_checks: bool,
    /// Skip waiting for data channels to open.
    pub no_data_channel_opened_checks: bool,
    /// Send white noise instead of silence when no audio file is set.
    pub noise: bool,
    /// WAV file looped as every peer's audio source.
    pub audio_file: Option<PathBuf>,
    /// Channel expiry in seconds passed to the bridge.
    pub expire: u32,
}

/// Callback invoked exactly once per attempt with the phase outcome.
pub type LifecycleCallback<T> = Box<dyn Fn(Result<T, ClientError>) + Send + Sync>;

/// Per-phase callbacks. Each is called exactly once per attempt, with
/// either a value or an error, never both.
pub struct ConferenceCallbacks {
    /// The bridge allocated the conference (carries its id), or the
    /// attempt died before any peer could join.
    pub on_conference_created: LifecycleCallback<String>,
    /// Every peer completed `join`.
    pub on_all_peers_joined: LifecycleCallback<()>,
    /// Every peer reached ICE-connected and opened its data channel
    /// (subject to the check toggles).
    pub on_all_peers_connected: LifecycleCallback<()>,
    /// Teardown finished; carries the first leave error if any.
    pub on_all_peers_left: LifecycleCallback<()>,
}

impl Default for ConferenceCallbacks {
    fn default() -> Self {
        Self {
            on_conference_created: Box::new(|_| {}),
            on_all_peers_joined: Box::new(|_| {}),
            on_all_peers_connected: Box::new(|_| {}),
            on_all_peers_left: Box::new(|_| {}),
        }
    }
}

/// Sequences one conference attempt: offers → create → join → connect →
/// hold → leave.
pub struct ConferenceOrchestrator<E: MediaEngine> {
    engine: E,
    options: ConferenceOptions,
    callbacks: ConferenceCallbacks,
}

impl<E: MediaEngine> ConferenceOrchestrator<E> {
    pub fn new(engine: E, options: ConferenceOptions, callbacks: ConferenceCallbacks) -> Self {
        Self {
            engine,
            options,
            callbacks,
        }
    }

    /// Run the whole attempt. Teardown always runs, even after a failure
    /// in an earlier phase. Returns the first fatal error of the attempt.
    pub async fn run(&self) -> Result<(), ClientError> {
        let peers_count = self.options.peers_count;
        info!("run: starting conference attempt with {peers_count} peers");

        emit_session_event(SessionEvent::PhaseStarted {
            phase: LifecyclePhase::CreatingConference,
        });

        let mut peers = Vec::with_capacity(peers_count);
        for index in 0..peers_count {
            let identity = PeerIdentity::from_index(index);
            let session = match self.engine.create_session(SessionConfig::default()).await {
                Ok(session) => session,
                Err(engine_error) => {
                    let error = ClientError::Negotiation {
                        peer_id: identity.peer_id,
                        reason: engine_error.to_string(),
                    };
                    error!("run: creating media session failed: {error}");
                    (self.callbacks.on_conference_created)(Err(error.clone()));
                    return Err(error);
                }
            };
            peers.push(Peer::new(
                PeerConfig {
                    peer_id: identity.peer_id,
                    bundle_id: identity.bundle_id,
                    expire: self.options.expire,
                    noise: self.options.noise,
                    audio_file: self.options.audio_file.clone(),
                },
                session,
            ));
        }

        let client = BridgeClient::new(&self.options.bridge_endpoint);
        let created = match client.create_conference(&peers).await {
            Ok(created) => {
                info!("run: created conference {}", created.answer.id);
                emit_session_event(SessionEvent::ConferenceCreated {
                    conference_id: created.answer.id.clone(),
                });
                (self.callbacks.on_conference_created)(Ok(created.answer.id.clone()));
                created
            }
            Err(error) => {
                error!("run: create conference failed: {error}");
                (self.callbacks.on_conference_created)(Err(error.clone()));
                return Err(error);
            }
        };

        let mut joined_reported = false;
        let mut connected_reported = false;
        let phase_result = self
            .join_connect_hold(&peers, &created, &mut joined_reported, &mut connected_reported)
            .await;
        if let Err(error) = &phase_result {
            error!("run: attempt failed: {error}");
            if !joined_reported {
                (self.callbacks.on_all_peers_joined)(Err(error.clone()));
            }
            if !connected_reported {
                (self.callbacks.on_all_peers_connected)(Err(error.clone()));
            }
        }

        // Teardown runs regardless of what happened above.
        emit_session_event(SessionEvent::PhaseStarted {
            phase: LifecyclePhase::Leaving,
        });
        info!("run: about to leave {} peers", peers.len());
        let mut leave_error = None;
        for (index, peer) in peers.iter().enumerate() {
            match peer.leave().await {
                Ok(()) => info!("run: left peer #{index} of {peers_count}"),
                Err(error) => {
                    warn!("run: leaving peer #{index} failed: {error}");
                    leave_error.get_or_insert(error);
                }
            }
        }
        match leave_error {
            None => {
                info!("run: all {peers_count} peers left");
                (self.callbacks.on_all_peers_left)(Ok(()));
                phase_result
            }
            Some(error) => {
                (self.callbacks.on_all_peers_left)(Err(error.clone()));
                phase_result.and(Err(error))
            }
        }
    }

    async fn join_connect_hold(
        &self,
        peers: &[Peer<E::Session>],
        created: &CreatedConference,
        joined_reported: &mut bool,
        connected_reported: &mut bool,
    ) -> Result<(), ClientError> {
        let answer = &created.answer;
        let conference_id = &answer.id;
        let peers_count = peers.len();

        emit_session_event(SessionEvent::PhaseStarted {
            phase: LifecyclePhase::Joining,
        });
        for (index, peer) in peers.iter().enumerate() {
            let peer_id = peer.peer_id();
            let bundle = answer
                .bundle(peer.bundle_id())
                .ok_or_else(|| missing(peer_id, "channel-bundle"))?;
            let endpoint = answer
                .endpoint(peer_id)
                .ok_or_else(|| missing(peer_id, "endpoint"))?;
            let audio_channel = answer
                .audio_channel(peer_id)
                .ok_or_else(|| missing(peer_id, "audio channel"))?;
            let sctp_connection = answer
                .sctp_connection(peer_id)
                .ok_or_else(|| missing(peer_id, "sctp connection"))?;

            // Every *other* peer's ssrc text, in index order.
            let remote_ssrcs: Vec<String> = created
                .ssrcs
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .map(|(_, ssrc)| ssrc.clone())
                .collect();

            peer.join(
                conference_id,
                bundle,
                endpoint,
                audio_channel,
                sctp_connection,
                remote_ssrcs,
            )
            .await?;
            info!("run: peer #{index} of {peers_count} / {conference_id} joined");

            if !self.options.no_ice_connectivity_checks {
                peer.wait_ice_connected().await?;
                info!("run: peer #{index} of {peers_count} / {conference_id} ice connected");
            }
            if !self.options.no_data_channel_opened_checks {
                peer.wait_data_channel_open().await?;
                info!("run: peer #{index} of {peers_count} / {conference_id} data channel opened");
            }
        }

        info!("run: all {peers_count} peers joined conference {conference_id}");
        (self.callbacks.on_all_peers_joined)(Ok(()));
        *joined_reported = true;

        emit_session_event(SessionEvent::PhaseStarted {
            phase: LifecyclePhase::Connecting,
        });
        if !self.options.no_ice_connectivity_checks {
            try_join_all(peers.iter().map(|peer| peer.wait_ice_connected())).await?;
            info!("run: all {peers_count} peers ice connected to {conference_id}");
        }
        if !self.options.no_data_channel_opened_checks {
            try_join_all(peers.iter().map(|peer| peer.wait_data_channel_open())).await?;
            info!("run: all {peers_count} peers opened data channels to {conference_id}");
        }
        (self.callbacks.on_all_peers_connected)(Ok(()));
        *connected_reported = true;

        emit_session_event(SessionEvent::PhaseStarted {
            phase: LifecyclePhase::Holding,
        });
        info!(
            "run: holding {peers_count} peers in {conference_id} for {:?}",
            self.options.session_time
        );
        tokio::time::sleep(self.options.session_time).await;
        Ok(())
    }
}

fn missing(peer_id: &str, what: &str) -> ClientError {
    ClientError::ProtocolMismatch {
        peer_id: peer_id.to_string(),
        what: what.to_string(),
    }
}
