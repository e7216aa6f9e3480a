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

//! One simulated conference participant.
//!
//! A peer wraps a media-engine session and drives it through its
//! lifecycle: produce a local offer, join the conference with the bridge's
//! answer, hold, leave. Every operation, including inbound data-channel
//! messages, goes through the peer's serial queue, so nothing
//! interleaves with an in-flight join or leave.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use colibri_types::{
    BundleRequest, Channel, ChannelBundle, ChannelRequest, Endpoint, Fingerprint, PayloadType,
    RtpHdrExt, SctpConnection, SctpConnectionRequest, Transport, XMLNS_ICE_UDP,
};
use futures::Future;
use log::{debug, error, info, warn};

use crate::audio::AudioTrack;
use crate::engine::{EngineError, IceConnectionState, IceGatheringState, MediaSession, SdpKind};
use crate::error::ClientError;
use crate::event_bus::emit_session_event;
use crate::events::SessionEvent;
use crate::sdp::{self, LocalOfferParams, SdpError, AUDIO_PAYLOAD_TYPE};
use crate::sync::{CompletionSignal, SerialQueue};

const DATA_CHANNEL_LABEL: &str = "default";

/// Static configuration of one peer.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub peer_id: String,
    pub bundle_id: String,
    /// Channel expiry in seconds, echoed into every allocation request.
    pub expire: u32,
    /// Send white noise instead of silence when no audio file is set.
    pub noise: bool,
    /// WAV file to loop as the peer's audio source.
    pub audio_file: Option<PathBuf>,
}

/// Lifecycle states of a peer. Transitions are serialized by the peer's
/// queue; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Created,
    OfferPending,
    Offered,
    Joining,
    Joined,
    Leaving,
    Left,
    Failed,
}

/// Everything `create_offer` extracted for the conference request:
/// the peer's audio channel, data-channel endpoint, transport bundle and
/// its raw synchronization-source lines.
#[derive(Debug, Clone)]
pub struct MediaOffer {
    pub channel: ChannelRequest,
    pub sctp_connection: SctpConnectionRequest,
    pub bundle: BundleRequest,
    pub ssrc: String,
}

/// One simulated participant bound to a media-engine session.
pub struct Peer<S: MediaSession> {
    config: PeerConfig,
    session: Arc<S>,
    queue: SerialQueue,
    state: Arc<Mutex<PeerState>>,
    ice_connected: CompletionSignal<()>,
    data_channel_open: CompletionSignal<()>,
}

impl<S: MediaSession> Peer<S> {
    pub fn new(config: PeerConfig, session: S) -> Self {
        Self {
            config,
            session: Arc::new(session),
            queue: SerialQueue::new(),
            state: Arc::new(Mutex::new(PeerState::Created)),
            ice_connected: CompletionSignal::new(),
            data_channel_open: CompletionSignal::new(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.config.peer_id
    }

    pub fn bundle_id(&self) -> &str {
        &self.config.bundle_id
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock().unwrap()
    }

    /// Produce this peer's media offer: attach the audio source and the
    /// data channel, let the engine build a local offer, apply it, and
    /// extract the transport parameters the bridge request needs.
    ///
    /// Runs on the peer's queue. Moves Created → Offered, or Failed on any
    /// engine error (fatal for this peer, not retried).
    pub fn create_offer(&self) -> impl Future<Output = Result<MediaOffer, ClientError>> {
        let session = Arc::clone(&self.session);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let queue = self.queue.clone();
        let data_channel_open = self.data_channel_open.clone();

        self.queue.submit(async move {
            let current = *state.lock().unwrap();
            if current != PeerState::Created {
                return Err(ClientError::InvalidState {
                    peer_id: config.peer_id.clone(),
                    operation: "create an offer",
                    state: current,
                });
            }
            transition(&state, &config.peer_id, PeerState::OfferPending);

            match build_offer(&session, &config, &queue, &data_channel_open).await {
                Ok(offer) => {
                    transition(&state, &config.peer_id, PeerState::Offered);
                    Ok(offer)
                }
                Err(error) => {
                    error!("peer {}: create_offer failed: {error}", config.peer_id);
                    transition(&state, &config.peer_id, PeerState::Failed);
                    Err(error)
                }
            }
        })
    }

    /// Join the conference with this peer's slice of the bridge answer.
    ///
    /// Runs on the peer's queue; requires state Offered. The connectivity
    /// observer is registered before any remote description is applied so
    /// a fast transition cannot be missed. The synthesized answer is
    /// applied before the synthesized offer, since the engine already holds the
    /// local offer as its own side of the first exchange.
    pub fn join(
        &self,
        conference_id: &str,
        bundle: &ChannelBundle,
        endpoint: &Endpoint,
        audio_channel: &Channel,
        sctp_connection: &SctpConnection,
        remote_ssrcs: Vec<String>,
    ) -> impl Future<Output = Result<(), ClientError>> {
        let session = Arc::clone(&self.session);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let ice_connected = self.ice_connected.clone();
        let data_channel_open = self.data_channel_open.clone();
        let conference_id = conference_id.to_string();
        let bundle = bundle.clone();
        let endpoint = endpoint.clone();
        let audio_channel = audio_channel.clone();
        let sctp_connection = sctp_connection.clone();

        self.queue.submit(async move {
            let current = *state.lock().unwrap();
            if current != PeerState::Offered {
                return Err(ClientError::InvalidState {
                    peer_id: config.peer_id.clone(),
                    operation: "join",
                    state: current,
                });
            }
            info!(
                "peer {}: joining conference {conference_id} as endpoint {} (channel {}, sctp {})",
                config.peer_id, endpoint.id, audio_channel.id, sctp_connection.id
            );
            transition(&state, &config.peer_id, PeerState::Joining);

            let joined = drive_join(
                &session,
                &config,
                &conference_id,
                &bundle,
                &sctp_connection,
                &remote_ssrcs,
                &ice_connected,
                &data_channel_open,
            )
            .await;
            match joined {
                Ok(()) => {
                    transition(&state, &config.peer_id, PeerState::Joined);
                    Ok(())
                }
                Err(error) => {
                    error!("peer {}: join failed: {error}", config.peer_id);
                    transition(&state, &config.peer_id, PeerState::Failed);
                    Err(error)
                }
            }
        })
    }

    /// Close the media session and release audio resources.
    ///
    /// Runs on the peer's queue. A no-op (with a warning) on a peer that
    /// never reached Joined.
    pub fn leave(&self) -> impl Future<Output = Result<(), ClientError>> {
        let session = Arc::clone(&self.session);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);

        self.queue.submit(async move {
            let current = *state.lock().unwrap();
            if current != PeerState::Joined {
                warn!(
                    "peer {}: leave called in state {current:?}, nothing to do",
                    config.peer_id
                );
                return Ok(());
            }
            transition(&state, &config.peer_id, PeerState::Leaving);
            match session.close().await {
                Ok(()) => {
                    info!("peer {}: left", config.peer_id);
                    transition(&state, &config.peer_id, PeerState::Left);
                    Ok(())
                }
                Err(error) => {
                    error!("peer {}: close failed: {error}", config.peer_id);
                    transition(&state, &config.peer_id, PeerState::Failed);
                    Err(negotiation_error(&config.peer_id, error))
                }
            }
        })
    }

    /// Resolves once ICE reports connected, or fails on an explicit ICE
    /// failure. May be called before, during, or after `join`. No timeout
    /// is built in: on join failures other than explicit ICE failure this
    /// never resolves, so callers must impose their own deadline.
    pub async fn wait_ice_connected(&self) -> Result<(), ClientError> {
        self.ice_connected.wait().await
    }

    /// Resolves once the data channel opens; same timeout discipline as
    /// [`wait_ice_connected`](Self::wait_ice_connected).
    pub async fn wait_data_channel_open(&self) -> Result<(), ClientError> {
        self.data_channel_open.wait().await
    }
}

fn transition(state: &Arc<Mutex<PeerState>>, peer_id: &str, next: PeerState) {
    {
        let mut slot = state.lock().unwrap();
        debug!("peer {peer_id}: {:?} -> {next:?}", *slot);
        *slot = next;
    }
    emit_session_event(SessionEvent::PeerStateChanged {
        peer_id: peer_id.to_string(),
        state: next,
    });
}

fn negotiation_error(peer_id: &str, error: EngineError) -> ClientError {
    ClientError::Negotiation {
        peer_id: peer_id.to_string(),
        reason: error.to_string(),
    }
}

fn mismatch_error(peer_id: &str, error: SdpError) -> ClientError {
    ClientError::ProtocolMismatch {
        peer_id: peer_id.to_string(),
        what: error.to_string(),
    }
}

async fn build_offer<S: MediaSession>(
    session: &Arc<S>,
    config: &PeerConfig,
    queue: &SerialQueue,
    data_channel_open: &CompletionSignal<()>,
) -> Result<MediaOffer, ClientError> {
    let peer_id = &config.peer_id;

    let track = AudioTrack::select(config.audio_file.as_deref(), config.noise)
        .map_err(|e| ClientError::Negotiation {
            peer_id: peer_id.clone(),
            reason: e.to_string(),
        })?;
    session
        .add_audio_source(track)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;

    session
        .create_data_channel(DATA_CHANNEL_LABEL)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;
    {
        let peer_id = peer_id.clone();
        let signal = data_channel_open.clone();
        session.on_data_channel_open(Box::new(move |_| {
            info!("peer {peer_id}: data channel is open");
            if signal.try_set_result(()) {
                emit_session_event(SessionEvent::PeerDataChannelOpen {
                    peer_id: peer_id.clone(),
                });
            }
        }));
    }
    {
        // Messages re-enter the queue so they never race a concurrent
        // join or leave.
        let peer_id = peer_id.clone();
        let queue = queue.clone();
        let handler_session = Arc::clone(session);
        session.on_data_channel_message(Box::new(move |message| {
            debug!("peer {peer_id}: <- enqueuing data channel message");
            let peer_id = peer_id.clone();
            let session = Arc::clone(&handler_session);
            drop(queue.submit(async move {
                handle_data_channel_message(session.as_ref(), &peer_id, &message);
                Ok::<(), ClientError>(())
            }));
        }));
    }

    let offer = session
        .create_offer()
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;
    session
        .set_local_description(SdpKind::Offer, &offer)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;
    debug!("peer {peer_id}: local sdp offer\n{offer}");

    Ok(media_offer_from_params(config, sdp::parse_local_offer(&offer)))
}

fn handle_data_channel_message<S: MediaSession>(session: &S, peer_id: &str, message: &str) {
    if session.is_closed() {
        warn!("peer {peer_id}: data channel message after close, dropping");
        return;
    }
    match serde_json::from_str::<serde_json::Value>(message) {
        Ok(value) => debug!("peer {peer_id}: <- handling: {value}"),
        Err(error) => warn!("peer {peer_id}: unparseable data channel message: {error}"),
    }
    emit_session_event(SessionEvent::PeerDataChannelMessage {
        peer_id: peer_id.to_string(),
    });
}

fn media_offer_from_params(config: &PeerConfig, params: LocalOfferParams) -> MediaOffer {
    MediaOffer {
        channel: ChannelRequest {
            expire: config.expire,
            endpoint: config.peer_id.clone(),
            channel_bundle_id: config.bundle_id.clone(),
            initiator: false,
            rtp_level_relay_type: "translator".to_string(),
            direction: "sendrecv".to_string(),
            sources: vec![params.ssrc_id],
            payload_types: vec![PayloadType {
                id: AUDIO_PAYLOAD_TYPE,
                name: params.codec_name,
                clockrate: params.codec_clockrate,
                channels: params.codec_channels,
                parameters: params.codec_parameters,
            }],
            rtp_hdrexts: vec![RtpHdrExt {
                id: params.hdrext_id,
                uri: params.hdrext_uri,
            }],
        },
        sctp_connection: SctpConnectionRequest {
            expire: config.expire,
            endpoint: config.peer_id.clone(),
            channel_bundle_id: config.bundle_id.clone(),
            initiator: false,
        },
        bundle: BundleRequest {
            id: config.bundle_id.clone(),
            transport: Transport {
                candidates: Vec::new(),
                xmlns: XMLNS_ICE_UDP.to_string(),
                ufrag: params.ufrag,
                rtcp_mux: true,
                pwd: params.pwd,
                fingerprints: vec![Fingerprint {
                    fingerprint: params.fingerprint,
                    setup: params.setup,
                    hash: params.fingerprint_hash,
                }],
            },
        },
        ssrc: params.ssrc_lines,
    }
}

#[allow(clippy::too_many_arguments)]
async fn drive_join<S: MediaSession>(
    session: &Arc<S>,
    config: &PeerConfig,
    conference_id: &str,
    bundle: &ChannelBundle,
    sctp_connection: &SctpConnection,
    remote_ssrcs: &[String],
    ice_connected: &CompletionSignal<()>,
    data_channel_open: &CompletionSignal<()>,
) -> Result<(), ClientError> {
    let peer_id = &config.peer_id;

    {
        let peer_id = peer_id.clone();
        let conference_id = conference_id.to_string();
        let ice = ice_connected.clone();
        let dc = data_channel_open.clone();
        session.on_connection_state_change(Box::new(move |connection_state| {
            info!("peer {peer_id}: ICE connection state became {connection_state:?}");
            match connection_state {
                IceConnectionState::Connected => {
                    if ice.try_set_result(()) {
                        emit_session_event(SessionEvent::PeerIceConnected {
                            peer_id: peer_id.clone(),
                        });
                    }
                }
                IceConnectionState::Failed => {
                    let error = ClientError::IceFailed {
                        peer_id: peer_id.clone(),
                        conference_id: conference_id.clone(),
                    };
                    // Release every waiter at once instead of letting them
                    // sit out a timeout.
                    ice.try_set_error(error.clone());
                    dc.try_set_error(error);
                    emit_session_event(SessionEvent::PeerIceFailed {
                        peer_id: peer_id.clone(),
                        conference_id: conference_id.clone(),
                    });
                }
                _ => {}
            }
        }));
    }

    let answer = sdp::answer_sdp(bundle, sctp_connection).map_err(|e| mismatch_error(peer_id, e))?;
    debug!("peer {peer_id}: bridge sdp answer\n{answer}");
    session
        .set_remote_description(SdpKind::Answer, &answer)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;

    let offer = sdp::offer_sdp(bundle, sctp_connection, remote_ssrcs)
        .map_err(|e| mismatch_error(peer_id, e))?;
    debug!("peer {peer_id}: bridge sdp offer\n{offer}");
    session
        .set_remote_description(SdpKind::Offer, &offer)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;

    let local_answer = session
        .create_answer()
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;
    debug!("peer {peer_id}: local sdp answer\n{local_answer}");
    session
        .set_local_description(SdpKind::Answer, &local_answer)
        .await
        .map_err(|e| negotiation_error(peer_id, e))?;

    if session.ice_gathering_state() == IceGatheringState::Complete {
        info!("peer {peer_id}: ICE gathering already complete");
    } else {
        let gathered: CompletionSignal<()> = CompletionSignal::new();
        {
            let gathered = gathered.clone();
            let peer_id = peer_id.clone();
            session.on_ice_gathering_state_change(Box::new(move |gathering_state| {
                if gathering_state == IceGatheringState::Complete {
                    info!("peer {peer_id}: ICE gathering completed");
                    gathered.try_set_result(());
                }
            }));
        }
        // The engine may have finished between the check and the
        // subscription.
        if session.ice_gathering_state() == IceGatheringState::Complete {
            gathered.try_set_result(());
        }
        gathered.wait().await?;
    }

    Ok(())
}
