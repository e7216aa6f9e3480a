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
 */

//! Shared wire types for the colibri conference-creation dialect.
//!
//! The bridge speaks JSON over HTTP: a single `POST /colibri/conferences`
//! request carries every peer's audio channel, data-channel endpoint and
//! ICE/DTLS transport bundle, and the reply describes the allocated
//! conference. This crate models both directions with exact field names
//! (the dialect uses kebab-case keys such as `channel-bundle-id`) and
//! treats optional nested arrays as explicit empty sequences, so consumers
//! never have to reason about missing keys.

pub mod answer;
pub mod requests;

pub use answer::{
    Candidate, Channel, ChannelBundle, ConferenceAnswer, Content, Endpoint, Fingerprint,
    SctpConnection, Transport,
};
pub use requests::{
    BundleRequest, ChannelRequest, ContentRequest, CreateConferenceRequest, PayloadType,
    RtpHdrExt, SctpConnectionRequest,
};

/// XML namespace the bridge expects on every ICE/UDP transport description.
pub const XMLNS_ICE_UDP: &str = "urn:xmpp:jingle:transports:ice-udp:1";

/// Content name carrying the audio channels of a conference.
pub const CONTENT_AUDIO: &str = "audio";

/// Content name carrying the SCTP data-channel connections of a conference.
pub const CONTENT_DATA: &str = "data";

/// Stable identifiers of one simulated participant within a conference.
///
/// Both strings derive from the peer's zero-based index and never change
/// for the lifetime of a conference attempt. The bridge echoes them back in
/// its answer, which is how each peer finds its own slice of the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub peer_id: String,
    pub bundle_id: String,
}

impl PeerIdentity {
    /// Derive the identity for peer `index`: `peer_<i>` / `bundle_peer_<i>`.
    pub fn from_index(index: usize) -> Self {
        let peer_id = format!("peer_{index}");
        let bundle_id = format!("bundle_{peer_id}");
        Self { peer_id, bundle_id }
    }
}
