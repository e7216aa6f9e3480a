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

//! Request-side types: the JSON body of `POST /colibri/conferences`.
//!
//! One request allocates channels, data-channel connections and transport
//! bundles for every peer of a conference at once. The payload-type and
//! header-extension descriptions are extracted from each peer's own local
//! SDP offer before the request is assembled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::answer::Transport;

/// One negotiated RTP payload type (codec name, clock rate, channel count
/// and `a=fmtp` parameters) offered by a peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PayloadType {
    pub id: u8,
    pub name: String,
    pub clockrate: u32,
    pub channels: u32,
    #[serde(default)]
    pub parameters: BTreeMap<String, i64>,
}

/// One RTP header extension offered by a peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RtpHdrExt {
    pub id: u32,
    pub uri: String,
}

/// Audio-channel allocation request for one peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    pub expire: u32,
    pub endpoint: String,
    #[serde(rename = "channel-bundle-id")]
    pub channel_bundle_id: String,
    pub initiator: bool,
    #[serde(rename = "rtp-level-relay-type")]
    pub rtp_level_relay_type: String,
    pub direction: String,
    pub sources: Vec<u32>,
    #[serde(rename = "payload-types")]
    pub payload_types: Vec<PayloadType>,
    #[serde(rename = "rtp-hdrexts")]
    pub rtp_hdrexts: Vec<RtpHdrExt>,
}

/// SCTP data-channel allocation request for one peer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SctpConnectionRequest {
    pub expire: u32,
    pub endpoint: String,
    #[serde(rename = "channel-bundle-id")]
    pub channel_bundle_id: String,
    pub initiator: bool,
}

/// Transport-bundle description for one peer, carrying its ICE credentials
/// and DTLS fingerprint out of the local offer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    pub id: String,
    pub transport: Transport,
}

/// One named content of the request body.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sctpconnections: Vec<SctpConnectionRequest>,
}

/// Complete body of `POST /colibri/conferences`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CreateConferenceRequest {
    pub contents: Vec<ContentRequest>,
    #[serde(rename = "channel-bundles")]
    pub channel_bundles: Vec<BundleRequest>,
}

impl CreateConferenceRequest {
    /// Assemble the request body from per-peer parts, preserving peer order
    /// inside every array.
    pub fn new(
        channels: Vec<ChannelRequest>,
        sctpconnections: Vec<SctpConnectionRequest>,
        channel_bundles: Vec<BundleRequest>,
    ) -> Self {
        Self {
            contents: vec![
                ContentRequest {
                    name: crate::CONTENT_AUDIO.to_string(),
                    channels,
                    sctpconnections: Vec::new(),
                },
                ContentRequest {
                    name: crate::CONTENT_DATA.to_string(),
                    channels: Vec::new(),
                    sctpconnections,
                },
            ],
            channel_bundles,
        }
    }
}
