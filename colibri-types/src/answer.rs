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

//! Answer-side types: the JSON the bridge returns from
//! `POST /colibri/conferences`.
//!
//! The reply is immutable once parsed; every peer reads its own
//! channel-bundle, endpoint, audio channel and SCTP connection out of it by
//! identifier match. Arrays the bridge may omit deserialize as empty
//! vectors instead of surfacing as missing keys.

use serde::{Deserialize, Serialize};

use crate::{CONTENT_AUDIO, CONTENT_DATA};

/// DTLS fingerprint of one side of a transport.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub fingerprint: String,
    pub setup: String,
    pub hash: String,
}

/// One ICE candidate inside a channel-bundle's transport.
///
/// A transport may list candidates of different protocols (udp/tcp);
/// exactly one is selected when synthesizing SDP.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Candidate {
    #[serde(default)]
    pub generation: u32,
    #[serde(default)]
    pub component: u32,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub tcptype: String,
    #[serde(default)]
    pub foundation: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(rename = "type", default)]
    pub candidate_type: String,
    #[serde(default)]
    pub network: u32,
}

/// ICE/DTLS transport parameters of one channel-bundle.
///
/// Serves both directions: requests carry no candidates (the list stays
/// empty and is skipped on serialization), answers usually carry several.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Transport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
    pub xmlns: String,
    #[serde(default)]
    pub ufrag: String,
    #[serde(rename = "rtcp-mux", default)]
    pub rtcp_mux: bool,
    #[serde(default)]
    pub pwd: String,
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
}

/// The bridge's grouping of one peer's transport parameters.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChannelBundle {
    pub id: String,
    pub transport: Transport,
}

/// A conference participant as the bridge sees it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: String,
}

/// One allocated audio channel in the answer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Channel {
    #[serde(default)]
    pub endpoint: String,
    #[serde(rename = "channel-bundle-id", default)]
    pub channel_bundle_id: String,
    #[serde(default)]
    pub sources: Vec<u32>,
    #[serde(default)]
    pub ssrcs: Vec<u32>,
    #[serde(rename = "rtp-level-relay-type", default)]
    pub rtp_level_relay_type: String,
    #[serde(default)]
    pub expire: u32,
    #[serde(default)]
    pub initiator: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub direction: String,
}

/// One allocated SCTP data-channel connection in the answer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct SctpConnection {
    #[serde(default)]
    pub endpoint: String,
    #[serde(rename = "channel-bundle-id", default)]
    pub channel_bundle_id: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub expire: u32,
    #[serde(default)]
    pub initiator: bool,
    #[serde(default)]
    pub id: String,
}

/// One named content of the answer: `audio` carries channels, `data`
/// carries sctpconnections.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Content {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub sctpconnections: Vec<SctpConnection>,
}

/// The bridge's reply to a create-conference request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConferenceAnswer {
    #[serde(rename = "channel-bundles", default)]
    pub channel_bundles: Vec<ChannelBundle>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub id: String,
}

impl ConferenceAnswer {
    /// Find the channel-bundle with the given id.
    pub fn bundle(&self, bundle_id: &str) -> Option<&ChannelBundle> {
        self.channel_bundles.iter().find(|b| b.id == bundle_id)
    }

    /// Find the endpoint with the given id.
    pub fn endpoint(&self, peer_id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == peer_id)
    }

    /// Find the audio channel belonging to `peer_id`.
    ///
    /// The last channel whose `endpoint` equals the peer id wins over one
    /// whose `id` equals it; bridges differ in which of the two they echo.
    pub fn audio_channel(&self, peer_id: &str) -> Option<&Channel> {
        let channels = self
            .contents
            .iter()
            .filter(|c| c.name == CONTENT_AUDIO)
            .flat_map(|c| c.channels.iter());
        let mut by_endpoint = None;
        let mut by_id = None;
        for channel in channels {
            if channel.endpoint == peer_id {
                by_endpoint = Some(channel);
            }
            if channel.id == peer_id && by_id.is_none() {
                by_id = Some(channel);
            }
        }
        by_endpoint.or(by_id)
    }

    /// Find the SCTP connection belonging to `peer_id`, with the same
    /// endpoint-over-id precedence as [`audio_channel`](Self::audio_channel).
    pub fn sctp_connection(&self, peer_id: &str) -> Option<&SctpConnection> {
        let connections = self
            .contents
            .iter()
            .filter(|c| c.name == CONTENT_DATA)
            .flat_map(|c| c.sctpconnections.iter());
        let mut by_endpoint = None;
        let mut by_id = None;
        for connection in connections {
            if connection.endpoint == peer_id {
                by_endpoint = Some(connection);
            }
            if connection.id == peer_id && by_id.is_none() {
                by_id = Some(connection);
            }
        }
        by_endpoint.or(by_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_answer() -> ConferenceAnswer {
        serde_json::from_str(
            r#"{
                "id": "abc123",
                "channel-bundles": [
                    {
                        "id": "bundle_peer_0",
                        "transport": {
                            "xmlns": "urn:xmpp:jingle:transports:ice-udp:1",
                            "rtcp-mux": true,
                            "ufrag": "u0",
                            "pwd": "p0",
                            "fingerprints": [
                                { "fingerprint": "AA:BB", "setup": "actpass", "hash": "sha-256" }
                            ],
                            "candidates": [
                                {
                                    "generation": 0,
                                    "component": 1,
                                    "protocol": "udp",
                                    "port": 10000,
                                    "ip": "198.51.100.7",
                                    "foundation": "1",
                                    "id": "cand1",
                                    "priority": 2130706431,
                                    "type": "host",
                                    "network": 0
                                }
                            ]
                        }
                    }
                ],
                "endpoints": [{ "id": "peer_0" }],
                "contents": [
                    {
                        "name": "audio",
                        "channels": [
                            {
                                "endpoint": "peer_0",
                                "channel-bundle-id": "bundle_peer_0",
                                "sources": [1234],
                                "ssrcs": [1234],
                                "rtp-level-relay-type": "translator",
                                "expire": 60,
                                "initiator": true,
                                "id": "chan0",
                                "direction": "sendrecv"
                            }
                        ]
                    },
                    {
                        "name": "data",
                        "sctpconnections": [
                            {
                                "endpoint": "peer_0",
                                "channel-bundle-id": "bundle_peer_0",
                                "port": 5000,
                                "expire": 60,
                                "initiator": true,
                                "id": "sctp0"
                            }
                        ]
                    }
                ]
            }"#,
        )
        .expect("sample answer parses")
    }

    #[test]
    fn parses_bridge_reply() {
        let answer = sample_answer();
        assert_eq!(answer.id, "abc123");
        assert_eq!(answer.channel_bundles.len(), 1);
        let transport = &answer.channel_bundles[0].transport;
        assert!(transport.rtcp_mux);
        assert_eq!(transport.candidates[0].candidate_type, "host");
        assert_eq!(transport.candidates[0].port, 10000);
    }

    #[test]
    fn missing_arrays_deserialize_empty() {
        let answer: ConferenceAnswer =
            serde_json::from_str(r#"{ "id": "x", "contents": [{ "name": "audio" }] }"#).unwrap();
        assert!(answer.channel_bundles.is_empty());
        assert!(answer.endpoints.is_empty());
        assert!(answer.contents[0].channels.is_empty());
    }

    #[test]
    fn finds_channel_and_connection_by_peer() {
        let answer = sample_answer();
        assert_eq!(answer.audio_channel("peer_0").unwrap().id, "chan0");
        assert_eq!(answer.sctp_connection("peer_0").unwrap().id, "sctp0");
        assert!(answer.audio_channel("peer_1").is_none());
        assert!(answer.sctp_connection("peer_1").is_none());
    }

    #[test]
    fn endpoint_match_wins_over_id_match() {
        let mut answer = sample_answer();
        // A second channel whose *id* collides with peer_0's endpoint id.
        answer.contents[0].channels.push(Channel {
            id: "peer_0".into(),
            endpoint: "someone_else".into(),
            ..Default::default()
        });
        assert_eq!(answer.audio_channel("peer_0").unwrap().id, "chan0");

        // With no endpoint match at all, the id match is used.
        answer.contents[0].channels[0].endpoint = "renamed".into();
        assert_eq!(answer.audio_channel("peer_0").unwrap().endpoint, "someone_else");
    }

    #[test]
    fn missing_bundle_and_endpoint_return_none() {
        let answer = sample_answer();
        assert!(answer.bundle("bundle_peer_1").is_none());
        assert!(answer.endpoint("peer_1").is_none());
        assert!(answer.bundle("bundle_peer_0").is_some());
        assert!(answer.endpoint("peer_0").is_some());
    }
}
