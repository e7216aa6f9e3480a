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

//! Translation between the bridge's JSON transport description and the SDP
//! text the media engine's offer/answer API understands.
//!
//! Outbound, a peer's slice of the bridge answer (channel-bundle + SCTP
//! connection) becomes a synthetic SDP answer and a synthetic SDP offer.
//! Inbound, the engine's self-generated offer is scanned for the handful
//! of attributes the bridge request needs. This is a private grammar over
//! exactly those attributes, not a general SDP parser.

use std::collections::BTreeMap;

use colibri_types::{Candidate, ChannelBundle, Fingerprint, SctpConnection, Transport};
use thiserror::Error;

/// The single fixed audio payload type the bridge dialect negotiates.
pub const AUDIO_PAYLOAD_TYPE: u8 = 111;

const DUMMY_PORT: u16 = 9;
const AUDIO_LEVEL_EXTMAP: &str = "extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level";
const OPUS_RTPMAP: &str = "opus/48000/2";
const OPUS_FMTP: &str = "useinbandfec=1;minptime=10";

/// SDP synthesis failures: the bridge answer lacked data the media lines
/// cannot be written without.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdpError {
    #[error("transport has no ICE candidates")]
    NoCandidates,
    #[error("transport has no DTLS fingerprint")]
    NoFingerprint,
}

/// Pick the transport candidate the synthetic SDP will reference.
///
/// The last UDP candidate in list order wins (later entries override
/// earlier ones); if the list has no UDP candidate, the first entry is
/// used.
pub fn select_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .rev()
        .find(|c| c.protocol == "udp")
        .or_else(|| candidates.first())
}

/// Synthesize the bridge-side SDP answer for one peer: a single `recvonly`
/// audio line and a data-channel line, both bound to the bundle's ICE
/// credentials and DTLS fingerprint, with the transport role fixed to
/// `passive`.
pub fn answer_sdp(bundle: &ChannelBundle, sctp: &SctpConnection) -> Result<String, SdpError> {
    let transport = &bundle.transport;
    let candidate = select_candidate(&transport.candidates).ok_or(SdpError::NoCandidates)?;
    let fingerprint = transport.fingerprints.first().ok_or(SdpError::NoFingerprint)?;

    let mut sdp = session_preamble("0 1");
    sdp.push_str(&audio_section(
        transport,
        fingerprint,
        candidate,
        "recvonly",
        0,
        None,
    ));
    sdp.push_str(&application_section(transport, fingerprint, sctp.port));
    Ok(sdp)
}

/// Synthesize the bridge-side SDP offer for one peer: the same transport
/// parameters as the answer, plus one `sendrecv` audio section per remote
/// peer carrying that peer's raw synchronization-source lines under a
/// distinct media-identification tag.
pub fn offer_sdp(
    bundle: &ChannelBundle,
    sctp: &SctpConnection,
    remote_ssrcs: &[String],
) -> Result<String, SdpError> {
    let transport = &bundle.transport;
    let candidate = select_candidate(&transport.candidates).ok_or(SdpError::NoCandidates)?;
    let fingerprint = transport.fingerprints.first().ok_or(SdpError::NoFingerprint)?;

    let mut mids = String::from("0 1");
    for index in 0..remote_ssrcs.len() {
        mids.push_str(&format!(" {}", index + 2));
    }

    let mut sdp = session_preamble(&mids);
    sdp.push_str(&audio_section(
        transport,
        fingerprint,
        candidate,
        "recvonly",
        0,
        None,
    ));
    sdp.push_str(&application_section(transport, fingerprint, sctp.port));
    for (index, ssrc) in remote_ssrcs.iter().enumerate() {
        sdp.push_str(&audio_section(
            transport,
            fingerprint,
            candidate,
            "sendrecv",
            index + 2,
            Some(ssrc),
        ));
    }
    Ok(sdp)
}

fn session_preamble(mids: &str) -> String {
    format!(
        "v=0\n\
         o=jvb 1 1 IN IP4 0.0.0.0\n\
         s=-\n\
         c=IN IP4 0.0.0.0\n\
         t=0 0\n\
         a=ice-options:trickle\n\
         a=group:BUNDLE {mids}\n\
         a=msid-semantic:WMS *\n"
    )
}

fn audio_section(
    transport: &Transport,
    fingerprint: &Fingerprint,
    candidate: &Candidate,
    direction: &str,
    mid: usize,
    ssrc_lines: Option<&str>,
) -> String {
    let mut section = format!(
        "m=audio {DUMMY_PORT} UDP/TLS/RTP/SAVPF {AUDIO_PAYLOAD_TYPE}\n\
         a=ice-pwd:{pwd}\n\
         a=ice-ufrag:{ufrag}\n\
         a=setup:passive\n\
         a=fingerprint:{hash} {fp}\n\
         {candidate}\n\
         a={direction}\n\
         a=rtcp:{DUMMY_PORT} IN IP4 0.0.0.0\n\
         a=mid:{mid}\n\
         a={AUDIO_LEVEL_EXTMAP}\n\
         a=rtpmap:{AUDIO_PAYLOAD_TYPE} {OPUS_RTPMAP}\n\
         a=fmtp:{AUDIO_PAYLOAD_TYPE} {OPUS_FMTP}\n\
         a=rtcp-mux\n\
         a=bundle-only\n",
        pwd = transport.pwd,
        ufrag = transport.ufrag,
        hash = fingerprint.hash,
        fp = fingerprint.fingerprint,
        candidate = candidate_line(candidate),
    );
    if let Some(ssrc) = ssrc_lines {
        section.push_str(ssrc);
        section.push('\n');
    }
    section
}

fn application_section(transport: &Transport, fingerprint: &Fingerprint, port: u16) -> String {
    format!(
        "m=application {DUMMY_PORT} UDP/DTLS/SCTP webrtc-datachannel\n\
         a=sctp-port:{port}\n\
         a=bundle-only\n\
         a=sendrecv\n\
         a=mid:1\n\
         a=ice-pwd:{pwd}\n\
         a=ice-ufrag:{ufrag}\n\
         a=setup:passive\n\
         a=fingerprint:{hash} {fp}\n",
        pwd = transport.pwd,
        ufrag = transport.ufrag,
        hash = fingerprint.hash,
        fp = fingerprint.fingerprint,
    )
}

fn candidate_line(candidate: &Candidate) -> String {
    format!(
        "a=candidate:{foundation} {component} {protocol} {priority} {ip} {port} typ {kind} {generation}",
        foundation = candidate.foundation,
        component = candidate.component,
        protocol = candidate.protocol,
        priority = candidate.priority,
        ip = candidate.ip,
        port = candidate.port,
        kind = candidate.candidate_type,
        generation = candidate.generation,
    )
}

/// Parameters extracted from the media engine's self-generated offer.
///
/// Every field is optional at this layer: a missing attribute leaves its
/// field empty or zero rather than failing; the bridge rejects what it
/// cannot consume later. The DTLS role is always `active`, since the peer
/// that produced this offer is the initiating side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalOfferParams {
    pub ufrag: String,
    pub pwd: String,
    pub fingerprint_hash: String,
    pub fingerprint: String,
    pub setup: String,
    pub ssrc_id: u32,
    /// All `a=ssrc:` lines, verbatim, joined with `\n`.
    pub ssrc_lines: String,
    pub codec_name: String,
    pub codec_clockrate: u32,
    pub codec_channels: u32,
    pub codec_parameters: BTreeMap<String, i64>,
    pub hdrext_id: u32,
    pub hdrext_uri: String,
}

/// Scan the engine's local offer for the attributes the bridge request
/// needs. First occurrence wins for single-valued attributes.
pub fn parse_local_offer(sdp: &str) -> LocalOfferParams {
    let rtpmap_prefix = format!("a=rtpmap:{AUDIO_PAYLOAD_TYPE} ");
    let fmtp_prefix = format!("a=fmtp:{AUDIO_PAYLOAD_TYPE} ");

    let mut params = LocalOfferParams {
        setup: "active".to_string(),
        ..Default::default()
    };
    let mut ssrc_id: Option<u32> = None;
    let mut ssrc_lines: Vec<&str> = Vec::new();

    for raw in sdp.lines() {
        let line = raw.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("a=ice-ufrag:") {
            if params.ufrag.is_empty() {
                params.ufrag = value.to_string();
            }
        } else if let Some(value) = line.strip_prefix("a=ice-pwd:") {
            if params.pwd.is_empty() {
                params.pwd = value.to_string();
            }
        } else if let Some(value) = line.strip_prefix("a=fingerprint:") {
            if params.fingerprint.is_empty() {
                let mut parts = value.splitn(2, ' ');
                params.fingerprint_hash = parts.next().unwrap_or_default().to_string();
                params.fingerprint = parts.next().unwrap_or_default().to_string();
            }
        } else if let Some(value) = line.strip_prefix("a=ssrc:") {
            if ssrc_id.is_none() {
                ssrc_id = value
                    .split_whitespace()
                    .next()
                    .and_then(|id| id.parse().ok());
            }
            ssrc_lines.push(line);
        } else if let Some(value) = line.strip_prefix(rtpmap_prefix.as_str()) {
            if params.codec_name.is_empty() {
                let mut parts = value.split('/');
                params.codec_name = parts.next().unwrap_or_default().to_string();
                params.codec_clockrate = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
                params.codec_channels = parts.next().and_then(|v| v.parse().ok()).unwrap_or(0);
            }
        } else if let Some(value) = line.strip_prefix(fmtp_prefix.as_str()) {
            if params.codec_parameters.is_empty() {
                params.codec_parameters = parse_format_parameters(value);
            }
        } else if let Some(value) = line.strip_prefix("a=extmap:") {
            if params.hdrext_uri.is_empty() {
                let mut parts = value.split_whitespace();
                params.hdrext_id = parts.next().and_then(|id| id.parse().ok()).unwrap_or(0);
                params.hdrext_uri = parts.next().unwrap_or_default().to_string();
            }
        }
    }

    params.ssrc_id = ssrc_id.unwrap_or(0);
    params.ssrc_lines = ssrc_lines.join("\n");
    params
}

/// Parse `key=value;key=value` codec format parameters, values as
/// integers. Pairs without an integer value are skipped.
pub fn parse_format_parameters(raw: &str) -> BTreeMap<String, i64> {
    let mut parameters = BTreeMap::new();
    for pair in raw.split(';') {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next().unwrap_or_default().trim();
        if key.is_empty() {
            continue;
        }
        if let Some(Ok(value)) = kv.next().map(|v| v.trim().parse::<i64>()) {
            parameters.insert(key.to_string(), value);
        }
    }
    parameters
}
