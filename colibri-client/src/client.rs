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

//! REST client for the bridge's conference-creation RPC.

use colibri_types::{ConferenceAnswer, CreateConferenceRequest};
use log::{debug, info, warn};
use reqwest::Client;

use crate::engine::MediaSession;
use crate::error::ClientError;
use crate::peer::Peer;

/// Outcome of a successful conference-creation round-trip.
///
/// `ssrcs[i]` is peer `i`'s raw synchronization-source text; every other
/// peer's synthetic offer needs it later.
#[derive(Debug, Clone)]
pub struct CreatedConference {
    pub answer: ConferenceAnswer,
    pub ssrcs: Vec<String>,
}

/// A typed client for the bridge's `POST /colibri/conferences` endpoint.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    base_url: String,
    http: Client,
}

impl BridgeClient {
    /// Create a new client pointing at the bridge base URL,
    /// e.g. `"http://127.0.0.1:8080"`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Allocate one conference for all `peers`.
    ///
    /// Offers are collected sequentially in peer order, so the returned
    /// `ssrcs` align with peer indexes. The reply body is parsed as a
    /// [`ConferenceAnswer`] regardless of HTTP status: a non-success
    /// status is logged, and semantic failure surfaces later as missing
    /// fields during the join phase.
    pub async fn create_conference<S: MediaSession>(
        &self,
        peers: &[Peer<S>],
    ) -> Result<CreatedConference, ClientError> {
        let mut channels = Vec::with_capacity(peers.len());
        let mut sctpconnections = Vec::with_capacity(peers.len());
        let mut bundles = Vec::with_capacity(peers.len());
        let mut ssrcs = Vec::with_capacity(peers.len());

        for peer in peers {
            let offer = peer.create_offer().await?;
            channels.push(offer.channel);
            sctpconnections.push(offer.sctp_connection);
            bundles.push(offer.bundle);
            ssrcs.push(offer.ssrc);
        }

        let request = CreateConferenceRequest::new(channels, sctpconnections, bundles);
        let url = format!("{}/colibri/conferences", self.base_url);
        info!("create_conference: POST {url} with {} peers", peers.len());
        debug!(
            "create_conference: request body: {}",
            serde_json::to_string(&request).unwrap_or_default()
        );

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("create_conference: bridge replied with status {status}");
        }
        let answer: ConferenceAnswer = response.json().await?;
        info!("create_conference: conference id {}", answer.id);

        Ok(CreatedConference { answer, ssrcs })
    }
}
