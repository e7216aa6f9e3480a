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

//! Error types for the colibri client.
//!
//! All variants are `Clone`: a completion signal memoizes one terminal
//! outcome and replays it to every waiter, so error sources are flattened
//! to strings instead of being carried as non-cloneable causes.

use thiserror::Error;

use crate::peer::PeerState;

/// Errors produced by peers, the bridge client and the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The media engine failed during offer/answer/ICE work. Fatal to the
    /// affected peer; never retried.
    #[error("negotiation failed for peer {peer_id}: {reason}")]
    Negotiation { peer_id: String, reason: String },

    /// The bridge's answer is missing data this peer needs. Fatal to the
    /// whole conference attempt.
    #[error("bridge answer is missing {what} for peer {peer_id}")]
    ProtocolMismatch { peer_id: String, what: String },

    /// The conference RPC could not reach the bridge or returned an
    /// unreadable body. Fatal to the attempt.
    #[error("bridge request failed: {0}")]
    Transport(String),

    /// The media engine reported an explicit ICE failure. Releases every
    /// waiter on the affected peer; sibling peers continue.
    #[error("ICE connection of peer {peer_id} to conference {conference_id} has failed")]
    IceFailed {
        peer_id: String,
        conference_id: String,
    },

    /// An operation was invoked in a lifecycle state that does not allow it.
    #[error("peer {peer_id} cannot {operation} in state {state:?}")]
    InvalidState {
        peer_id: String,
        operation: &'static str,
        state: PeerState,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError::Transport(error.to_string())
    }
}
