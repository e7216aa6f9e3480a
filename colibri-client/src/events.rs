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

//! Structured lifecycle events emitted by peers and the orchestrator.
//!
//! Test harnesses and embedding applications subscribe to these instead of
//! string-matching log output.

use crate::peer::PeerState;

/// Phases of one conference attempt, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    CreatingConference,
    Joining,
    Connecting,
    Holding,
    Leaving,
}

/// Events emitted on the session event bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    // === Conference events ===
    /// The bridge allocated a conference.
    ConferenceCreated { conference_id: String },

    /// The orchestrator entered a new lifecycle phase.
    PhaseStarted { phase: LifecyclePhase },

    // === Peer events ===
    /// A peer's state machine moved to a new state.
    PeerStateChanged { peer_id: String, state: PeerState },

    /// A peer's ICE connection reached the connected state.
    PeerIceConnected { peer_id: String },

    /// A peer's ICE connection failed; its waiters have been released.
    PeerIceFailed {
        peer_id: String,
        conference_id: String,
    },

    /// A peer's data channel opened.
    PeerDataChannelOpen { peer_id: String },

    /// A peer received a data-channel message.
    PeerDataChannelMessage { peer_id: String },
}
