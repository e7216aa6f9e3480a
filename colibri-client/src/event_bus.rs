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

//! Global event bus for session lifecycle events.
//!
//! A MPMC broadcast channel: any component can subscribe, every subscriber
//! receives every future event independently. Emission is non-blocking and
//! never fails the emitter; with no subscribers events are simply dropped.

use async_broadcast::{broadcast, Receiver, Sender};
use once_cell::sync::Lazy;

use crate::events::SessionEvent;

/// Capacity of the event bus channel.
const EVENT_BUS_CAPACITY: usize = 256;

static SENDER: Lazy<Sender<SessionEvent>> = Lazy::new(|| {
    let (mut s, r) = broadcast(EVENT_BUS_CAPACITY);
    // Drop the oldest event instead of blocking a full channel.
    s.set_overflow(true);
    std::mem::drop(r);
    s
});

/// The global sender, for components that emit events directly.
pub fn global_session_sender() -> Sender<SessionEvent> {
    SENDER.clone()
}

/// Subscribe to session events. Returns a receiver that observes all
/// events emitted after this call.
pub fn subscribe_session_events() -> Receiver<SessionEvent> {
    SENDER.new_receiver()
}

/// Emit a session event to all subscribers, dropping it if nobody
/// listens.
pub fn emit_session_event(event: SessionEvent) {
    let _ = SENDER.try_broadcast(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_observe_emitted_events() {
        let mut rx = subscribe_session_events();
        emit_session_event(SessionEvent::ConferenceCreated {
            conference_id: "bus-test".to_string(),
        });
        loop {
            match rx.recv().await.unwrap() {
                SessionEvent::ConferenceCreated { conference_id } if conference_id == "bus-test" => {
                    break
                }
                // Events from concurrently running tests share the bus.
                _ => continue,
            }
        }
    }

    #[test]
    fn emission_without_subscribers_is_a_no_op() {
        emit_session_event(SessionEvent::PeerDataChannelOpen {
            peer_id: "peer_0".to_string(),
        });
    }
}
