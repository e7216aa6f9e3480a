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

use std::path::PathBuf;
use std::time::Duration;

use colibri_client::{ConferenceCallbacks, ConferenceOptions, ConferenceOrchestrator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::{BotConfig, CallConfig};
use engine::SignalingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BotConfig::from_env_or_default()?;
    let bridge_url = config.bridge_url()?;
    info!(
        "starting {} call(s) against {bridge_url}",
        config.calls.len()
    );

    let ramp_up = Duration::from_millis(config.ramp_up_delay_ms.unwrap_or(2000));
    let calls_count = config.calls.len();
    let mut handles = Vec::with_capacity(calls_count);
    for (call_id, call) in config.calls.iter().cloned().enumerate() {
        handles.push(tokio::spawn(run_call(
            call_id,
            config.bridge_url.clone(),
            call,
        )));
        if call_id + 1 < calls_count {
            tokio::time::sleep(ramp_up).await;
        }
    }

    let mut failed = 0usize;
    for (call_id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(Ok(())) => info!("call #{call_id}: completed"),
            Ok(Err(e)) => {
                error!("call #{call_id}: failed: {e}");
                failed += 1;
            }
            Err(e) => {
                error!("call #{call_id}: panicked: {e}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {calls_count} call(s) failed");
    }
    Ok(())
}

async fn run_call(call_id: usize, endpoint: String, call: CallConfig) -> anyhow::Result<()> {
    info!("call #{call_id}: simulating {} peers", call.peers);

    let options = ConferenceOptions {
        bridge_endpoint: endpoint,
        peers_count: call.peers,
        session_time: Duration::from_secs(call.session_time_secs),
        no_ice_connectivity_checks: call.no_ice_connectivity_checks,
        no_data_channel_opened_checks: call.no_data_channel_opened_checks,
        noise: call.noise,
        audio_file: call.audio_file.clone().map(PathBuf::from),
        expire: call.expire,
    };
    let callbacks = ConferenceCallbacks {
        on_conference_created: Box::new(move |result| match result {
            Ok(id) => info!("call #{call_id}: conference {id} created"),
            Err(e) => error!("call #{call_id}: conference creation failed: {e}"),
        }),
        on_all_peers_joined: Box::new(move |result| match result {
            Ok(()) => info!("call #{call_id}: all peers joined"),
            Err(e) => error!("call #{call_id}: join phase failed: {e}"),
        }),
        on_all_peers_connected: Box::new(move |result| match result {
            Ok(()) => info!("call #{call_id}: all peers connected"),
            Err(e) => error!("call #{call_id}: connect phase failed: {e}"),
        }),
        on_all_peers_left: Box::new(move |result| match result {
            Ok(()) => info!("call #{call_id}: all peers left"),
            Err(e) => error!("call #{call_id}: leave phase failed: {e}"),
        }),
    };

    ConferenceOrchestrator::new(SignalingEngine::new(), options, callbacks)
        .run()
        .await?;
    Ok(())
}
