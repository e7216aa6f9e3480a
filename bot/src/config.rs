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

use serde::{Deserialize, Serialize};
use std::fs;
use url::Url;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BotConfig {
    pub ramp_up_delay_ms: Option<u64>,
    pub bridge_url: String,
    pub calls: Vec<CallConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CallConfig {
    pub peers: usize,
    pub session_time_secs: u64,
    #[serde(default)]
    pub noise: bool,
    #[serde(default)]
    pub audio_file: Option<String>,
    // The bundled signaling-only engine never reaches ICE-connected, so
    // both connectivity waits default to skipped.
    #[serde(default = "default_true")]
    pub no_ice_connectivity_checks: bool,
    #[serde(default = "default_true")]
    pub no_data_channel_opened_checks: bool,
    #[serde(default = "default_expire")]
    pub expire: u32,
}

fn default_true() -> bool {
    true
}

fn default_expire() -> u32 {
    60
}

impl BotConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BotConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn from_env_or_default() -> anyhow::Result<Self> {
        // Try to load from config file first
        if let Ok(config_path) = std::env::var("BOT_CONFIG_PATH") {
            return Self::from_file(&config_path);
        }

        // Fallback to environment variables
        let bridge_url =
            std::env::var("BRIDGE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());

        let calls_count = std::env::var("CALLS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<usize>()
            .unwrap_or(1);

        let peers = std::env::var("PEERS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .unwrap_or(5);

        let session_time_secs = std::env::var("SESSION_TIME_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .unwrap_or(30);

        let noise = std::env::var("NOISE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let audio_file = std::env::var("AUDIO_FILE").ok().filter(|v| !v.is_empty());

        let calls = (0..calls_count)
            .map(|_| CallConfig {
                peers,
                session_time_secs,
                noise,
                audio_file: audio_file.clone(),
                no_ice_connectivity_checks: true,
                no_data_channel_opened_checks: true,
                expire: default_expire(),
            })
            .collect();

        Ok(BotConfig {
            ramp_up_delay_ms: Some(2000),
            bridge_url,
            calls,
        })
    }

    pub fn bridge_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.bridge_url).map_err(|e| anyhow::anyhow!("Invalid bridge URL: {e:?}"))
    }
}
