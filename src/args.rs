// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use serde_json::json;
use tracing::level_filters::LevelFilter;
use zenoh::config::{Config, WhatAmI};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// can device connected to the radar
    #[arg(long, env, default_value = "can1")]
    pub can: String,

    /// The radar is switched off on the bus, publish empty snapshots.
    #[arg(long, env)]
    pub radar_off_can: bool,

    /// The vehicle carries no radar track messages, no decoder is created.
    #[arg(long, env)]
    pub no_radar: bool,

    /// Depth of the queue between the CAN reader and the tracker.
    #[arg(long, env, default_value = "256")]
    pub queue_size: usize,

    /// The name of the radar frame
    #[arg(long, env, default_value = "radar")]
    pub radar_frame_id: String,

    /// radar points topic name
    #[arg(long, default_value = "rt/radar/points")]
    pub points_topic: String,

    /// radar status topic name
    #[arg(long, default_value = "rt/radar/status")]
    pub status_topic: String,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,

    /// Enable Tracy profiler broadcast
    #[arg(long, env)]
    pub tracy: bool,

    /// zenoh connection mode
    #[arg(long, env, default_value = "peer")]
    mode: WhatAmI,

    /// connect to zenoh endpoints
    #[arg(long, env)]
    connect: Vec<String>,

    /// listen to zenoh endpoints
    #[arg(long, env)]
    listen: Vec<String>,

    /// disable zenoh multicast scouting
    #[arg(long, env)]
    no_multicast_scouting: bool,

    /// restrict zenoh multicast scouting to this interface
    #[arg(long, env)]
    multicast_interface: Option<String>,
}

impl TryFrom<Args> for Config {
    type Error = zenoh::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let mut config = Config::default();

        config.insert_json5("mode", &json!(args.mode).to_string())?;

        if !args.connect.is_empty() {
            config.insert_json5("connect/endpoints", &json!(args.connect).to_string())?;
        }

        if !args.listen.is_empty() {
            config.insert_json5("listen/endpoints", &json!(args.listen).to_string())?;
        }

        if args.no_multicast_scouting {
            config.insert_json5("scouting/multicast/enabled", &json!(false).to_string())?;
        }

        if let Some(interface) = args.multicast_interface {
            config.insert_json5("scouting/multicast/interface", &json!(interface).to_string())?;
        }

        Ok(config)
    }
}
