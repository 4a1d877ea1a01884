// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use log::{debug, warn};
use radartrack::{
    can::read_frame,
    decoder::{RadarDecoder, TrackMessage},
    sweep::{slot, Signal},
    tracker::{RadarData, RadarTracker, CYCLE_PERIOD},
};
use socketcan::tokio::CanSocket;
use tokio::time::MissedTickBehavior;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CAN device to use
    #[arg(short, long, default_value = "can1")]
    device: String,

    /// Print the decoded signals of every radar track message.
    #[arg(short, long)]
    raw: bool,

    /// Stop after this many snapshots.
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

fn print_message(id: u32, msg: &TrackMessage) {
    let signals: Vec<_> = Signal::ALL
        .iter()
        .map(|signal| format!("{}={}", signal, msg.get(*signal)))
        .collect();
    println!("{:#x}: {}", id, signals.join(" "));
}

fn print_snapshot(data: &RadarData) {
    let errors: Vec<_> = data.errors.iter().map(|err| err.to_string()).collect();
    println!("snapshot errors=[{}] points={}", errors.join(","), data.points.len());
    for p in &data.points {
        println!(
            "  track {:>6} d_rel={:7.2} y_rel={:7.2} v_rel={:7.2} a_rel={:6.2}",
            p.track_id, p.d_rel, p.y_rel, p.v_rel, p.a_rel
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    debug!("opening can interface {}", args.device);
    let sock = CanSocket::open(&args.device)?;
    let mut tracker = RadarTracker::new(false, Some(RadarDecoder::new()));
    let mut snapshots = 0;
    let mut batch = Vec::new();
    let mut interval = tokio::time::interval(CYCLE_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(data) = tracker.update(&batch) {
                    print_snapshot(&data);
                    snapshots += 1;
                    if args.count.is_some_and(|count| snapshots >= count) {
                        return Ok(());
                    }
                }
                batch.clear();
            }
            res = read_frame(&sock) => match res {
                Ok(pkt) => {
                    if args.raw && slot(pkt.id).is_some() {
                        print_message(pkt.id, &TrackMessage::from(pkt.data));
                    }
                    batch.push(pkt);
                }
                Err(err) => warn!("{}", err),
            },
        }
    }
}
