// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_schemas::{builtin_interfaces::Time, sensor_msgs, serde_cdr, std_msgs};
use kanal::{AsyncReceiver, AsyncSender};
use radartrack::{
    can::{read_frame, Error as CanError},
    common::{monotonic_ns, set_process_priority},
    decoder::{Packet, RadarDecoder},
    tracker::{RadarData, RadarTracker, CYCLE_PERIOD},
};
use serde_json::json;
use socketcan::tokio::CanSocket;
use std::{thread, time::Duration};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};
use tracy_client::{frame_mark, plot};
use zenoh::{
    bytes::{Encoding, ZBytes},
    pubsub::Publisher,
    qos::{CongestionControl, Priority},
    Session,
};

#[cfg(feature = "profiling")]
#[global_allocator]
static GLOBAL: tracy_client::ProfiledAllocator<std::alloc::System> =
    tracy_client::ProfiledAllocator::new(std::alloc::System, 100);

/// Snapshot period while the radar is disabled.
const DISABLED_PERIOD: Duration = Duration::from_millis(50);

#[derive(Debug)]
#[allow(dead_code)]
pub enum PointFieldType {
    INT8 = 1,
    UINT8 = 2,
    INT16 = 3,
    UINT16 = 4,
    INT32 = 5,
    UINT32 = 6,
    FLOAT32 = 7,
    FLOAT64 = 8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    args.tracy.then(tracy_client::Client::start);

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let tracy = match args.tracy {
        true => Some(tracing_tracy::TracyLayer::default().with_filter(args.rust_log)),
        false => None,
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    let session = zenoh::open(args.clone())
        .await
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    let decoder = match args.no_radar {
        true => None,
        false => Some(RadarDecoder::new()),
    };
    let tracker = RadarTracker::new(args.radar_off_can, decoder);

    if tracker.is_disabled() {
        info!(
            "radar disabled: radar_off_can={} no_radar={}",
            args.radar_off_can, args.no_radar
        );
        return disabled_loop(tracker, session, args).await;
    }

    let (tx, rx) = kanal::bounded_async(args.queue_size);
    let device = args.can.clone();

    thread::Builder::new()
        .name("can_read".to_string())
        .spawn(move || {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(can_read(device, tx)),
                Err(err) => error!("can_read runtime error: {:?}", err),
            }
        })?;

    stream(tracker, session, args, rx).await
}

/// Forwards every data frame on the radar bus to the tracker.  Dropping the
/// sender on failure ends the tracking loop.
async fn can_read(device: String, tx: AsyncSender<Packet>) {
    set_process_priority();

    let can = match CanSocket::open(&device) {
        Ok(can) => can,
        Err(err) => {
            error!("unable to open {}: {}", device, err);
            return;
        }
    };
    info!("reading radar tracks from {}", device);

    loop {
        match read_frame(&can).await {
            Ok(pkt) => {
                if tx.send(pkt).await.is_err() {
                    debug!("tracker closed, stopping can_read");
                    return;
                }
            }
            Err(CanError::Io(err)) => error!("canbus error: {:?}", err),
            Err(err) => warn!("canbus: {}", err),
        }
    }
}

async fn stream(
    mut tracker: RadarTracker<RadarDecoder>,
    session: Session,
    args: Args,
    rx: AsyncReceiver<Packet>,
) -> Result<(), Box<dyn std::error::Error>> {
    let points_publisher = declare_publisher(&session, &args.points_topic).await?;
    let status_publisher = declare_publisher(&session, &args.status_topic).await?;

    let mut batch = Vec::with_capacity(args.queue_size);
    let mut interval = tokio::time::interval(CYCLE_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        // A cycle is everything queued since the previous tick, possibly
        // nothing.
        batch.clear();
        while let Some(pkt) = rx.try_recv()? {
            batch.push(pkt);
        }
        args.tracy.then(|| plot!("batch", batch.len() as f64));

        let Some(data) = info_span!("tracker_update").in_scope(|| tracker.update(&batch)) else {
            continue;
        };

        publish(&points_publisher, &status_publisher, &data, &args).await?;
    }
}

async fn disabled_loop(
    mut tracker: RadarTracker<RadarDecoder>,
    session: Session,
    args: Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let points_publisher = declare_publisher(&session, &args.points_topic).await?;
    let status_publisher = declare_publisher(&session, &args.status_topic).await?;
    let mut interval = tokio::time::interval(DISABLED_PERIOD);

    loop {
        interval.tick().await;
        if let Some(data) = tracker.update(&[]) {
            publish(&points_publisher, &status_publisher, &data, &args).await?;
        }
    }
}

async fn declare_publisher<'a>(
    session: &'a Session,
    topic: &str,
) -> Result<Publisher<'a>, Box<dyn std::error::Error>> {
    let publisher = session
        .declare_publisher(topic.to_string())
        .priority(Priority::DataHigh)
        .congestion_control(CongestionControl::Drop)
        .await
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;
    Ok(publisher)
}

async fn publish(
    points_publisher: &Publisher<'_>,
    status_publisher: &Publisher<'_>,
    data: &RadarData,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    args.tracy.then(|| plot!("points", data.points.len() as f64));

    if !data.errors.is_empty() {
        warn!("radar errors: {:?}", data.errors);
    }

    let (msg, enc) = format_points(data, &args.radar_frame_id)?;
    let span = info_span!("points_publish");
    async {
        match points_publisher.put(msg).encoding(enc).await {
            Ok(_) => {}
            Err(e) => error!("{} publish error: {:?}", args.points_topic, e),
        }
    }
    .instrument(span)
    .await;

    let (msg, enc) = format_status(data);
    match status_publisher.put(msg).encoding(enc).await {
        Ok(_) => {}
        Err(e) => error!("{} publish error: {:?}", args.status_topic, e),
    }

    args.tracy.then(frame_mark);
    Ok(())
}

#[instrument(skip_all)]
fn format_points(
    data: &RadarData,
    frame_id: &str,
) -> Result<(ZBytes, Encoding), Box<dyn std::error::Error>> {
    let n_points = data.points.len() as u32;
    let bytes: Vec<_> = data
        .points
        .iter()
        .flat_map(|point| {
            [
                (point.d_rel as f32).to_ne_bytes(),
                (point.y_rel as f32).to_ne_bytes(),
                0.0f32.to_ne_bytes(),
                (point.v_rel as f32).to_ne_bytes(),
                (point.a_rel as f32).to_ne_bytes(),
                (point.track_id as u32).to_ne_bytes(),
            ]
        })
        .flatten()
        .collect();

    // Track ids are integers, a float field would merge ids past 2^24.
    let fields = [
        ("x", PointFieldType::FLOAT32),
        ("y", PointFieldType::FLOAT32),
        ("z", PointFieldType::FLOAT32),
        ("speed", PointFieldType::FLOAT32),
        ("accel", PointFieldType::FLOAT32),
        ("track_id", PointFieldType::UINT32),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, datatype))| sensor_msgs::PointField {
        name: name.to_string(),
        offset: 4 * i as u32,
        datatype: datatype as u8,
        count: 1,
    })
    .collect();

    let msg = sensor_msgs::PointCloud2 {
        header: std_msgs::Header {
            stamp: timestamp()?,
            frame_id: frame_id.to_string(),
        },
        height: 1,
        width: n_points,
        fields,
        is_bigendian: false,
        point_step: 24,
        row_step: 24 * n_points,
        data: bytes,
        is_dense: true,
    };

    let msg = ZBytes::from(serde_cdr::serialize(&msg)?);
    let enc = Encoding::APPLICATION_CDR.with_schema("sensor_msgs/msg/PointCloud2");

    Ok((msg, enc))
}

fn format_status(data: &RadarData) -> (ZBytes, Encoding) {
    let errors: Vec<_> = data.errors.iter().map(|err| err.to_string()).collect();
    let msg = json!({
        "errors": errors,
        "points": data.points.len(),
    });

    (ZBytes::from(msg.to_string()), Encoding::APPLICATION_JSON)
}

fn timestamp() -> Result<Time, std::io::Error> {
    let ns = monotonic_ns()?;
    Ok(Time {
        sec: (ns / 1_000_000_000) as i32,
        nanosec: (ns % 1_000_000_000) as u32,
    })
}
