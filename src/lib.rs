// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RadarTrack Library
//!
//! This library turns the track messages of a front radar into per-sweep
//! snapshots of detections for a driving-assistance stack.
//!
//! # Features
//!
//! - **Sweep Layout** - The 32 radar track messages and their signals
//! - **Signal Decoder** - Signal extraction and bus health monitoring
//! - **Point Tracker** - Sweep completion, track identity and polar to
//!   cartesian conversion
//! - **CAN Interface** - Read radar frames via SocketCAN

#![warn(missing_docs)]

/// CAN interface for reading radar frames
#[cfg(feature = "can")]
pub mod can;

/// Common utilities
pub mod common;

/// Radar track message decoding
pub mod decoder;

/// Radar track message layout
pub mod sweep;

/// Radar point state tracking
pub mod tracker;
