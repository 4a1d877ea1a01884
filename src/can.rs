// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    common::monotonic_ns,
    decoder::{load_data, Packet},
};
use log::trace;
use socketcan::{tokio::CanSocket, CanFrame, EmbeddedFrame, Id as CanId};
use std::{fmt, io};

/// CAN reader error types.
#[derive(Debug)]
pub enum Error {
    /// I/O error from underlying socket operations
    Io(io::Error),
    /// Remote transmission request received on the radar bus
    RemoteFrame(u32),
    /// Bus error frame reported by the controller
    ErrorFrame(String),
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::RemoteFrame(id) => write!(f, "unexpected remote frame: {:#x}", id),
            Error::ErrorFrame(frame) => write!(f, "bus error frame: {}", frame),
        }
    }
}

fn raw_id(id: CanId) -> u32 {
    match id {
        CanId::Standard(id) => id.as_raw() as u32,
        CanId::Extended(id) => id.as_raw(),
    }
}

/// Read next CAN frame from socket.
///
/// # Arguments
/// * `can` - Active CAN socket
///
/// # Returns
/// Next data Packet from the CAN bus, stamped with the monotonic receive time
///
/// # Errors
/// Returns Error if the socket read fails or a remote or error frame arrives
pub async fn read_frame(can: &CanSocket) -> Result<Packet, Error> {
    match can.read_frame().await? {
        CanFrame::Data(frame) => {
            let pkt = Packet {
                id: raw_id(frame.id()),
                data: load_data(frame.data()),
                timestamp: monotonic_ns()?,
            };
            trace!("{:#x} {:016X}", pkt.id, pkt.data);
            Ok(pkt)
        }
        CanFrame::Remote(frame) => Err(Error::RemoteFrame(raw_id(frame.id()))),
        CanFrame::Error(frame) => Err(Error::ErrorFrame(format!("{:?}", frame))),
    }
}
