// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Y-MODEM uploads and control commands for multi-channel audio players
//! attached over RS-232.

pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod frame;
pub mod link;
pub mod protocol;
pub mod sender;
pub mod serial;
pub mod worker;

pub use config::{Config, LinkConfig, SerialConfig, TransferConfig};
pub use control::{DeviceClient, DeviceCommand};
pub use error::{Error, FrameError, LinkError, Result, TransferError};
pub use events::{CancelToken, EventSink, Phase, TransferEvent, TransferOutcome};
pub use frame::{Packet, PacketKind, checksum16};
pub use link::{Link, LinkEvent};
pub use sender::{Finished, SenderFsm, SenderState, TransferSource, run_session, send_file};
pub use serial::{RealSerialPort, Transport};
pub use worker::{SpawnError, TransferHandle, spawn_transfer};
