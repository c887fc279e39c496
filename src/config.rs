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

//! Link and transfer settings

use std::time::Duration;
use serialport::{DataBits, Parity, StopBits};
use crate::error::{Error, Result};
use crate::protocol::*;

/// Serial line settings
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        SerialConfig {
            port: port.into(),
            baud: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Timing of one transfer session
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Overall deadline for the receiver's 'C'
    pub ready_timeout: Duration,
    /// Length of each poll while waiting for 'C'
    pub ready_poll: Duration,
    /// Wait for ACK/NAK after a packet or EOT
    pub ack_timeout: Duration,
    /// Best-effort wait for 'C' before the null packet
    pub post_eot_ready_timeout: Duration,
    /// Attempts per packet
    pub max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            ready_timeout: READY_TIMEOUT,
            ready_poll: READY_POLL,
            ack_timeout: ACK_TIMEOUT,
            post_eot_ready_timeout: POST_EOT_READY_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Behaviour of the passive line reader and control commands
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Read timeout of each line-reader poll
    pub poll_interval: Duration,
    /// Back-off after a read fault
    pub fault_backoff: Duration,
    /// How long a claim waits for the reader to hand over the port
    pub claim_timeout: Duration,
    /// Pause between `UPLOAD` and the start of the transfer
    pub upload_settle: Duration,
    /// Number of playback channels on the device
    pub channels: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            poll_interval: Duration::from_millis(50),
            fault_backoff: Duration::from_millis(100),
            claim_timeout: Duration::from_secs(1),
            upload_settle: Duration::from_millis(500),
            channels: 6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub serial: SerialConfig,
    pub transfer: TransferConfig,
    pub link: LinkConfig,
}

impl Config {
    pub fn new(port: impl Into<String>) -> Self {
        Config {
            serial: SerialConfig::new(port),
            transfer: TransferConfig::default(),
            link: LinkConfig::default(),
        }
    }
}

pub fn parse_data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(Error::Config(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits))),
    }
}

pub fn parse_parity(parity: &str) -> Result<Parity> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(Error::Config(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity))),
    }
}

pub fn parse_stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(Error::Config(format!("Invalid stop bits: {}. Must be 1 or 2", bits))),
    }
}
