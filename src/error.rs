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

//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// Packet construction and validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload must be 128 or 1024 bytes, got {0}")]
    InvalidPayloadLength(usize),

    #[error("data chunk is empty")]
    EmptyChunk,

    #[error("data chunk of {0} bytes exceeds 1024")]
    ChunkTooLarge(usize),

    #[error("file name and size need {needed} bytes, info packet holds 128")]
    InfoTooLong { needed: usize },

    #[error("unknown header byte 0x{0:02X}")]
    InvalidHeader(u8),

    #[error("frame of {got} bytes, expected {expected}")]
    Truncated { expected: usize, got: usize },

    #[error("sequence complement mismatch: sequence {sequence}, complement {complement}")]
    SequenceMismatch { sequence: u8, complement: u8 },

    #[error("checksum mismatch: expected {expected:04X}, got {got:04X}")]
    ChecksumMismatch { expected: u16, got: u16 },
}

/// Why a transfer session failed
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("timeout waiting for receiver")]
    ReadyTimeout,

    #[error("packet {sequence} failed after {attempts} attempts")]
    MaxRetriesExceeded { sequence: u8, attempts: u32 },

    #[error("transfer cancelled by receiver")]
    RemoteCancelled,

    #[error("cancelled by user")]
    UserCancelled,

    #[error("transport fault: {0}")]
    TransportFault(#[source] std::io::Error),

    #[error("EOT not acknowledged ({})", describe_response(.0))]
    ProtocolError(Option<u8>),

    #[error("cannot build packet: {0}")]
    Frame(#[from] FrameError),

    #[error("error reading source file: {0}")]
    Source(#[source] std::io::Error),

    #[error("not a readable WAV file: {0}")]
    InvalidWav(#[source] hound::Error),

    #[error("unsupported WAV format: {rate} Hz, {bits}-bit, {channels} ch (player needs 32000 Hz, 16-bit, mono)")]
    UnsupportedFormat { rate: u32, bits: u16, channels: u16 },
}

impl TransferError {
    /// User cancellation is a normal negative outcome, not an error state
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, TransferError::UserCancelled)
    }
}

fn describe_response(response: &Option<u8>) -> String {
    match response {
        Some(byte) => format!("got 0x{:02X}", byte),
        None => "no response".to_string(),
    }
}

/// Failures of the shared serial link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link is claimed by a transfer")]
    Claimed,

    #[error("link reader has stopped")]
    Closed,

    #[error("link reader did not answer in time")]
    Busy,

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("cannot start transfer worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("invalid channel {channel}, device has {channels}")]
    InvalidChannel { channel: u8, channels: u8 },

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Transfer(#[from] TransferError),
}

pub type Result<T> = std::result::Result<T, Error>;
