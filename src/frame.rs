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

//! Y-MODEM packet codec
//!
//! Wire layout: header, sequence, `255 - sequence`, payload, CRC high, CRC low.

use crate::error::FrameError;
use crate::protocol::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// SOH, 128-byte payload
    Short,
    /// STX, 1024-byte payload
    Long,
}

impl PacketKind {
    pub fn header(self) -> u8 {
        match self {
            PacketKind::Short => SOH,
            PacketKind::Long => STX,
        }
    }

    pub fn payload_len(self) -> usize {
        match self {
            PacketKind::Short => SHORT_PAYLOAD,
            PacketKind::Long => LONG_PAYLOAD,
        }
    }

    fn from_header(header: u8) -> Result<Self, FrameError> {
        match header {
            SOH => Ok(PacketKind::Short),
            STX => Ok(PacketKind::Long),
            other => Err(FrameError::InvalidHeader(other)),
        }
    }
}

/// A validated packet. The checksum always matches the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    sequence: u8,
    payload: Vec<u8>,
    checksum: u16,
}

impl Packet {
    pub fn new(sequence: u8, payload: Vec<u8>) -> Result<Self, FrameError> {
        let kind = match payload.len() {
            SHORT_PAYLOAD => PacketKind::Short,
            LONG_PAYLOAD => PacketKind::Long,
            len => return Err(FrameError::InvalidPayloadLength(len)),
        };
        let checksum = checksum16(&payload);
        Ok(Packet { kind, sequence, payload, checksum })
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + FRAME_OVERHEAD);
        bytes.push(self.kind.header());
        bytes.push(self.sequence);
        bytes.push(255 - self.sequence);
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// Parse and validate one complete frame
    pub fn deserialize(bytes: &[u8]) -> Result<Self, FrameError> {
        let header = *bytes.first().ok_or(FrameError::Truncated { expected: 1, got: 0 })?;
        let kind = PacketKind::from_header(header)?;
        let expected = kind.payload_len() + FRAME_OVERHEAD;
        if bytes.len() != expected {
            return Err(FrameError::Truncated { expected, got: bytes.len() });
        }

        let sequence = bytes[1];
        let complement = bytes[2];
        if complement != 255 - sequence {
            return Err(FrameError::SequenceMismatch { sequence, complement });
        }

        let payload = &bytes[3..expected - 2];
        let got = u16::from_be_bytes([bytes[expected - 2], bytes[expected - 1]]);
        let computed = checksum16(payload);
        if got != computed {
            return Err(FrameError::ChecksumMismatch { expected: computed, got });
        }

        Ok(Packet { kind, sequence, payload: payload.to_vec(), checksum: got })
    }
}

/// Packet 0: `name NUL size`, zero padded to 128 bytes
pub fn encode_info_packet(file_name: &str, file_size: u64) -> Result<Packet, FrameError> {
    let size = file_size.to_string();
    let needed = file_name.len() + 1 + size.len();
    if needed > SHORT_PAYLOAD {
        return Err(FrameError::InfoTooLong { needed });
    }

    let mut payload = Vec::with_capacity(SHORT_PAYLOAD);
    payload.extend_from_slice(file_name.as_bytes());
    payload.push(0);
    payload.extend_from_slice(size.as_bytes());
    payload.resize(SHORT_PAYLOAD, 0);
    Packet::new(0, payload)
}

/// 1024-byte data packet, SUB padded when `chunk` is short
pub fn encode_data_packet(sequence: u8, chunk: &[u8]) -> Result<Packet, FrameError> {
    if chunk.is_empty() {
        return Err(FrameError::EmptyChunk);
    }
    if chunk.len() > LONG_PAYLOAD {
        return Err(FrameError::ChunkTooLarge(chunk.len()));
    }

    let mut payload = chunk.to_vec();
    payload.resize(LONG_PAYLOAD, SUB);
    Packet::new(sequence, payload)
}

/// All-zero packet 0 that closes the batch
pub fn encode_null_packet() -> Packet {
    let payload = vec![0; SHORT_PAYLOAD];
    let checksum = checksum16(&payload);
    Packet { kind: PacketKind::Short, sequence: 0, payload, checksum }
}

/// CRC-16/XMODEM: polynomial 0x1021, initial value 0, no reflection
pub fn checksum16(payload: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in payload {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
