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

//! Y-MODEM protocol constants

use std::time::Duration;

/// Start of header - begins a packet with a 128-byte payload
pub const SOH: u8 = 0x01;

/// Start of text - begins a packet with a 1024-byte payload
pub const STX: u8 = 0x02;

/// End of transmission - sender has no more data for the current file
pub const EOT: u8 = 0x04;

/// Acknowledge - receiver accepted the packet
pub const ACK: u8 = 0x06;

/// Negative acknowledge - receiver rejected the packet, resend it
pub const NAK: u8 = 0x15;

/// Cancel - either side aborts the transfer
pub const CAN: u8 = 0x18;

/// Substitute - pads the final data packet
pub const SUB: u8 = 0x1A;

/// Receiver ready, checksum-16 mode requested
pub const CRC_READY: u8 = b'C';

/// Payload size of an SOH packet
pub const SHORT_PAYLOAD: usize = 128;

/// Payload size of an STX packet
pub const LONG_PAYLOAD: usize = 1024;

/// Header + sequence + complement + checksum
pub const FRAME_OVERHEAD: usize = 5;

/// Number of CAN bytes written when the sender aborts
pub const CANCEL_BURST: usize = 5;

/// Overall deadline for the receiver's initial 'C'
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Slice length used while polling for 'C'
pub const READY_POLL: Duration = Duration::from_millis(500);

/// Wait for the response to a packet or EOT
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort wait for 'C' before the null packet
pub const POST_EOT_READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Attempts per packet before the transfer is abandoned
pub const MAX_ATTEMPTS: u32 = 10;
