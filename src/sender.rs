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

use std::marker::PhantomData;
use std::fs::File;
use std::path::Path;
use std::io::Read;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::events::{CancelToken, EventSink, Phase, TransferOutcome};
use crate::frame::{self, Packet};
use crate::serial::Transport;
use crate::protocol::*;

// ============================================================================
// Source File
// ============================================================================

/// Sequential byte source with a known length
pub struct TransferSource {
    name: String,
    size: u64,
    reader: Box<dyn Read + Send>,
}

impl TransferSource {
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let not_found = || TransferError::FileNotFound(path.to_path_buf());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(not_found)?;

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(TransferError::Source(e)),
        };

        let metadata = file.metadata().map_err(TransferError::Source)?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        Ok(TransferSource { name, size: metadata.len(), reader: Box::new(file) })
    }

    pub fn from_reader(name: impl Into<String>, size: u64, reader: impl Read + Send + 'static) -> Self {
        TransferSource { name: name.into(), size, reader: Box::new(reader) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Fill `buf` unless the source ends first
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

// ============================================================================
// States
// ============================================================================

pub struct AwaitingReady;
pub struct SendingInfo;
pub struct SendingData;
pub struct SendingEot;
pub struct SendingNull;

// ============================================================================
// FSM Structure
// ============================================================================

pub struct SenderFsm<State> {
    state: PhantomData<State>,
    transport: Box<dyn Transport>,
    source: TransferSource,
    config: TransferConfig,
    events: EventSink,
    cancel: CancelToken,
    // Time charged against the ready deadline
    waited: Duration,
    packet_index: u32,
    total_packets: u32,
    retries: u32,
}

/// What a session hands back once it reaches a terminal state
pub struct Finished {
    pub transport: Box<dyn Transport>,
    pub outcome: TransferOutcome,
}

pub enum Step {
    Next(Box<dyn SenderState>),
    Done(Finished),
}

// ============================================================================
// Trait
// ============================================================================

pub trait SenderState: Send {
    fn phase(&self) -> Phase;

    fn step(self: Box<Self>) -> Step;
}

// ============================================================================
// Helpers shared by all states
// ============================================================================

impl<S> SenderFsm<S> {
    fn transition<T>(self) -> Box<SenderFsm<T>> {
        Box::new(SenderFsm {
            state: PhantomData,
            transport: self.transport,
            source: self.source,
            config: self.config,
            events: self.events,
            cancel: self.cancel,
            waited: self.waited,
            packet_index: self.packet_index,
            total_packets: self.total_packets,
            retries: self.retries,
        })
    }

    fn state_name(&self) -> &'static str {
        let type_name = std::any::type_name::<S>();
        type_name.split("::").last().unwrap_or(type_name)
    }

    fn finish(self, outcome: TransferOutcome) -> Step {
        match &outcome {
            TransferOutcome::Success { bytes } => info!(file = %self.source.name, bytes, "transfer complete"),
            TransferOutcome::Failure(e) => warn!(file = %self.source.name, state = self.state_name(), "transfer ended: {}", e),
        }
        Step::Done(Finished { transport: self.transport, outcome })
    }

    fn fail(self, error: TransferError) -> Step {
        self.finish(TransferOutcome::Failure(error))
    }

    /// Abort on the user's request, telling the receiver first
    fn cancelled(mut self) -> Step {
        self.events.status("Cancelling transfer");
        match self.write(&[CAN; CANCEL_BURST]) {
            Ok(()) => self.fail(TransferError::UserCancelled),
            Err(e) => self.fail(e),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransferError> {
        self.transport.write_all(bytes).map_err(TransferError::TransportFault)
    }

    /// One byte, or `None` when the timeout expires
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, TransferError> {
        let mut buf = [0u8; 1];
        match self.transport.read_timeout(&mut buf, timeout) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(TransferError::TransportFault(e)),
        }
    }

    /// One poll slice for 'C'. Returns whether it arrived and the time to charge.
    fn poll_ready(&mut self, remaining: Duration) -> Result<(bool, Duration), TransferError> {
        let slice = self.config.ready_poll.min(remaining);
        let started = Instant::now();
        let byte = self.read_byte(slice)?;
        let spent = match byte {
            // A timed out read always costs the full slice
            None => started.elapsed().max(slice),
            Some(_) => started.elapsed(),
        };

        match byte {
            Some(CRC_READY) => Ok((true, spent)),
            Some(other) => {
                debug!("ignoring 0x{:02X} while waiting for 'C'", other);
                Ok((false, spent))
            }
            None => Ok((false, spent)),
        }
    }

    /// Write a packet and wait for ACK, retrying on NAK, timeout or garbage
    fn send_packet(&mut self, packet: &Packet) -> Result<(), TransferError> {
        let bytes = packet.serialize();
        let sequence = packet.sequence();
        let max = self.config.max_attempts;
        self.retries = 0;

        for attempt in 1..=max {
            self.write(&bytes)?;
            debug!(sequence, attempt, len = bytes.len(), "packet sent");

            match self.read_byte(self.config.ack_timeout)? {
                Some(ACK) => return Ok(()),
                Some(CAN) => return Err(TransferError::RemoteCancelled),
                Some(NAK) => {
                    self.events.status(format!("NAK received, retrying... ({}/{})", attempt, max));
                }
                Some(other) => {
                    self.events.status(format!("Unexpected response 0x{:02X}, retrying... ({}/{})", other, attempt, max));
                }
                None => {
                    self.events.status(format!("Timeout, retrying... ({}/{})", attempt, max));
                }
            }
            self.retries += 1;
            warn!(sequence, attempt, "packet not acknowledged");
        }

        Err(TransferError::MaxRetriesExceeded { sequence, attempts: max })
    }
}

// ============================================================================
// State Implementations
// ============================================================================

impl SenderState for SenderFsm<AwaitingReady> {
    fn phase(&self) -> Phase {
        Phase::AwaitingReady
    }

    fn step(self: Box<Self>) -> Step {
        let mut fsm = *self;

        if !fsm.transport.is_open() {
            let closed = std::io::Error::new(std::io::ErrorKind::NotConnected, "transport is closed");
            return fsm.fail(TransferError::TransportFault(closed));
        }
        if fsm.cancel.is_cancelled() {
            return fsm.cancelled();
        }
        if fsm.waited >= fsm.config.ready_timeout {
            return fsm.fail(TransferError::ReadyTimeout);
        }

        if fsm.waited.is_zero() {
            fsm.events.status(format!("Waiting for receiver... ({}, {} bytes)", fsm.source.name, fsm.source.size));
        }

        let remaining = fsm.config.ready_timeout - fsm.waited;
        match fsm.poll_ready(remaining) {
            Ok((true, _)) => {
                debug!("Received: 'C'");
                Step::Next(fsm.transition::<SendingInfo>())
            }
            Ok((false, spent)) => {
                fsm.waited += spent;
                Step::Next(Box::new(fsm))
            }
            Err(e) => fsm.fail(e),
        }
    }
}

impl SenderState for SenderFsm<SendingInfo> {
    fn phase(&self) -> Phase {
        Phase::SendingInfo
    }

    fn step(self: Box<Self>) -> Step {
        let mut fsm = *self;

        let packet = match frame::encode_info_packet(&fsm.source.name, fsm.source.size) {
            Ok(packet) => packet,
            Err(e) => return fsm.fail(e.into()),
        };

        match fsm.send_packet(&packet) {
            Ok(()) => {
                fsm.packet_index = 1;
                Step::Next(fsm.transition::<SendingData>())
            }
            Err(e) => fsm.fail(e),
        }
    }
}

impl SenderState for SenderFsm<SendingData> {
    fn phase(&self) -> Phase {
        Phase::SendingData(self.packet_index)
    }

    fn step(self: Box<Self>) -> Step {
        let mut fsm = *self;

        if fsm.cancel.is_cancelled() {
            return fsm.cancelled();
        }

        let mut chunk = [0u8; LONG_PAYLOAD];
        let len = match fsm.source.read_chunk(&mut chunk) {
            Ok(len) => len,
            Err(e) => return fsm.fail(TransferError::Source(e)),
        };

        if len == 0 {
            return Step::Next(fsm.transition::<SendingEot>());
        }

        // Sequence numbers wrap after 255
        let sequence = fsm.packet_index as u8;
        let packet = match frame::encode_data_packet(sequence, &chunk[..len]) {
            Ok(packet) => packet,
            Err(e) => return fsm.fail(e.into()),
        };

        if let Err(e) = fsm.send_packet(&packet) {
            return fsm.fail(e);
        }

        let percent = (fsm.packet_index as u64 * 100 / fsm.total_packets.max(1) as u64).min(100);
        fsm.events.progress(percent as u8);
        fsm.events.status(format!("Sending... {}/{} packets", fsm.packet_index, fsm.total_packets));

        fsm.packet_index += 1;
        Step::Next(Box::new(fsm))
    }
}

impl SenderState for SenderFsm<SendingEot> {
    fn phase(&self) -> Phase {
        Phase::SendingEot
    }

    fn step(self: Box<Self>) -> Step {
        let mut fsm = *self;

        if let Err(e) = fsm.write(&[EOT]) {
            return fsm.fail(e);
        }
        debug!("Sent: EOT");

        match fsm.read_byte(fsm.config.ack_timeout) {
            Ok(Some(ACK)) => Step::Next(fsm.transition::<SendingNull>()),
            Ok(other) => fsm.fail(TransferError::ProtocolError(other)),
            Err(e) => fsm.fail(e),
        }
    }
}

impl SenderState for SenderFsm<SendingNull> {
    fn phase(&self) -> Phase {
        Phase::SendingNull
    }

    fn step(self: Box<Self>) -> Step {
        let mut fsm = *self;

        // Some receivers ask for the next file with another 'C'
        let limit = fsm.config.post_eot_ready_timeout;
        let mut waited = Duration::ZERO;
        while waited < limit {
            match fsm.poll_ready(limit - waited) {
                Ok((true, _)) => break,
                Ok((false, spent)) => waited += spent,
                Err(e) => return fsm.fail(e),
            }
        }

        let null_packet = frame::encode_null_packet().serialize();
        if let Err(e) = fsm.write(&null_packet) {
            return fsm.fail(e);
        }
        debug!("Sent: null packet");

        // The receiver's answer is not required, any value completes the batch
        match fsm.read_byte(fsm.config.ack_timeout) {
            Ok(response) => debug!(?response, "null packet answered"),
            Err(e) => return fsm.fail(e),
        }

        fsm.events.status("Transfer complete!");
        let bytes = fsm.source.size;
        fsm.finish(TransferOutcome::Success { bytes })
    }
}

// ============================================================================
// Constructor & Runner
// ============================================================================

impl SenderFsm<AwaitingReady> {
    pub fn new(
        transport: Box<dyn Transport>,
        source: TransferSource,
        config: TransferConfig,
        events: EventSink,
        cancel: CancelToken,
    ) -> Box<dyn SenderState> {
        let total_packets = source.size.div_ceil(LONG_PAYLOAD as u64) as u32;
        Box::new(SenderFsm {
            state: PhantomData::<AwaitingReady>,
            transport,
            source,
            config,
            events,
            cancel,
            waited: Duration::ZERO,
            packet_index: 0,
            total_packets,
            retries: 0,
        })
    }
}

/// Drive a session until it reaches a terminal state
pub fn run_session(mut state: Box<dyn SenderState>) -> Finished {
    let mut phase = state.phase();
    debug!(?phase, "session started");
    loop {
        match state.step() {
            Step::Next(next) => {
                if next.phase() != phase {
                    phase = next.phase();
                    debug!(?phase, "session advanced");
                }
                state = next;
            }
            Step::Done(finished) => return finished,
        }
    }
}

/// Send one file. A missing file is reported without touching the transport.
pub fn send_file(
    transport: Box<dyn Transport>,
    path: &Path,
    config: TransferConfig,
    events: EventSink,
    cancel: CancelToken,
) -> Finished {
    match TransferSource::open(path) {
        Ok(source) => run_session(SenderFsm::new(transport, source, config, events, cancel)),
        Err(e) => {
            warn!(path = %path.display(), "cannot start transfer: {}", e);
            Finished { transport, outcome: TransferOutcome::Failure(e) }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
