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

//! Single owner of the serial link.
//!
//! A reader thread holds the transport, turns incoming bytes into text lines
//! and performs command writes on behalf of other threads. A transfer takes
//! the transport away with [`Link::claim`] and gives it back with
//! [`Link::release`]; nothing reads the port while it is claimed.

use std::path::PathBuf;
use std::thread::JoinHandle;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};
use crate::config::{Config, LinkConfig, TransferConfig};
use crate::error::LinkError;
use crate::serial::{RealSerialPort, Transport};
use crate::worker::{TransferHandle, WorkerBody, spawn_transfer_with, spawn_worker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete line of device output
    Line(String),
    /// The reader hit a read error and backed off
    Fault(String),
}

enum LinkCommand {
    Write(Vec<u8>, Sender<std::io::Result<()>>),
    Detach(Sender<Box<dyn Transport>>),
    Attach(Box<dyn Transport>),
    Shutdown,
}

// ============================================================================
// Line Splitter
// ============================================================================

/// Longest partial line held while waiting for `\n`
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates raw bytes and yields trimmed, non-empty lines.
///
/// Output that runs past [`MAX_LINE_LEN`] without a newline is flushed as a
/// line of its own.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }

        if self.pending.len() > MAX_LINE_LEN {
            let raw = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

// ============================================================================
// Link
// ============================================================================

pub struct Link {
    commands: Sender<LinkCommand>,
    events: Receiver<LinkEvent>,
    config: LinkConfig,
    thread: Option<JoinHandle<Option<Box<dyn Transport>>>>,
}

impl Link {
    /// Open the serial port named in `config` and start reading it
    pub fn open(config: &Config) -> crate::Result<Self> {
        let port = RealSerialPort::open(&config.serial)?;
        Ok(Link::start(Box::new(port), config.link.clone())?)
    }

    pub fn start(transport: Box<dyn Transport>, config: LinkConfig) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let reader_config = config.clone();

        let thread = std::thread::Builder::new()
            .name("link-reader".into())
            .spawn(move || reader_loop(transport, cmd_rx, event_tx, reader_config))?;

        Ok(Link { commands: cmd_tx, events: event_rx, config, thread: Some(thread) })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Lines and faults seen by the passive reader
    pub fn events(&self) -> &Receiver<LinkEvent> {
        &self.events
    }

    /// Write raw bytes through the reader thread
    pub fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(LinkCommand::Write(bytes.to_vec(), reply_tx))
            .map_err(|_| LinkError::Closed)?;
        let result = reply_rx.recv().map_err(|_| LinkError::Closed)?;
        result.map_err(|e| match e.kind() {
            std::io::ErrorKind::ResourceBusy => LinkError::Claimed,
            _ => LinkError::Write(e),
        })
    }

    /// Take exclusive ownership of the transport away from the reader
    pub fn claim(&self) -> Result<Box<dyn Transport>, LinkError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(LinkCommand::Detach(reply_tx))
            .map_err(|_| LinkError::Closed)?;
        match reply_rx.recv_timeout(self.config.claim_timeout) {
            Ok(transport) => {
                debug!("link claimed");
                Ok(transport)
            }
            // The reader dropped the reply sender: nothing to hand over
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(LinkError::Claimed),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(LinkError::Busy),
        }
    }

    /// Give a claimed transport back to the reader
    pub fn release(&self, transport: Box<dyn Transport>) -> Result<(), LinkError> {
        self.commands
            .send(LinkCommand::Attach(transport))
            .map_err(|_| LinkError::Closed)?;
        debug!("link released");
        Ok(())
    }

    /// Claim the link and send `path` on a worker; the link is released when it ends
    pub fn start_transfer(&self, path: PathBuf, config: TransferConfig) -> Result<TransferHandle, LinkError> {
        let transport = self.claim()?;
        let commands = self.commands.clone();
        let release = move |transport: Box<dyn Transport>| {
            if commands.send(LinkCommand::Attach(transport)).is_err() {
                warn!("link reader gone, dropping transport");
            }
        };

        self.launch(transport, path, config, release, spawn_worker)
    }

    fn launch<R, S>(
        &self,
        transport: Box<dyn Transport>,
        path: PathBuf,
        config: TransferConfig,
        release: R,
        spawn: S,
    ) -> Result<TransferHandle, LinkError>
    where
        R: FnOnce(Box<dyn Transport>) + Send + 'static,
        S: FnOnce(WorkerBody) -> std::io::Result<JoinHandle<()>>,
    {
        spawn_transfer_with(spawn, transport, path, config, release).map_err(|failed| {
            if let Some(transport) = failed.transport {
                if self.release(transport).is_err() {
                    warn!("link reader gone, dropping transport");
                }
            }
            LinkError::Spawn(failed.error)
        })
    }

    /// Stop the reader and take the transport back, if it is not claimed
    pub fn close(mut self) -> Option<Box<dyn Transport>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Box<dyn Transport>> {
        let thread = self.thread.take()?;
        let _ = self.commands.send(LinkCommand::Shutdown);
        match thread.join() {
            Ok(transport) => transport,
            Err(_) => {
                warn!("link reader panicked");
                None
            }
        }
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reader_loop(
    transport: Box<dyn Transport>,
    commands: Receiver<LinkCommand>,
    events: Sender<LinkEvent>,
    config: LinkConfig,
) -> Option<Box<dyn Transport>> {
    let mut transport = Some(transport);
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 256];
    info!("link reader started");

    loop {
        // While detached there is nothing to poll, so block on the next command
        let command = if transport.is_some() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(LinkCommand::Write(bytes, reply)) => {
                let result = match transport.as_mut() {
                    Some(t) => t.write_all(&bytes),
                    None => Err(std::io::Error::new(std::io::ErrorKind::ResourceBusy, "link is claimed")),
                };
                let _ = reply.send(result);
                continue;
            }
            Some(LinkCommand::Detach(reply)) => {
                if let Some(t) = transport.take() {
                    splitter.clear();
                    if let Err(returned) = reply.send(t) {
                        // Claimer gave up waiting, keep reading
                        transport = Some(returned.into_inner());
                    }
                }
                continue;
            }
            Some(LinkCommand::Attach(t)) => {
                if transport.is_some() {
                    warn!("link already attached, dropping extra transport");
                } else {
                    transport = Some(t);
                }
                continue;
            }
            Some(LinkCommand::Shutdown) => break,
            None => {}
        }

        let Some(t) = transport.as_mut() else { continue };
        match t.read_timeout(&mut buf, config.poll_interval) {
            Ok(0) => {}
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    debug!(%line, "device");
                    let _ = events.send(LinkEvent::Line(line));
                }
            }
            Err(e) => {
                warn!("Reception error: {}", e);
                let _ = events.send(LinkEvent::Fault(e.to_string()));
                // A closed transport never recovers
                if !t.is_open() {
                    warn!("transport closed, link reader exiting");
                    break;
                }
                std::thread::sleep(config.fault_backoff);
            }
        }
    }

    info!("link reader stopped");
    transport
}
