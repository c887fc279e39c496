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

//! Runs a transfer session on its own thread

use std::fmt;
use std::path::PathBuf;
use std::thread::JoinHandle;
use crossbeam_channel::Receiver;
use tracing::{debug, warn};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::events::{CancelToken, EventSink, TransferEvent, TransferOutcome};
use crate::sender::send_file;
use crate::serial::Transport;

/// A transfer running in the background
pub struct TransferHandle {
    events: Receiver<TransferEvent>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl TransferHandle {
    /// Progress, status and, last, the outcome
    pub fn events(&self) -> &Receiver<TransferEvent> {
        &self.events
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Ask the session to stop before its next data packet
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the outcome arrives, discarding remaining progress events
    pub fn wait(self) -> TransferOutcome {
        self.wait_with(|_| {})
    }

    /// Block until the outcome arrives, passing every progress and status
    /// event to `on_event` on the way
    pub fn wait_with<F>(mut self, mut on_event: F) -> TransferOutcome
    where
        F: FnMut(&TransferEvent),
    {
        let outcome = loop {
            match self.events.recv() {
                Ok(TransferEvent::Finished(outcome)) => break outcome,
                Ok(event) => on_event(&event),
                // The worker died without reporting
                Err(_) => break TransferOutcome::Failure(TransferError::TransportFault(
                    std::io::Error::other("transfer worker exited unexpectedly"),
                )),
            };
        };
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("transfer worker panicked");
            }
        }
    }
}

/// Code run on a transfer thread
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// The transfer thread could not be started
pub struct SpawnError {
    pub error: std::io::Error,
    /// The transport handed to [`spawn_transfer`], returned unused
    pub transport: Option<Box<dyn Transport>>,
}

impl fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// Spawn `body` on a named OS thread
pub fn spawn_worker(body: WorkerBody) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("ymodem-transfer".into())
        .spawn(body)
}

/// Start sending `path` on a new thread.
///
/// `on_done` receives the transport back once the session is over, before
/// the `Finished` event is published. If the thread cannot be started the
/// transport comes back in the error instead.
pub fn spawn_transfer<F>(
    transport: Box<dyn Transport>,
    path: PathBuf,
    config: TransferConfig,
    on_done: F,
) -> Result<TransferHandle, SpawnError>
where
    F: FnOnce(Box<dyn Transport>) + Send + 'static,
{
    spawn_transfer_with(spawn_worker, transport, path, config, on_done)
}

pub(crate) fn spawn_transfer_with<S, F>(
    spawn: S,
    transport: Box<dyn Transport>,
    path: PathBuf,
    config: TransferConfig,
    on_done: F,
) -> Result<TransferHandle, SpawnError>
where
    S: FnOnce(WorkerBody) -> std::io::Result<JoinHandle<()>>,
    F: FnOnce(Box<dyn Transport>) + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let cancel = CancelToken::new();
    let token = cancel.clone();

    // The transport waits in a slot so a failed spawn can hand it back
    let (slot_tx, slot) = crossbeam_channel::bounded::<Box<dyn Transport>>(1);
    if let Err(e) = slot_tx.send(transport) {
        return Err(SpawnError {
            error: std::io::Error::other("transport slot closed"),
            transport: Some(e.into_inner()),
        });
    }
    let worker_slot = slot.clone();

    let body: WorkerBody = Box::new(move || {
        let Ok(transport) = worker_slot.try_recv() else {
            warn!("transfer worker started without a transport");
            return;
        };
        let events = EventSink::new(tx);
        let finished = send_file(transport, &path, config, events.clone(), token);
        debug!(success = finished.outcome.is_success(), "transfer worker done");
        on_done(finished.transport);
        events.finished(finished.outcome);
    });

    match spawn(body) {
        Ok(thread) => Ok(TransferHandle { events: rx, cancel, thread: Some(thread) }),
        Err(error) => Err(SpawnError { error, transport: slot.try_recv().ok() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::*;
    use crate::serial::MockTransport;
    use std::time::Duration;

    fn responses_for(packets: usize) -> Vec<Option<u8>> {
        let mut responses = vec![Some(CRC_READY), Some(ACK)];
        responses.extend(std::iter::repeat_n(Some(ACK), packets));
        responses.extend([Some(ACK), Some(CRC_READY), Some(ACK)]);
        responses
    }

    #[test]
    fn test_worker_reports_progress_then_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        std::fs::write(&path, vec![7u8; 2500]).unwrap();

        let (mock, writes) = MockTransport::new(responses_for(3));
        let (back_tx, back_rx) = crossbeam_channel::bounded(1);
        let handle = spawn_transfer(Box::new(mock), path, TransferConfig::default(), move |t| {
            back_tx.send(t).unwrap();
        }).unwrap();

        let mut progress = Vec::new();
        let outcome = loop {
            match handle.events().recv_timeout(Duration::from_secs(5)).unwrap() {
                TransferEvent::Progress(p) => progress.push(p),
                TransferEvent::Status(_) => {}
                TransferEvent::Finished(outcome) => break outcome,
            }
        };

        assert!(matches!(outcome, TransferOutcome::Success { bytes: 2500 }));
        assert_eq!(progress, vec![33, 66, 100]);
        // Transport is handed back before the outcome is published
        assert!(back_rx.try_recv().is_ok());
        assert_eq!(writes.lock().len(), 6);
    }

    #[test]
    fn test_worker_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mock, writes) = MockTransport::new(vec![]);
        let handle = spawn_transfer(Box::new(mock), dir.path().join("none.wav"), TransferConfig::default(), drop).unwrap();

        let outcome = handle.wait();
        assert!(matches!(outcome, TransferOutcome::Failure(TransferError::FileNotFound(_))));
        assert!(writes.lock().is_empty());
    }

    #[test]
    fn test_worker_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        std::fs::write(&path, vec![1u8; 4096]).unwrap();

        // Never answers 'C', so the worker sits in the ready poll until cancelled
        let (mock, writes) = MockTransport::new(vec![]);
        let config = TransferConfig { ready_poll: Duration::from_millis(10), ..TransferConfig::default() };
        let handle = spawn_transfer(Box::new(mock), path, config, drop).unwrap();

        handle.cancel();
        let outcome = handle.wait();
        assert!(matches!(outcome, TransferOutcome::Failure(TransferError::UserCancelled)));
        assert_eq!(writes.lock().as_slice(), &[vec![CAN; 5]]);
    }

    #[test]
    fn test_failed_spawn_returns_transport() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        std::fs::write(&path, vec![0u8; 10]).unwrap();

        let (mock, writes) = MockTransport::new(vec![]);
        let refuse = |_body: WorkerBody| -> std::io::Result<JoinHandle<()>> {
            Err(std::io::Error::other("no threads left"))
        };
        let failed = match spawn_transfer_with(refuse, Box::new(mock), path, TransferConfig::default(), drop) {
            Err(failed) => failed,
            Ok(_) => panic!("spawn should have failed"),
        };

        assert_eq!(failed.error.to_string(), "no threads left");
        let mut transport = failed.transport.expect("transport handed back");
        transport.write_all(b"still mine").unwrap();
        assert_eq!(writes.lock().as_slice(), &[b"still mine".to_vec()]);
    }

    #[test]
    fn test_wait_with_sees_events_before_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loop.wav");
        std::fs::write(&path, vec![3u8; 1500]).unwrap();

        let (mock, _writes) = MockTransport::new(responses_for(2));
        let handle = spawn_transfer(Box::new(mock), path, TransferConfig::default(), drop).unwrap();

        let mut progress = Vec::new();
        let mut statuses = 0;
        let outcome = handle.wait_with(|event| match event {
            TransferEvent::Progress(p) => progress.push(*p),
            TransferEvent::Status(_) => statuses += 1,
            TransferEvent::Finished(_) => unreachable!(),
        });

        assert!(matches!(outcome, TransferOutcome::Success { bytes: 1500 }));
        assert_eq!(progress, vec![50, 100]);
        assert!(statuses > 0);
    }
}
