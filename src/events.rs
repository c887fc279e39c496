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

//! Transfer progress reporting and cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use crossbeam_channel::Sender;
use crate::error::TransferError;

/// Where a session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingReady,
    SendingInfo,
    /// Packet index, starting at 1
    SendingData(u32),
    SendingEot,
    SendingNull,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

/// Terminal result of a session
#[derive(Debug)]
pub enum TransferOutcome {
    Success { bytes: u64 },
    Failure(TransferError),
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }

    pub fn phase(&self) -> Phase {
        match self {
            TransferOutcome::Success { .. } => Phase::Completed,
            TransferOutcome::Failure(e) if e.is_user_cancelled() => Phase::Cancelled,
            TransferOutcome::Failure(_) => Phase::Failed,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TransferOutcome::Success { bytes } => format!("File transferred successfully ({} bytes)", bytes),
            TransferOutcome::Failure(e) => e.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum TransferEvent {
    /// Percentage of data packets acknowledged
    Progress(u8),
    Status(String),
    Finished(TransferOutcome),
}

/// Fire-and-forget event publisher; a vanished receiver is not an error
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<Sender<TransferEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<TransferEvent>) -> Self {
        EventSink { tx: Some(tx) }
    }

    /// Sink that drops every event
    pub fn discard() -> Self {
        EventSink { tx: None }
    }

    pub fn progress(&self, percent: u8) {
        self.emit(TransferEvent::Progress(percent));
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(TransferEvent::Status(message.into()));
    }

    pub fn finished(&self, outcome: TransferOutcome) {
        self.emit(TransferEvent::Finished(outcome));
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Shared cancellation flag, checked by the session between packets
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = EventSink::new(tx);
        sink.progress(10);
        assert!(matches!(rx.try_recv(), Ok(TransferEvent::Progress(10))));
        drop(rx);
        sink.status("nobody listening");
        EventSink::discard().progress(50);
    }

    #[test]
    fn test_outcome_phase() {
        assert_eq!(TransferOutcome::Success { bytes: 1 }.phase(), Phase::Completed);
        assert_eq!(TransferOutcome::Failure(TransferError::UserCancelled).phase(), Phase::Cancelled);
        assert_eq!(TransferOutcome::Failure(TransferError::ReadyTimeout).phase(), Phase::Failed);
        assert!(Phase::Cancelled.is_terminal());
        assert!(!Phase::SendingData(1).is_terminal());
        assert_eq!(
            TransferOutcome::Failure(TransferError::ReadyTimeout).message(),
            "timeout waiting for receiver"
        );
    }
}
