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

use std::io::{Read, Write};
use std::time::Duration;
use serialport::SerialPort as SerialPortTrait;
use tracing::debug;
use crate::config::SerialConfig;

// ============================================================================
// Transport Trait
// ============================================================================

/// Duplex byte channel the protocol runs over.
///
/// Implementations carry no framing or retry logic. A read that times out
/// returns `Ok(0)`; errors are reserved for a closed or faulted channel.
pub trait Transport: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize>;

    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        (**self).write_all(buf)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        (**self).read_timeout(buf, timeout)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Serial port backed by the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    faulted: bool,
}

impl RealSerialPort {
    pub fn open(config: &SerialConfig) -> Result<Self, serialport::Error> {
        let port = serialport::new(&config.port, config.baud)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .timeout(Duration::from_millis(100))
            .open()?;

        debug!(port = %config.port, baud = config.baud, "serial port opened");
        Ok(RealSerialPort { port, faulted: false })
    }

    fn check<T>(&mut self, result: std::io::Result<T>) -> std::io::Result<T> {
        if result.is_err() {
            self.faulted = true;
        }
        result
    }
}

impl Transport for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let result = self.port.write_all(buf).and_then(|_| self.port.flush());
        self.check(result)
    }

    // The port has a single owner, so setting its timeout per call is safe
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        if let Err(e) = self.port.set_timeout(timeout) {
            self.faulted = true;
            return Err(std::io::Error::other(e));
        }
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => self.check(Err(e)),
        }
    }

    fn is_open(&self) -> bool {
        !self.faulted
    }
}

// ============================================================================
// Mock Transport for Testing
// ============================================================================

#[cfg(test)]
pub use mock::{Gate, MockTransport, WriteLog};

#[cfg(test)]
mod mock {
    use super::Transport;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Every `write_all` call, in order
    pub type WriteLog = Arc<Mutex<Vec<Vec<u8>>>>;

    /// Holds back scripted responses until opened
    #[derive(Clone, Default)]
    pub struct Gate(Arc<AtomicBool>);

    impl Gate {
        pub fn open(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        fn is_open(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub struct MockTransport {
        // Data to return on reads (None = timeout)
        read_buffer: Vec<Option<u8>>,
        read_pos: usize,
        writes: WriteLog,
        // Fail the read at this position instead of answering
        read_fault_at: Option<usize>,
        // Fail the n-th write (0-based)
        write_fault_at: Option<usize>,
        gate: Option<Gate>,
        closed: bool,
    }

    impl MockTransport {
        pub fn new(responses: Vec<Option<u8>>) -> (Self, WriteLog) {
            let writes = WriteLog::default();
            let mock = MockTransport {
                read_buffer: responses,
                read_pos: 0,
                writes: writes.clone(),
                read_fault_at: None,
                write_fault_at: None,
                gate: None,
                closed: false,
            };
            (mock, writes)
        }

        pub fn with_read_fault_at(mut self, pos: usize) -> Self {
            self.read_fault_at = Some(pos);
            self
        }

        pub fn with_write_fault_at(mut self, call: usize) -> Self {
            self.write_fault_at = Some(call);
            self
        }

        pub fn closed(mut self) -> Self {
            self.closed = true;
            self
        }

        /// Reads time out until the returned gate is opened
        pub fn gated(mut self) -> (Self, Gate) {
            let gate = Gate::default();
            self.gate = Some(gate.clone());
            (self, gate)
        }
    }

    impl Transport for MockTransport {
        fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
            let mut writes = self.writes.lock();
            if self.write_fault_at == Some(writes.len()) {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Mock write fault"));
            }
            writes.push(buf.to_vec());
            Ok(())
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
            if self.gate.as_ref().is_some_and(|g| !g.is_open()) {
                std::thread::sleep(timeout);
                return Ok(0);
            }

            if self.read_fault_at == Some(self.read_pos) {
                self.read_fault_at = None;
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Mock read fault"));
            }

            // Out of responses = timeout
            if self.read_pos >= self.read_buffer.len() {
                std::thread::sleep(Duration::from_millis(1));
                return Ok(0);
            }

            // If current response is None = timeout
            if self.read_buffer[self.read_pos].is_none() {
                self.read_pos += 1;
                return Ok(0);
            }

            let mut bytes_read = 0;
            while bytes_read < buf.len() && self.read_pos < self.read_buffer.len() {
                match self.read_buffer[self.read_pos] {
                    Some(byte) => {
                        buf[bytes_read] = byte;
                        bytes_read += 1;
                        self.read_pos += 1;
                    }
                    None => break,  // Stop at timeout marker
                }
            }

            Ok(bytes_read)
        }

        fn is_open(&self) -> bool {
            !self.closed
        }
    }

    impl Drop for MockTransport {
        fn drop(&mut self) {
            if std::thread::panicking() {
                return;
            }
            assert_eq!(
                self.read_pos,
                self.read_buffer.len(),
                "MockTransport dropped with {} unconsumed responses (read {} of {})",
                self.read_buffer.len() - self.read_pos,
                self.read_pos,
                self.read_buffer.len()
            );
        }
    }
}
