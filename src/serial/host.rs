//! Stdin/stdout serial stand-in for host builds.
//!
//! A reader thread moves stdin into a channel so the polling loop never
//! blocks on the terminal.

use super::{SerialError, SerialPort};
use log::debug;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Chunk size of the stdin reader thread.
const READ_CHUNK: usize = 256;

/// Bytes the host reports as writable per call.
const WRITE_CAPACITY: usize = 4096;

/// Serial port backed by the process' stdin and stdout.
pub struct StdioSerial {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    eof_logged: bool,
}

impl StdioSerial {
    /// Start the stdin reader thread.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            rx,
            pending: VecDeque::new(),
            eof_logged: false,
        }
    }
}

impl Default for StdioSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for StdioSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.eof_logged {
                        debug!("stdin closed");
                        self.eof_logged = true;
                    }
                    break;
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()?;
        Ok(data.len())
    }

    fn available_for_write(&self) -> Result<usize, SerialError> {
        Ok(WRITE_CAPACITY)
    }
}
