//! Bounded line accumulator for the password and provisioning exchanges.
//!
//! Lines end with a carriage return. At most [`LINE_CAPACITY`]` - 1` content
//! bytes are kept; once full, every further byte lands in the reserved last
//! slot and is dropped from the line when the terminator arrives. Nothing is
//! reported to the client.

use zeroize::Zeroize;

/// Size of the line buffer, including the slot reserved for the terminator.
pub const LINE_CAPACITY: usize = 100;

/// Line terminator sent by clients.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Result of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    /// Still waiting for the terminator.
    Pending,
    /// The terminator arrived; the line is in [`LineBuffer::as_bytes`].
    Complete,
}

/// Fixed-capacity line buffer, wiped on every reset.
#[derive(Zeroize)]
pub struct LineBuffer {
    buf: [u8; LINE_CAPACITY],
    len: usize,
    overflowed: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
            overflowed: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> Push {
        if byte == LINE_TERMINATOR {
            // The terminator takes the reserved slot, same as any overflow
            // byte, so the line never exceeds the content capacity.
            self.buf[self.len] = 0;
            return Push::Complete;
        }

        self.buf[self.len] = byte;
        if self.len < LINE_CAPACITY - 1 {
            self.len += 1;
        } else {
            self.overflowed = true;
        }
        Push::Pending
    }

    /// Accumulated line without the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether bytes were discarded since the last reset.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Wipe the contents and start a new line.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LineBuffer {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for LineBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineBuffer")
            .field("len", &self.len)
            .field("overflowed", &self.overflowed)
            .finish_non_exhaustive()
    }
}
