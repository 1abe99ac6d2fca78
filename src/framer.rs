//! Message framing over the raw byte stream.
//!
//! The framer owns a fixed receive buffer. The transport asks for a
//! writable region, copies received bytes into it, reports how many
//! arrived, and the engine then pulls complete frames out one at a
//! time. A message whose announced length exceeds the fixed capacity is
//! assembled in a one-shot overflow allocation that is dropped after
//! its frame has been delivered.

use crate::error::{Error, Result};

/// Fixed receive buffer capacity.
pub const BUFFER_SIZE: usize = 16 * 1024;

/// Kind byte plus the four length bytes.
const HEADER_LEN: usize = 5;

struct Overflow {
    kind: u8,
    payload: Box<[u8]>,
    filled: usize,
}

/// Splits the incoming byte stream into protocol frames.
pub struct Framer {
    buf: Box<[u8]>,
    filled: usize,
    pos: usize,
    overflow: Option<Overflow>,
    // Keeps the most recent oversized frame alive while borrowed out.
    delivered_overflow: Option<(u8, Box<[u8]>)>,
}

impl Framer {
    /// Create a framer with the fixed buffer.
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            filled: 0,
            pos: 0,
            overflow: None,
            delivered_overflow: None,
        }
    }

    /// A writable region of at least `min` bytes where possible.
    ///
    /// While an oversized message is being assembled the region points
    /// into its allocation; otherwise into the fixed buffer, compacting
    /// leftover bytes to the head first when the tail is too small.
    pub fn write_region(&mut self, min: usize) -> &mut [u8] {
        if self.overflow.is_none() && BUFFER_SIZE - self.filled < min {
            self.compact();
        }
        if let Some(overflow) = &mut self.overflow {
            return &mut overflow.payload[overflow.filled..];
        }
        &mut self.buf[self.filled..]
    }

    /// Record `n` bytes just written into the last region.
    pub fn advance(&mut self, n: usize) {
        match &mut self.overflow {
            Some(overflow) => overflow.filled += n,
            None => self.filled += n,
        }
    }

    /// The next complete frame, if one is buffered.
    ///
    /// Each frame is delivered exactly once as a contiguous slice.
    /// Returns `Ok(None)` when more bytes are needed; leftover partial
    /// bytes have been moved to the buffer head by then.
    pub fn next_frame(&mut self) -> Result<Option<(u8, &[u8])>> {
        self.delivered_overflow = None;

        match self.overflow.take() {
            Some(overflow) if overflow.filled == overflow.payload.len() => {
                let stored = self
                    .delivered_overflow
                    .insert((overflow.kind, overflow.payload));
                return Ok(Some((stored.0, &stored.1[..])));
            }
            Some(overflow) => {
                self.overflow = Some(overflow);
                return Ok(None);
            }
            None => {}
        }

        let available = self.filled - self.pos;
        if available < HEADER_LEN {
            self.compact();
            return Ok(None);
        }

        let kind = self.buf[self.pos];
        let announced = i32::from_be_bytes([
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
            self.buf[self.pos + 4],
        ]);
        if announced < 4 {
            return Err(Error::Framing(format!(
                "message {:?} announces length {announced}",
                kind as char
            )));
        }
        let payload_len = announced as usize - 4;

        if HEADER_LEN + payload_len > BUFFER_SIZE {
            // Oversized: move what is present into a one-shot allocation.
            let mut payload = vec![0u8; payload_len].into_boxed_slice();
            let present = available - HEADER_LEN;
            payload[..present]
                .copy_from_slice(&self.buf[self.pos + HEADER_LEN..self.filled]);
            self.pos = 0;
            self.filled = 0;
            self.overflow = Some(Overflow {
                kind,
                payload,
                filled: present,
            });
            return Ok(None);
        }

        if available < HEADER_LEN + payload_len {
            self.compact();
            return Ok(None);
        }

        let start = self.pos + HEADER_LEN;
        self.pos += HEADER_LEN + payload_len;
        Ok(Some((kind, &self.buf[start..start + payload_len])))
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.filled, 0);
            self.filled -= self.pos;
            self.pos = 0;
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
