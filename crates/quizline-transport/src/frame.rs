//! Reassembles newline-delimited frames from arbitrarily chunked reads.
//!
//! TCP gives no message boundaries: one write may arrive over several
//! reads, and several writes may arrive in one. The reader buffers
//! whatever it is given and hands back a frame only once its terminating
//! newline has been seen.

use quizline_protocol::FRAME_TERMINATOR;

/// An appendable buffer that yields complete frames.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete frame, without its newline.
    ///
    /// Empty frames (two newlines in a row) are skipped. Returns `None`
    /// once no newline remains; the partial tail stays buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let end = self
                .buffer
                .iter()
                .position(|b| *b == FRAME_TERMINATOR)?;
            let mut frame: Vec<u8> = self.buffer.drain(..=end).collect();
            frame.pop();
            if !frame.is_empty() {
                return Some(frame);
            }
        }
    }

    /// Drains every complete frame currently buffered.
    pub fn frames(&mut self) -> impl Iterator<Item = Vec<u8>> + '_ {
        std::iter::from_fn(move || self.next_frame())
    }

    /// Bytes held back waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
