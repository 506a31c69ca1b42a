use std::io::Write;

use crate::error::Result;
use crate::position::PositionRecorder;

const DEFAULT_BLOCK_SIZE: usize = 1024;

/// A byte sink that hands out writable windows.
///
/// A writer obtains a window with [`OutputStream::next`], places bytes into
/// it through [`OutputStream::window_mut`] and returns an unused tail with
/// [`OutputStream::back_up`]. Everything left in a window belongs to the
/// stream.
pub trait OutputStream {
    /// Allocates the next writable window. Never empty on success.
    fn next(&mut self) -> Result<&mut [u8]>;

    /// The window most recently returned by [`OutputStream::next`].
    fn window_mut(&mut self) -> &mut [u8];

    /// Declares the last `count` bytes of the current window unused.
    fn back_up(&mut self, count: usize);

    /// Total bytes handed out and not backed up.
    fn size(&self) -> u64;

    /// Commits outstanding bytes and returns the committed size.
    fn flush(&mut self) -> Result<u64>;

    /// Records the stream-relative write position as two coordinates: bytes
    /// ahead of the current window, and the offset inside it.
    /// `buffer_length` and `buffer_position` describe the writer's view of
    /// the window it holds.
    fn record_position(
        &self,
        recorder: &mut dyn PositionRecorder,
        buffer_length: usize,
        buffer_position: usize,
        stride: Option<usize>,
    );
}

/// An [`OutputStream`] buffering windows in memory and committing them to an
/// inner writer on flush.
pub struct BufferedOutputStream<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    window_start: usize,
    flushed: u64,
    block_size: usize,
}

impl<W: Write> BufferedOutputStream<W> {
    pub fn new(writer: W) -> Self {
        Self::with_block_size(writer, DEFAULT_BLOCK_SIZE)
    }

    /// A stream serving windows of `block_size` bytes. Small blocks are
    /// useful to exercise window boundaries in tests.
    pub fn with_block_size(writer: W, block_size: usize) -> Self {
        assert!(block_size > 0);
        Self {
            writer,
            buffer: Vec::new(),
            window_start: 0,
            flushed: 0,
            block_size,
        }
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputStream for BufferedOutputStream<W> {
    fn next(&mut self) -> Result<&mut [u8]> {
        self.window_start = self.buffer.len();
        self.buffer.resize(self.window_start + self.block_size, 0);
        Ok(&mut self.buffer[self.window_start..])
    }

    fn window_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.window_start..]
    }

    fn back_up(&mut self, count: usize) {
        debug_assert!(count <= self.buffer.len() - self.window_start);
        let len = self.buffer.len() - count;
        self.buffer.truncate(len);
    }

    fn size(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    fn flush(&mut self) -> Result<u64> {
        self.writer.write_all(&self.buffer)?;
        self.writer.flush()?;
        self.flushed += self.buffer.len() as u64;
        self.buffer.clear();
        self.window_start = 0;
        Ok(self.flushed)
    }

    fn record_position(
        &self,
        recorder: &mut dyn PositionRecorder,
        buffer_length: usize,
        buffer_position: usize,
        stride: Option<usize>,
    ) {
        recorder.add(self.size() - buffer_length as u64, stride);
        recorder.add(buffer_position as u64, stride);
    }
}
