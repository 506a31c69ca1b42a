use crate::error::{Error, Result};
use crate::position::PositionProvider;

/// A seekable byte source that serves readable windows.
///
/// A reader obtains a window with [`InputStream::next`] and may re-borrow it
/// through [`InputStream::window`] while consuming it.
pub trait InputStream {
    /// Returns the next readable window. An empty window signals the end of
    /// the stream.
    fn next(&mut self) -> Result<&[u8]>;

    /// The window most recently returned by [`InputStream::next`].
    fn window(&self) -> &[u8];

    /// Skips `count` bytes beyond the current window.
    fn skip(&mut self, count: u64) -> Result<()>;

    /// Reseats the stream at the coordinates recorded by the matching sink.
    fn seek_to_position(&mut self, provider: &mut PositionProvider) -> Result<()>;

    /// A printable name for diagnostics.
    fn name(&self) -> &str;
}

/// An in-memory [`InputStream`] over owned bytes.
///
/// Windows are capped at `block_size` bytes so readers see refill
/// boundaries even on small inputs.
pub struct SeekableArrayInputStream {
    data: Vec<u8>,
    position: usize,
    window_start: usize,
    window_length: usize,
    block_size: usize,
}

impl SeekableArrayInputStream {
    pub fn new(data: Vec<u8>) -> Self {
        let block_size = data.len().max(1);
        Self::with_block_size(data, block_size)
    }

    pub fn with_block_size(data: Vec<u8>, block_size: usize) -> Self {
        assert!(block_size > 0);
        Self {
            data,
            position: 0,
            window_start: 0,
            window_length: 0,
            block_size,
        }
    }
}

impl InputStream for SeekableArrayInputStream {
    fn next(&mut self) -> Result<&[u8]> {
        let length = self.block_size.min(self.data.len() - self.position);
        self.window_start = self.position;
        self.window_length = length;
        self.position += length;
        Ok(&self.data[self.window_start..self.window_start + length])
    }

    fn window(&self) -> &[u8] {
        &self.data[self.window_start..self.window_start + self.window_length]
    }

    fn skip(&mut self, count: u64) -> Result<()> {
        let count = count as usize;
        if self.data.len() - self.position < count {
            return Err(Error::Corrupt(format!(
                "skipped past the end of {}",
                self.name()
            )));
        }
        self.position += count;
        Ok(())
    }

    fn seek_to_position(&mut self, provider: &mut PositionProvider) -> Result<()> {
        let committed = provider.next()?;
        let offset = provider.next()?;
        let target = (committed + offset) as usize;
        if target > self.data.len() {
            return Err(Error::BadPosition(format!(
                "seek to {} past the end of {}",
                target,
                self.name()
            )));
        }
        self.position = target;
        self.window_start = target;
        self.window_length = 0;
        Ok(())
    }

    fn name(&self) -> &str {
        "SeekableArrayInputStream"
    }
}
