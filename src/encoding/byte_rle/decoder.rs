use log::trace;

use crate::bitmap;
use crate::encoding::ceil8;
use crate::error::{Error, Result};
use crate::position::PositionProvider;
use crate::stream::InputStream;

use super::{EncodingKey, MIN_REPEAT};

/// Decodes a stream produced by [`ByteEncoder`](super::ByteEncoder).
///
/// Skips are deferred: [`ByteDecoder::skip`] and
/// [`ByteDecoder::seek_to_row_group`] only accumulate a pending count, which
/// the next read drains in a single traversal.
pub struct ByteDecoder<I: InputStream> {
    input: I,
    encoding_key: EncodingKey,
    remaining_values: u64,
    value: u8,
    repeating: bool,
    buffer_start: usize,
    buffer_end: usize,
    pending_skip: u64,
}

impl<I: InputStream> ByteDecoder<I> {
    pub fn new(input: I, encoding_key: EncodingKey) -> Self {
        Self {
            input,
            encoding_key,
            remaining_values: 0,
            value: 0,
            repeating: false,
            buffer_start: 0,
            buffer_end: 0,
            pending_skip: 0,
        }
    }

    fn next_buffer(&mut self) -> Result<()> {
        debug_assert_eq!(self.pending_skip, 0);
        let buffer = self.input.next()?;
        if buffer.is_empty() {
            return Err(Error::Corrupt(format!(
                "bad read in next_buffer {}, {}",
                self.encoding_key,
                self.input.name()
            )));
        }
        self.buffer_start = 0;
        self.buffer_end = buffer.len();
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8> {
        if self.buffer_start == self.buffer_end {
            self.next_buffer()?;
        }
        let byte = self.input.window()[self.buffer_start];
        self.buffer_start += 1;
        Ok(byte)
    }

    fn read_header(&mut self) -> Result<()> {
        let header = self.read_byte()? as i8;
        if header < 0 {
            self.remaining_values = header.unsigned_abs() as u64;
            self.repeating = false;
        } else {
            self.remaining_values = header as u64 + MIN_REPEAT as u64;
            self.repeating = true;
            self.value = self.read_byte()?;
        }
        Ok(())
    }

    /// Drops `count` payload bytes, first from the current window and then
    /// from the source.
    fn skip_bytes(&mut self, count: u64) -> Result<()> {
        let mut count = count;
        if self.buffer_start < self.buffer_end {
            let skipped = ((self.buffer_end - self.buffer_start) as u64).min(count);
            self.buffer_start += skipped as usize;
            count -= skipped;
        }
        if count > 0 {
            self.input.skip(count)?;
        }
        Ok(())
    }

    fn skip_pending(&mut self) -> Result<()> {
        let mut num_values = self.pending_skip;
        self.pending_skip = 0;
        while num_values > 0 {
            if self.remaining_values == 0 {
                self.read_header()?;
            }
            let count = num_values.min(self.remaining_values);
            self.remaining_values -= count;
            num_values -= count;
            if !self.repeating {
                self.skip_bytes(count)?;
            }
        }
        Ok(())
    }

    /// Fills every non-null position of `data` with one decoded byte; null
    /// positions are left untouched.
    pub fn next(&mut self, data: &mut [u8], nulls: Option<&[u8]>) -> Result<()> {
        self.skip_pending()?;

        let num_values = data.len();
        let mut position = 0;
        // null positions consume nothing
        while position < num_values && bitmap::is_null(nulls, position) {
            position += 1;
        }

        while position < num_values {
            if self.remaining_values == 0 {
                self.read_header()?;
            }
            let count = ((num_values - position) as u64).min(self.remaining_values) as usize;
            let mut consumed: u64 = 0;
            if self.repeating {
                if let Some(nulls) = nulls {
                    for i in 0..count {
                        if !bitmap::is_set(nulls, position + i) {
                            data[position + i] = self.value;
                            consumed += 1;
                        }
                    }
                } else {
                    data[position..position + count].fill(self.value);
                    consumed = count as u64;
                }
            } else if let Some(nulls) = nulls {
                for i in 0..count {
                    if !bitmap::is_set(nulls, position + i) {
                        data[position + i] = self.read_byte()?;
                        consumed += 1;
                    }
                }
            } else {
                let mut copied = 0;
                while copied < count {
                    if self.buffer_start == self.buffer_end {
                        self.next_buffer()?;
                    }
                    let chunk = (count - copied).min(self.buffer_end - self.buffer_start);
                    let window = self.input.window();
                    data[position + copied..position + copied + chunk]
                        .copy_from_slice(&window[self.buffer_start..self.buffer_start + chunk]);
                    self.buffer_start += chunk;
                    copied += chunk;
                }
                consumed = count as u64;
            }
            // repeats deduct only the slots actually filled; nulls consume
            // neither payload nor run length
            self.remaining_values -= consumed;
            position += count;
            while position < num_values && bitmap::is_null(nulls, position) {
                position += 1;
            }
        }
        Ok(())
    }

    /// Advances the logical position by `num_values`. Deferred until the
    /// next read.
    pub fn skip(&mut self, num_values: u64) {
        self.pending_skip += num_values;
    }

    /// Reseats the source at a recorded position and queues the in-segment
    /// skip that follows it.
    pub fn seek_to_row_group(&mut self, provider: &mut PositionProvider) -> Result<()> {
        self.input.seek_to_position(provider)?;
        // invalidate the window and the current segment
        self.buffer_start = 0;
        self.buffer_end = 0;
        self.remaining_values = 0;
        self.pending_skip = provider.next()?;
        trace!(
            "seek {} on {}, pending skip {}",
            self.encoding_key,
            self.input.name(),
            self.pending_skip
        );
        Ok(())
    }
}

/// Decodes a stream produced by [`BooleanEncoder`](super::BooleanEncoder)
/// into a dense LSB-first bitmap.
pub struct BooleanDecoder<I: InputStream> {
    inner: ByteDecoder<I>,
    remaining_bits: u64,
    reversed_last_byte: u8,
}

impl<I: InputStream> BooleanDecoder<I> {
    pub fn new(input: I, encoding_key: EncodingKey) -> Self {
        Self {
            inner: ByteDecoder::new(input, encoding_key),
            remaining_bits: 0,
            reversed_last_byte: 0,
        }
    }

    /// Advances the logical position by `num_values` bits. Deferred until
    /// the next read.
    pub fn skip(&mut self, num_values: u64) {
        self.inner.pending_skip += num_values;
    }

    /// Reseats the source at a recorded position. Consumes one coordinate
    /// beyond the byte decoder's: the bit offset inside the byte.
    pub fn seek_to_row_group(&mut self, provider: &mut PositionProvider) -> Result<()> {
        self.inner.seek_to_row_group(provider)?;
        let consumed = provider.next()?;
        if consumed > 8 {
            return Err(Error::BadPosition(format!(
                "bad position {}, {}: bit offset {} out of range",
                self.inner.encoding_key,
                self.inner.input.name(),
                consumed
            )));
        }
        self.inner.pending_skip = 8 * self.inner.pending_skip + consumed;
        self.remaining_bits = 0;
        Ok(())
    }

    /// Drains the pending bit skip: buffered bits first, then whole bytes
    /// through the byte decoder, then a sub-byte tail.
    fn skip_pending(&mut self) -> Result<()> {
        let mut num_values = self.inner.pending_skip;
        self.inner.pending_skip = 0;
        if num_values <= self.remaining_bits {
            self.remaining_bits -= num_values;
        } else {
            num_values -= self.remaining_bits;
            self.remaining_bits = 0;
            self.inner.pending_skip = num_values / 8;
            self.inner.skip_pending()?;
            let bits_to_skip = num_values % 8;
            if bits_to_skip > 0 {
                let mut byte = [0u8; 1];
                self.inner.next(&mut byte, None)?;
                self.reversed_last_byte = byte[0].reverse_bits();
                self.remaining_bits = 8 - bits_to_skip;
            }
        }
        Ok(())
    }

    /// Fills the first `num_values` bits of `data`: the `k`-th non-null
    /// position receives the `k`-th decoded value, null positions read 0.
    /// `data` must hold at least `ceil8(num_values)` bytes.
    pub fn next(&mut self, data: &mut [u8], num_values: usize, nulls: Option<&[u8]>) -> Result<()> {
        self.skip_pending()?;

        let non_nulls = match nulls {
            Some(nulls) => bitmap::count_non_nulls(nulls, 0, num_values),
            None => num_values,
        };

        let output_bytes = ceil8(num_values);
        if non_nulls == 0 {
            data[..output_bytes].fill(0);
            return Ok(());
        }

        if self.remaining_bits >= non_nulls as u64 {
            // the buffered byte alone covers this read; remaining_bits <= 8
            // so non_nulls < 8 here
            let unread = (8 - self.remaining_bits) as u32;
            data[0] = (self.reversed_last_byte >> unread) & (0xff >> (8 - non_nulls as u32));
            self.remaining_bits -= non_nulls as u64;
        } else {
            // carry the buffered bits and read the rest from the stream
            let mut previous_byte: u8 = 0;
            if self.remaining_bits > 0 {
                previous_byte = self.reversed_last_byte >> (8 - self.remaining_bits) as u32;
            }

            let bytes_read = ceil8(non_nulls - self.remaining_bits as usize);
            self.inner.next(&mut data[..bytes_read], None)?;

            bitmap::reverse_bits(&mut data[..bytes_read]);
            self.reversed_last_byte = data[bytes_read - 1];

            if self.remaining_bits > 0 {
                let shift = self.remaining_bits as u32;
                // shift whole 64-bit lanes while they last
                let non_null_words = non_nulls / 64;
                for word in 0..non_null_words {
                    let start = word * 8;
                    let lane = u64::from_le_bytes(data[start..start + 8].try_into().unwrap());
                    let shifted = previous_byte as u64 | (lane << shift);
                    data[start..start + 8].copy_from_slice(&shifted.to_le_bytes());
                    previous_byte = ((lane >> (64 - shift)) & 0xff) as u8;
                }
                // byte-at-a-time for the tail
                for i in non_null_words * 8..ceil8(non_nulls) {
                    let byte = data[i];
                    data[i] = previous_byte | (byte << shift);
                    previous_byte = byte >> (8 - shift);
                }
            }
            self.remaining_bits = bytes_read as u64 * 8 + self.remaining_bits - non_nulls as u64;
        }

        if num_values > non_nulls {
            bitmap::scatter_bits(non_nulls, num_values, data, nulls.unwrap());
        }

        // the unread high bits of the last byte belong to the next round
        data[output_bytes - 1] &= 0xff >> (output_bytes as u32 * 8 - num_values as u32);
        Ok(())
    }
}
