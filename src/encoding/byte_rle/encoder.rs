use log::debug;

use crate::bitmap;
use crate::error::{Error, Result};
use crate::position::PositionRecorder;
use crate::stream::OutputStream;

use super::{Ranges, MAX_LITERAL, MAX_REPEAT, MIN_REPEAT};

/// The capability set shared by the byte and boolean encoders.
///
/// Values enter through one of the `add` entry points, which enumerate
/// source positions via [`Ranges`] and skip positions flagged in the null
/// mask. The byte variant rejects the bit-level entry points.
pub trait Encoder {
    /// Writes the bytes of `data` at the positions of `ranges`, skipping
    /// positions flagged in `nulls`. Returns the number of values written.
    fn add(&mut self, data: &[u8], ranges: &Ranges, nulls: Option<&[u8]>) -> Result<u64>;

    /// Like [`Encoder::add`], reading values and null flags through
    /// accessors, for sources without a contiguous layout.
    fn add_with(
        &mut self,
        value_at: &dyn Fn(usize) -> u8,
        ranges: &Ranges,
        is_null_at: Option<&dyn Fn(usize) -> bool>,
    ) -> Result<u64>;

    /// Writes bits of the dense bitmap `data`, each xor-ed with `invert`.
    /// Only the boolean encoder supports this.
    fn add_bits(
        &mut self,
        data: &[u8],
        ranges: &Ranges,
        nulls: Option<&[u8]>,
        invert: bool,
    ) -> Result<u64>;

    /// Like [`Encoder::add_bits`], with accessors.
    fn add_bits_with(
        &mut self,
        value_at: &dyn Fn(usize) -> bool,
        ranges: &Ranges,
        is_null_at: Option<&dyn Fn(usize) -> bool>,
        invert: bool,
    ) -> Result<u64>;

    /// Total bytes the sink holds so far.
    fn buffer_size(&self) -> u64;

    /// Finalizes the pending segment, returns the sink's unused tail and
    /// commits. Returns the committed size.
    fn flush(&mut self) -> Result<u64>;

    /// Records the write position: the sink's coordinates followed by the
    /// number of staged values.
    fn record_position(&self, recorder: &mut dyn PositionRecorder, stride: Option<usize>);
}

/// Byte-stream encoder: stages values in a literal buffer, promotes trailing
/// runs of [`MIN_REPEAT`] equal bytes into repeat segments.
pub struct ByteEncoder<S: OutputStream> {
    output: S,
    literals: [u8; MAX_LITERAL],
    num_literals: usize,
    repeat: bool,
    tail_run_length: usize,
    buffer_position: usize,
    buffer_length: usize,
}

impl<S: OutputStream> ByteEncoder<S> {
    pub fn new(output: S) -> Self {
        Self {
            output,
            literals: [0; MAX_LITERAL],
            num_literals: 0,
            repeat: false,
            tail_run_length: 0,
            buffer_position: 0,
            buffer_length: 0,
        }
    }

    /// Returns the sink. Call after [`Encoder::flush`].
    pub fn into_output(self) -> S {
        self.output
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.buffer_position == self.buffer_length {
            let buffer = self.output.next()?;
            if buffer.is_empty() {
                return Err(Error::IoFailure(
                    "output stream returned an empty window".to_string(),
                ));
            }
            self.buffer_length = buffer.len();
            self.buffer_position = 0;
        }
        self.output.window_mut()[self.buffer_position] = byte;
        self.buffer_position += 1;
        Ok(())
    }

    /// Emits the staged values as one segment and clears the stage.
    fn write_values(&mut self) -> Result<()> {
        if self.num_literals == 0 {
            return Ok(());
        }
        if self.repeat {
            self.write_byte((self.num_literals - MIN_REPEAT) as u8)?;
            self.write_byte(self.literals[0])?;
        } else {
            self.write_byte((self.num_literals as u8).wrapping_neg())?;
            for i in 0..self.num_literals {
                let byte = self.literals[i];
                self.write_byte(byte)?;
            }
        }
        self.repeat = false;
        self.tail_run_length = 0;
        self.num_literals = 0;
        Ok(())
    }

    fn write(&mut self, value: u8) -> Result<()> {
        if self.num_literals == 0 {
            self.literals[0] = value;
            self.num_literals = 1;
            self.tail_run_length = 1;
        } else if self.repeat {
            if value == self.literals[0] {
                self.num_literals += 1;
                if self.num_literals == MAX_REPEAT {
                    self.write_values()?;
                }
            } else {
                self.write_values()?;
                self.literals[0] = value;
                self.num_literals = 1;
                self.tail_run_length = 1;
            }
        } else {
            if value == self.literals[self.num_literals - 1] {
                self.tail_run_length += 1;
            } else {
                self.tail_run_length = 1;
            }
            if self.tail_run_length == MIN_REPEAT {
                // the literal prefix ahead of the run goes out on its own
                if self.num_literals + 1 > MIN_REPEAT {
                    self.num_literals -= MIN_REPEAT - 1;
                    self.write_values()?;
                    self.literals[0] = value;
                }
                self.repeat = true;
                self.num_literals = MIN_REPEAT;
            } else {
                self.literals[self.num_literals] = value;
                self.num_literals += 1;
                if self.num_literals == MAX_LITERAL {
                    self.write_values()?;
                }
            }
        }
        Ok(())
    }

    fn flush_inner(&mut self) -> Result<u64> {
        self.write_values()?;
        self.output.back_up(self.buffer_length - self.buffer_position);
        let data_size = self.output.flush()?;
        self.buffer_length = 0;
        self.buffer_position = 0;
        debug!("flushed byte RLE stream, {} bytes", data_size);
        Ok(data_size)
    }

    fn record_position_inner(
        &self,
        recorder: &mut dyn PositionRecorder,
        stride: Option<usize>,
    ) {
        self.output
            .record_position(recorder, self.buffer_length, self.buffer_position, stride);
        recorder.add(self.num_literals as u64, stride);
    }
}

impl<S: OutputStream> Encoder for ByteEncoder<S> {
    fn add(&mut self, data: &[u8], ranges: &Ranges, nulls: Option<&[u8]>) -> Result<u64> {
        let mut count = 0;
        if let Some(nulls) = nulls {
            for pos in ranges.iter() {
                if !bitmap::is_set(nulls, pos) {
                    self.write(data[pos])?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write(data[pos])?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_with(
        &mut self,
        value_at: &dyn Fn(usize) -> u8,
        ranges: &Ranges,
        is_null_at: Option<&dyn Fn(usize) -> bool>,
    ) -> Result<u64> {
        let mut count = 0;
        if let Some(is_null_at) = is_null_at {
            for pos in ranges.iter() {
                if !is_null_at(pos) {
                    self.write(value_at(pos))?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write(value_at(pos))?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_bits(
        &mut self,
        _data: &[u8],
        _ranges: &Ranges,
        _nulls: Option<&[u8]>,
        _invert: bool,
    ) -> Result<u64> {
        Err(Error::Unsupported(
            "add_bits is only for boolean streams".to_string(),
        ))
    }

    fn add_bits_with(
        &mut self,
        _value_at: &dyn Fn(usize) -> bool,
        _ranges: &Ranges,
        _is_null_at: Option<&dyn Fn(usize) -> bool>,
        _invert: bool,
    ) -> Result<u64> {
        Err(Error::Unsupported(
            "add_bits is only for boolean streams".to_string(),
        ))
    }

    fn buffer_size(&self) -> u64 {
        self.output.size()
    }

    fn flush(&mut self) -> Result<u64> {
        self.flush_inner()
    }

    fn record_position(&self, recorder: &mut dyn PositionRecorder, stride: Option<usize>) {
        self.record_position_inner(recorder, stride);
    }
}

/// Boolean-stream encoder: packs values MSB-first into bytes and runs those
/// bytes through a [`ByteEncoder`].
pub struct BooleanEncoder<S: OutputStream> {
    inner: ByteEncoder<S>,
    bits_left: u32,
    current: u8,
}

impl<S: OutputStream> BooleanEncoder<S> {
    pub fn new(output: S) -> Self {
        Self {
            inner: ByteEncoder::new(output),
            bits_left: 8,
            current: 0,
        }
    }

    /// Returns the sink. Call after [`Encoder::flush`].
    pub fn into_output(self) -> S {
        self.inner.into_output()
    }

    fn write_byte(&mut self) -> Result<()> {
        let byte = self.current;
        self.inner.write(byte)?;
        self.bits_left = 8;
        self.current = 0;
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.bits_left -= 1;
        self.current |= (value as u8) << self.bits_left;
        if self.bits_left == 0 {
            self.write_byte()?;
        }
        Ok(())
    }
}

impl<S: OutputStream> Encoder for BooleanEncoder<S> {
    fn add(&mut self, data: &[u8], ranges: &Ranges, nulls: Option<&[u8]>) -> Result<u64> {
        let mut count = 0;
        if let Some(nulls) = nulls {
            for pos in ranges.iter() {
                if !bitmap::is_set(nulls, pos) {
                    self.write_bool(data[pos] != 0)?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write_bool(data[pos] != 0)?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_with(
        &mut self,
        value_at: &dyn Fn(usize) -> u8,
        ranges: &Ranges,
        is_null_at: Option<&dyn Fn(usize) -> bool>,
    ) -> Result<u64> {
        let mut count = 0;
        if let Some(is_null_at) = is_null_at {
            for pos in ranges.iter() {
                if !is_null_at(pos) {
                    self.write_bool(value_at(pos) != 0)?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write_bool(value_at(pos) != 0)?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_bits(
        &mut self,
        data: &[u8],
        ranges: &Ranges,
        nulls: Option<&[u8]>,
        invert: bool,
    ) -> Result<u64> {
        let mut count = 0;
        if let Some(nulls) = nulls {
            for pos in ranges.iter() {
                if !bitmap::is_set(nulls, pos) {
                    self.write_bool(invert != bitmap::is_set(data, pos))?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write_bool(invert != bitmap::is_set(data, pos))?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn add_bits_with(
        &mut self,
        value_at: &dyn Fn(usize) -> bool,
        ranges: &Ranges,
        is_null_at: Option<&dyn Fn(usize) -> bool>,
        invert: bool,
    ) -> Result<u64> {
        let mut count = 0;
        if let Some(is_null_at) = is_null_at {
            for pos in ranges.iter() {
                if !is_null_at(pos) {
                    self.write_bool(invert != value_at(pos))?;
                    count += 1;
                }
            }
        } else {
            for pos in ranges.iter() {
                self.write_bool(invert != value_at(pos))?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn buffer_size(&self) -> u64 {
        self.inner.buffer_size()
    }

    fn flush(&mut self) -> Result<u64> {
        if self.bits_left != 8 {
            self.write_byte()?;
        }
        self.inner.flush_inner()
    }

    fn record_position(&self, recorder: &mut dyn PositionRecorder, stride: Option<usize>) {
        self.inner.record_position_inner(recorder, stride);
        recorder.add((8 - self.bits_left) as u64, stride);
    }
}
