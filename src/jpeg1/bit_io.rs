//! Bit-level access to entropy-coded segments.
//! Handles byte stuffing (FF00), fill bytes and marker detection.

use crate::error::JpegError;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JPEG_RESTART_MARKER_BASE, JPEG_RESTART_MARKER_RANGE};

/// Reads MSB-first bits from an entropy-coded segment.
///
/// The reader stops in front of the first marker it meets and from then on
/// returns zero bits, which lets a truncated scan decode to completion. Whether
/// any of those padding bits were actually consumed is reported by
/// [`JpegBitReader::overrun`].
pub struct JpegBitReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u64,
    bits_in_buffer: u32,
    // Bits at the front of the buffer that came from the source.
    real_bits: u32,
    marker: Option<u8>,
    overrun: bool,
    corrupt: bool,
}

impl<'a> JpegBitReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
            real_bits: 0,
            marker: None,
            overrun: false,
            corrupt: false,
        }
    }

    /// Byte offset of the first byte not yet loaded. Points at the `FF` of the
    /// marker once one has been found.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Code of the marker the reader stopped at.
    pub fn marker(&self) -> Option<u8> {
        self.marker
    }

    pub fn overrun(&self) -> bool {
        self.overrun
    }

    pub fn corrupt(&self) -> bool {
        self.corrupt
    }

    pub fn mark_corrupt(&mut self) {
        self.corrupt = true;
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.marker.is_some() {
            return None;
        }
        let byte = *self.source.get(self.position)?;
        if byte != JPEG_MARKER_START_BYTE {
            self.position += 1;
            return Some(byte);
        }

        let mut next = self.position + 1;
        loop {
            match self.source.get(next) {
                None => {
                    self.position = self.source.len();
                    return None;
                }
                Some(0x00) => {
                    self.position = next + 1;
                    return Some(JPEG_MARKER_START_BYTE);
                }
                Some(&JPEG_MARKER_START_BYTE) => next += 1,
                Some(&code) => {
                    self.position = next - 1;
                    self.marker = Some(code);
                    return None;
                }
            }
        }
    }

    fn fill(&mut self, count: u32) {
        while self.bits_in_buffer < count {
            let byte = match self.next_byte() {
                Some(byte) => {
                    self.real_bits += 8;
                    byte
                }
                None => 0,
            };
            self.bit_buffer = (self.bit_buffer << 8) | byte as u64;
            self.bits_in_buffer += 8;
        }
    }

    /// Returns the next `count` (at most 16) bits without consuming them.
    pub fn peek_bits(&mut self, count: u32) -> u32 {
        debug_assert!(count <= 16);
        if count == 0 {
            return 0;
        }
        self.fill(count);
        ((self.bit_buffer >> (self.bits_in_buffer - count)) & ((1u64 << count) - 1)) as u32
    }

    pub fn consume_bits(&mut self, count: u32) {
        self.fill(count);
        self.bits_in_buffer -= count;
        self.bit_buffer &= (1u64 << self.bits_in_buffer) - 1;
        if count > self.real_bits {
            self.overrun = true;
            self.real_bits = 0;
        } else {
            self.real_bits -= count;
        }
    }

    pub fn read_bits(&mut self, count: u32) -> u32 {
        let value = self.peek_bits(count);
        self.consume_bits(count);
        value
    }

    /// Reads `category` bits and sign-extends them (ISO/IEC 10918-1 F.2.2.1).
    pub fn receive_extend(&mut self, category: u8) -> i32 {
        if category == 0 {
            return 0;
        }
        let bits = self.read_bits(category as u32);
        extend(bits, category)
    }

    /// Drops any buffered bits so the next read starts on a byte boundary.
    pub fn align_to_byte(&mut self) {
        self.bit_buffer = 0;
        self.bits_in_buffer = 0;
        self.real_bits = 0;
    }

    /// Discards bytes up to the next marker and returns how many were skipped.
    pub fn skip_to_marker(&mut self) -> usize {
        self.align_to_byte();
        let start = self.position;
        while self.marker.is_none() && self.position < self.source.len() {
            if self.next_byte().is_none() {
                break;
            }
        }
        self.position - start
    }

    /// Consumes the marker the reader stopped at, resetting the bit state.
    pub fn take_marker(&mut self) -> Option<u8> {
        let code = self.marker.take()?;
        self.position += 2;
        self.align_to_byte();
        Some(code)
    }
}

/// Sign-extends a `category`-bit magnitude (ISO/IEC 10918-1 F.2.2.1 EXTEND).
pub fn extend(bits: u32, category: u8) -> i32 {
    if category == 0 {
        return 0;
    }
    let value = bits as i32;
    if value < (1 << (category - 1)) {
        value - (1 << category) + 1
    } else {
        value
    }
}

/// Packs MSB-first bits into a destination slice with JPEG byte stuffing.
pub struct JpegBitWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
    bit_buffer: u32,
    bits_in_buffer: u32,
}

impl<'a> JpegBitWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn write_bits(&mut self, value: u32, length: u32) -> Result<(), JpegError> {
        debug_assert!(length <= 16);
        if length == 0 {
            return Ok(());
        }
        let mask = (1u32 << length) - 1;
        self.bit_buffer = (self.bit_buffer << length) | (value & mask);
        self.bits_in_buffer += length;

        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            let byte = (self.bit_buffer >> shift) as u8;
            self.emit_byte(byte)?;
            self.bits_in_buffer = shift;
            self.bit_buffer &= (1u32 << shift) - 1;
        }
        Ok(())
    }

    fn put(&mut self, byte: u8) -> Result<(), JpegError> {
        let slot = self
            .destination
            .get_mut(self.position)
            .ok_or(JpegError::DestinationTooSmall)?;
        *slot = byte;
        self.position += 1;
        Ok(())
    }

    fn emit_byte(&mut self, byte: u8) -> Result<(), JpegError> {
        self.put(byte)?;
        if byte == JPEG_MARKER_START_BYTE {
            self.put(0x00)?;
        }
        Ok(())
    }

    /// Pads the final partial byte with one-bits.
    pub fn flush(&mut self) -> Result<(), JpegError> {
        if self.bits_in_buffer > 0 {
            let pad_bits = 8 - self.bits_in_buffer;
            self.write_bits((1u32 << pad_bits) - 1, pad_bits)?;
        }
        Ok(())
    }

    /// Flushes and emits RSTn, where n is `index` modulo 8.
    pub fn write_restart_marker(&mut self, index: u32) -> Result<(), JpegError> {
        self.flush()?;
        self.put(JPEG_MARKER_START_BYTE)?;
        self.put(JPEG_RESTART_MARKER_BASE + (index % JPEG_RESTART_MARKER_RANGE as u32) as u8)
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }
}
