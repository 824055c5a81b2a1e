use std::io::Write;

use crate::binary::block::{Block, BlockAllocator};
use crate::binary::var_uint::{VarInt, VarUInt};
use crate::result::{encoding_error, IonResult};

const VAR_INT_FINAL_OCTET_SIGNAL_MASK: u8 = 0x80;
const VAR_INT_MASK: u64 = 0x7F;
const VAR_INT_SIGNED_OCTET_MASK: u64 = 0x3F;
const VAR_INT_SIGN_BIT: u8 = 0x40;
const BITS_PER_VAR_INT_OCTET: usize = 7;
// The largest VarUInt/VarInt that a u64 magnitude can produce.
const MAX_VAR_INT_OCTETS: usize = 10;

const HIGH_SURROGATE_FIRST: u16 = 0xD800;
const HIGH_SURROGATE_LAST: u16 = 0xDBFF;
const LOW_SURROGATE_FIRST: u16 = 0xDC00;
const LOW_SURROGATE_LAST: u16 = 0xDFFF;
const SURROGATE_BASE: u32 = 0x10000;

const UTF8_2_OCTET_MIN_VALUE: u16 = 0x80;
const UTF8_3_OCTET_MIN_VALUE: u16 = 0x800;
const UTF8_FOLLOW_MASK: u32 = 0x3F;
const UTF8_FOLLOW_PREFIX: u32 = 0x80;
const UTF8_2_OCTET_PREFIX: u32 = 0xC0;
const UTF8_3_OCTET_PREFIX: u32 = 0xE0;
const UTF8_4_OCTET_PREFIX: u32 = 0xF0;

#[inline]
fn is_high_surrogate(unit: u16) -> bool {
    (HIGH_SURROGATE_FIRST..=HIGH_SURROGATE_LAST).contains(&unit)
}

#[inline]
fn is_low_surrogate(unit: u16) -> bool {
    (LOW_SURROGATE_FIRST..=LOW_SURROGATE_LAST).contains(&unit)
}

/// A logically unbounded byte buffer made up of fixed-size [`Block`]s.
///
/// Positions are absolute offsets from the start of the buffer; a position `p` lives in block
/// `p / block_size` at offset `p % block_size`. Appends always go to the current block, spilling
/// into a new one as it fills. The `*_at` methods overwrite bytes that were already written and
/// never grow the buffer.
#[derive(Debug)]
pub struct WriteBuffer {
    allocator: Box<dyn BlockAllocator>,
    block_size: usize,
    blocks: Vec<Block>,
    // Index of the block currently receiving appends.
    index: usize,
}

impl WriteBuffer {
    pub fn new(allocator: Box<dyn BlockAllocator>) -> Self {
        let block_size = allocator.block_size();
        let first = allocator.allocate_block();
        WriteBuffer {
            allocator,
            block_size,
            blocks: vec![first],
            index: 0,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Releases every block and starts over with a single empty one.
    pub fn reset(&mut self) {
        self.close();
        self.blocks.push(self.allocator.allocate_block());
    }

    /// Releases every block back to the allocator. The buffer may still be written to afterwards;
    /// it will allocate a fresh block on demand.
    pub fn close(&mut self) {
        self.blocks.clear();
        self.index = 0;
    }

    /// Rewinds the buffer to `position`, discarding everything written after it. Blocks beyond
    /// the new end are kept and reused by later writes.
    pub fn truncate(&mut self, position: usize) {
        debug_assert!(position <= self.position());
        let (index, limit) = if position > 0 && position % self.block_size == 0 {
            // The end of a full block; appends will roll over to the next block lazily.
            (position / self.block_size - 1, self.block_size)
        } else {
            (position / self.block_size, position % self.block_size)
        };
        if index >= self.blocks.len() {
            return;
        }
        self.index = index;
        self.blocks[index].set_limit(limit);
        for block in &mut self.blocks[index + 1..] {
            block.reset();
        }
    }

    /// The number of bytes that can be appended before the current block fills.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.blocks
            .get(self.index)
            .map_or(self.block_size, Block::remaining)
    }

    /// The logical position of the next byte to be appended. This is also the number of bytes
    /// in the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.index * self.block_size + self.blocks.get(self.index).map_or(0, Block::limit)
    }

    #[inline]
    fn current(&mut self) -> &mut Block {
        if self.blocks.is_empty() {
            self.blocks.push(self.allocator.allocate_block());
            self.index = 0;
        }
        &mut self.blocks[self.index]
    }

    fn advance_block(&mut self) {
        if self.index + 1 >= self.blocks.len() {
            self.blocks.push(self.allocator.allocate_block());
        }
        self.index += 1;
        self.blocks[self.index].reset();
    }

    /// Returns the byte at an already-written position.
    pub fn get_u8_at(&self, position: usize) -> u8 {
        let block = &self.blocks[position / self.block_size];
        block.data()[position % self.block_size]
    }

    /// Appends a single byte, growing the buffer if necessary.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        if self.remaining() == 0 {
            self.advance_block();
        }
        let block = self.current();
        let limit = block.limit();
        block.data_mut()[limit] = byte;
        block.set_limit(limit + 1);
    }

    // Copies across as many block boundaries as needed.
    fn write_bytes_slow(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.remaining() == 0 {
                self.advance_block();
            }
            let block = self.current();
            let limit = block.limit();
            let amount = bytes.len().min(block.remaining());
            block.data_mut()[limit..limit + amount].copy_from_slice(&bytes[..amount]);
            block.set_limit(limit + amount);
            bytes = &bytes[amount..];
        }
    }

    /// Appends a slice of bytes, growing the buffer if necessary.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if bytes.len() > self.remaining() {
            return self.write_bytes_slow(bytes);
        }
        let block = self.current();
        let limit = block.limit();
        block.data_mut()[limit..limit + bytes.len()].copy_from_slice(bytes);
        block.set_limit(limit + bytes.len());
    }

    /// Appends the `octets` low-order bytes of `value` in big-endian order. Higher bytes are
    /// ignored.
    pub fn write_uint(&mut self, value: u64, octets: usize) {
        debug_assert!(octets <= 8);
        let bytes = value.to_be_bytes();
        self.write_bytes(&bytes[bytes.len() - octets..]);
    }

    /// Appends `value` as a signed-magnitude integer of exactly `octets` bytes. The magnitude
    /// must fit in `octets * 8 - 1` bits.
    pub fn write_int(&mut self, value: i64, octets: usize) {
        debug_assert!((1..=8).contains(&octets));
        let mut magnitude = value.unsigned_abs();
        if value < 0 {
            magnitude |= 1 << (octets * 8 - 1);
        }
        self.write_uint(magnitude, octets);
    }

    /// Appends `value` as a VarUInt and returns the number of bytes written.
    pub fn write_var_uint(&mut self, value: u64) -> usize {
        if value <= VAR_INT_MASK {
            self.write_byte(value as u8 | VAR_INT_FINAL_OCTET_SIGNAL_MASK);
            return 1;
        }
        let size = VarUInt::encoded_size(value);
        let mut encoded = [0u8; MAX_VAR_INT_OCTETS];
        let start = MAX_VAR_INT_OCTETS - size;
        let mut remaining = value;
        for byte in encoded[start..].iter_mut().rev() {
            *byte = (remaining & VAR_INT_MASK) as u8;
            remaining >>= BITS_PER_VAR_INT_OCTET;
        }
        encoded[MAX_VAR_INT_OCTETS - 1] |= VAR_INT_FINAL_OCTET_SIGNAL_MASK;
        self.write_bytes(&encoded[start..]);
        size
    }

    /// Appends `value` as a VarInt and returns the number of bytes written.
    pub fn write_var_int(&mut self, value: i64) -> usize {
        self.write_var_int_parts(value < 0, value.unsigned_abs())
    }

    /// Appends a VarInt built from a sign and magnitude. This can express negative zero, which
    /// decimal exponents never need but timestamp offsets do (`-00:00`).
    pub(crate) fn write_var_int_parts(&mut self, is_negative: bool, magnitude: u64) -> usize {
        let sign = if is_negative { VAR_INT_SIGN_BIT } else { 0 };
        if magnitude <= VAR_INT_SIGNED_OCTET_MASK {
            self.write_byte(magnitude as u8 | sign | VAR_INT_FINAL_OCTET_SIGNAL_MASK);
            return 1;
        }
        let size = VarInt::encoded_size(magnitude);
        let mut encoded = [0u8; MAX_VAR_INT_OCTETS];
        let start = MAX_VAR_INT_OCTETS - size;
        let mut remaining = magnitude;
        for byte in encoded[start..].iter_mut().rev() {
            *byte = (remaining & VAR_INT_MASK) as u8;
            remaining >>= BITS_PER_VAR_INT_OCTET;
        }
        encoded[start] |= sign;
        encoded[MAX_VAR_INT_OCTETS - 1] |= VAR_INT_FINAL_OCTET_SIGNAL_MASK;
        self.write_bytes(&encoded[start..]);
        size
    }

    /// Overwrites the byte at `position`.
    pub fn write_u8_at(&mut self, position: usize, value: u8) {
        let block = &mut self.blocks[position / self.block_size];
        block.data_mut()[position % self.block_size] = value;
    }

    /// Overwrites the byte at `position` with a one-byte VarUInt. `value` must be below 128.
    pub fn write_var_uint_direct1_at(&mut self, position: usize, value: u64) {
        debug_assert!(value <= VAR_INT_MASK);
        self.write_u8_at(
            position,
            (value & VAR_INT_MASK) as u8 | VAR_INT_FINAL_OCTET_SIGNAL_MASK,
        );
    }

    /// Overwrites the two bytes at `position` with a two-byte VarUInt, which may straddle two
    /// blocks. `value` must be below 16384.
    pub fn write_var_uint_direct2_at(&mut self, position: usize, value: u64) {
        debug_assert!(value < 1 << (2 * BITS_PER_VAR_INT_OCTET));
        let high = ((value >> BITS_PER_VAR_INT_OCTET) & VAR_INT_MASK) as u8;
        let low = (value & VAR_INT_MASK) as u8 | VAR_INT_FINAL_OCTET_SIGNAL_MASK;
        let index = position / self.block_size;
        let offset = position % self.block_size;
        if offset + 2 > self.block_size {
            self.blocks[index].data_mut()[offset] = high;
            self.blocks[index + 1].data_mut()[0] = low;
            return;
        }
        let data = self.blocks[index].data_mut();
        data[offset] = high;
        data[offset + 1] = low;
    }

    /// Appends `text` as UTF-8 and returns the number of bytes written.
    pub fn write_utf8(&mut self, text: &str) -> usize {
        self.write_bytes(text.as_bytes());
        text.len()
    }

    /// Transcodes UTF-16 code units to UTF-8, appending the result. Returns the number of bytes
    /// written.
    ///
    /// Runs of ASCII, two-byte, and three-byte characters are encoded straight into the current
    /// block when it can hold the worst case for the rest of the input; anything else (surrogate
    /// pairs, block boundaries) takes the general path. Every path produces the same bytes.
    pub fn write_utf16(&mut self, units: &[u16]) -> IonResult<usize> {
        if units.len() > self.remaining() {
            return self.write_utf16_slow(units);
        }
        let block = self.current();
        let mut limit = block.limit();
        let data = block.data_mut();
        let mut consumed = 0;
        for &unit in units {
            if unit >= UTF8_2_OCTET_MIN_VALUE {
                // Lost the ASCII bet.
                break;
            }
            data[limit] = unit as u8;
            limit += 1;
            consumed += 1;
        }
        block.set_limit(limit);

        let rest = &units[consumed..];
        let octets = consumed;
        match rest.first() {
            None => Ok(octets),
            Some(&unit) if unit < UTF8_3_OCTET_MIN_VALUE => {
                Ok(octets + self.write_utf16_up_to_2_byte(rest)?)
            }
            Some(&unit) if is_low_surrogate(unit) => unpaired_low_surrogate(unit),
            Some(&unit) if is_high_surrogate(unit) => Ok(octets + self.write_utf16_slow(rest)?),
            Some(_) => Ok(octets + self.write_utf16_up_to_3_byte(rest)?),
        }
    }

    fn write_utf16_up_to_2_byte(&mut self, units: &[u16]) -> IonResult<usize> {
        if units.len() * 2 > self.remaining() {
            return self.write_utf16_slow(units);
        }
        let block = self.current();
        let mut limit = block.limit();
        let start = limit;
        let data = block.data_mut();
        let mut consumed = 0;
        for &unit in units {
            if unit >= UTF8_3_OCTET_MIN_VALUE {
                // Lost the two-byte bet.
                break;
            }
            if unit < UTF8_2_OCTET_MIN_VALUE {
                data[limit] = unit as u8;
                limit += 1;
            } else {
                let ch = unit as u32;
                data[limit] = (UTF8_2_OCTET_PREFIX | (ch >> 6)) as u8;
                data[limit + 1] = (UTF8_FOLLOW_PREFIX | (ch & UTF8_FOLLOW_MASK)) as u8;
                limit += 2;
            }
            consumed += 1;
        }
        block.set_limit(limit);

        let octets = limit - start;
        let rest = &units[consumed..];
        match rest.first() {
            None => Ok(octets),
            Some(&unit) if is_low_surrogate(unit) => unpaired_low_surrogate(unit),
            Some(&unit) if is_high_surrogate(unit) => Ok(octets + self.write_utf16_slow(rest)?),
            Some(_) => Ok(octets + self.write_utf16_up_to_3_byte(rest)?),
        }
    }

    fn write_utf16_up_to_3_byte(&mut self, units: &[u16]) -> IonResult<usize> {
        if units.len() * 3 > self.remaining() {
            return self.write_utf16_slow(units);
        }
        let block = self.current();
        let mut limit = block.limit();
        let start = limit;
        let data = block.data_mut();
        let mut consumed = 0;
        let mut low_surrogate = None;
        for &unit in units {
            if is_low_surrogate(unit) {
                low_surrogate = Some(unit);
                break;
            }
            if is_high_surrogate(unit) {
                // Lost the three-byte bet.
                break;
            }
            let ch = unit as u32;
            if unit < UTF8_2_OCTET_MIN_VALUE {
                data[limit] = unit as u8;
                limit += 1;
            } else if unit < UTF8_3_OCTET_MIN_VALUE {
                data[limit] = (UTF8_2_OCTET_PREFIX | (ch >> 6)) as u8;
                data[limit + 1] = (UTF8_FOLLOW_PREFIX | (ch & UTF8_FOLLOW_MASK)) as u8;
                limit += 2;
            } else {
                data[limit] = (UTF8_3_OCTET_PREFIX | (ch >> 12)) as u8;
                data[limit + 1] = (UTF8_FOLLOW_PREFIX | ((ch >> 6) & UTF8_FOLLOW_MASK)) as u8;
                data[limit + 2] = (UTF8_FOLLOW_PREFIX | (ch & UTF8_FOLLOW_MASK)) as u8;
                limit += 3;
            }
            consumed += 1;
        }
        block.set_limit(limit);

        if let Some(unit) = low_surrogate {
            return unpaired_low_surrogate(unit);
        }
        let octets = limit - start;
        let rest = &units[consumed..];
        if rest.is_empty() {
            return Ok(octets);
        }
        Ok(octets + self.write_utf16_slow(rest)?)
    }

    // Handles every character class and any block boundary, one byte at a time.
    fn write_utf16_slow(&mut self, units: &[u16]) -> IonResult<usize> {
        let mut octets = 0;
        let mut iter = units.iter().copied();
        while let Some(unit) = iter.next() {
            if is_low_surrogate(unit) {
                return unpaired_low_surrogate(unit);
            }
            let ch = unit as u32;
            if is_high_surrogate(unit) {
                let low = match iter.next() {
                    Some(low) if is_low_surrogate(low) => low,
                    Some(other) => {
                        return encoding_error(format!(
                            "high surrogate {unit:#06X} followed by {other:#06X} instead of a low surrogate"
                        ))
                    }
                    None => {
                        return encoding_error(format!(
                            "unpaired high surrogate {unit:#06X} at end of text"
                        ))
                    }
                };
                let code_point = (((ch - HIGH_SURROGATE_FIRST as u32) << 10)
                    | (low as u32 - LOW_SURROGATE_FIRST as u32))
                    + SURROGATE_BASE;
                self.write_byte((UTF8_4_OCTET_PREFIX | (code_point >> 18)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | ((code_point >> 12) & UTF8_FOLLOW_MASK)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | ((code_point >> 6) & UTF8_FOLLOW_MASK)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | (code_point & UTF8_FOLLOW_MASK)) as u8);
                octets += 4;
            } else if unit < UTF8_2_OCTET_MIN_VALUE {
                self.write_byte(unit as u8);
                octets += 1;
            } else if unit < UTF8_3_OCTET_MIN_VALUE {
                self.write_byte((UTF8_2_OCTET_PREFIX | (ch >> 6)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | (ch & UTF8_FOLLOW_MASK)) as u8);
                octets += 2;
            } else {
                self.write_byte((UTF8_3_OCTET_PREFIX | (ch >> 12)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | ((ch >> 6) & UTF8_FOLLOW_MASK)) as u8);
                self.write_byte((UTF8_FOLLOW_PREFIX | (ch & UTF8_FOLLOW_MASK)) as u8);
                octets += 3;
            }
        }
        Ok(octets)
    }

    /// Writes the entire contents of the buffer to `out`, in block order.
    pub fn write_to<W: Write>(&self, out: &mut W) -> IonResult<()> {
        let end = (self.index + 1).min(self.blocks.len());
        for block in &self.blocks[..end] {
            out.write_all(block.bytes())?;
        }
        Ok(())
    }

    /// Writes `length` bytes starting at `position` to `out`.
    pub fn write_range_to<W: Write>(
        &self,
        out: &mut W,
        mut position: usize,
        mut length: usize,
    ) -> IonResult<()> {
        while length > 0 {
            let block = &self.blocks[position / self.block_size];
            let offset = position % self.block_size;
            let amount = (self.block_size - offset).min(length);
            out.write_all(&block.data()[offset..offset + amount])?;
            position += amount;
            length -= amount;
        }
        Ok(())
    }
}

fn unpaired_low_surrogate<T>(unit: u16) -> IonResult<T> {
    encoding_error(format!("unpaired low surrogate {unit:#06X}"))
}
