use crate::result::IonResult;
use std::io::Write;

const BITS_PER_ENCODED_BYTE: usize = 7;

const LOWER_7_BITMASK: u8 = 0b0111_1111;
const HIGHEST_BIT_VALUE: u8 = 0b1000_0000;

/// Helpers for the variable-length unsigned integers used for lengths, field IDs, and
/// annotations. See the
/// [VarUInt and VarInt Fields](https://amazon-ion.github.io/ion-docs/docs/binary.html#varuint-and-varint-fields)
/// section of the Ion binary encoding documentation for more details.
#[derive(Debug)]
pub struct VarUInt;

impl VarUInt {
    /// Encodes the given unsigned int value as a VarUInt and writes it to the
    /// sink, returning the number of bytes written.
    pub fn write_u64<W: Write>(sink: &mut W, mut magnitude: u64) -> IonResult<usize> {
        // A u64 is 64 bits of data; at 7 bits per byte that takes 10 bytes.
        const VAR_UINT_BUFFER_SIZE: usize = 10;

        // Create a buffer to store the encoded value.
        #[rustfmt::skip]
        let mut buffer: [u8; VAR_UINT_BUFFER_SIZE] = [
            0, 0, 0, 0, 0, 0, 0, 0, 0, HIGHEST_BIT_VALUE
            //                           ^-- Set the 'end' flag of the final byte to 1
        ];

        if magnitude == 0 {
            sink.write_all(&[HIGHEST_BIT_VALUE])?;
            return Ok(1);
        }

        // The encoding process moves right-to-left, from the last byte in the buffer to the first.
        // `first_byte` tracks the leftmost byte in the buffer that contains encoded data.
        // We will always write at least one byte.
        let mut first_byte = VAR_UINT_BUFFER_SIZE;
        for buffer_byte in buffer.iter_mut().rev() {
            first_byte -= 1;
            *buffer_byte |= magnitude as u8 & LOWER_7_BITMASK;
            magnitude >>= BITS_PER_ENCODED_BYTE;
            if magnitude == 0 {
                break;
            }
        }

        let encoded_bytes = &buffer[first_byte..];
        sink.write_all(encoded_bytes)?;
        Ok(encoded_bytes.len())
    }

    /// Returns the number of bytes needed to encode `value` as a VarUInt.
    #[inline]
    pub fn encoded_size(value: u64) -> usize {
        let bits = (u64::BITS - value.leading_zeros()) as usize;
        bits.max(1).div_ceil(BITS_PER_ENCODED_BYTE)
    }
}

/// Helpers for the signed counterpart of [`VarUInt`], whose first byte spends one bit on the
/// sign.
#[derive(Debug)]
pub struct VarInt;

impl VarInt {
    /// Returns the number of bytes needed to encode a VarInt with the given magnitude.
    #[inline]
    pub fn encoded_size(magnitude: u64) -> usize {
        let bits = (u64::BITS - magnitude.leading_zeros()) as usize + 1;
        bits.div_ceil(BITS_PER_ENCODED_BYTE)
    }
}
