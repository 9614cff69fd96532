//! Huffman coding for sequential JPEG.
//! Handles table construction, the Annex K standard tables and optimal
//! table generation from symbol statistics.

use crate::error::JpegError;
use crate::jpeg1::bit_io::{JpegBitReader, JpegBitWriter};

/// Number of bits resolved by a single lookup when decoding.
pub const HUFFMAN_LOOKAHEAD_BITS: u32 = 9;
const LOOKAHEAD_SIZE: usize = 1 << HUFFMAN_LOOKAHEAD_BITS;
const MAXIMUM_CODE_LENGTH: usize = 16;

/// Represents a Huffman code with its bit value and length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub value: u16,
    pub length: u8,
}

/// Standard DC luminance table (ISO/IEC 10918-1 Table K.3).
pub const STD_LUMINANCE_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_LUMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard DC chrominance table (Table K.4).
pub const STD_CHROMINANCE_DC_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
pub const STD_CHROMINANCE_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Standard AC luminance table (Table K.5).
pub const STD_LUMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
#[rustfmt::skip]
pub const STD_LUMINANCE_AC_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12,
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08,
    0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16,
    0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59,
    0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79,
    0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98,
    0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
    0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4,
    0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea,
    0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Standard AC chrominance table (Table K.6).
pub const STD_CHROMINANCE_AC_LENGTHS: [u8; 16] = [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
#[rustfmt::skip]
pub const STD_CHROMINANCE_AC_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21,
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91,
    0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34,
    0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38,
    0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58,
    0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78,
    0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96,
    0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
    0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2,
    0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9,
    0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

/// Canonical Huffman table usable for both encoding and decoding.
#[derive(Clone)]
pub struct HuffmanTable {
    pub codes: [HuffmanCode; 256],
    pub lengths: [u8; 16],
    pub values: Vec<u8>,

    // Decoding fields, indexed by code length 1..=16.
    min_code: [i32; 17],
    max_code: [i32; 18],
    val_ptr: [i32; 17],
    // (code length, symbol) for every HUFFMAN_LOOKAHEAD_BITS-bit prefix; length 0 = slow path.
    lookup: Box<[(u8, u8); LOOKAHEAD_SIZE]>,
}

impl std::fmt::Debug for HuffmanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuffmanTable")
            .field("lengths", &self.lengths)
            .field("values", &self.values)
            .finish()
    }
}

impl PartialEq for HuffmanTable {
    fn eq(&self, other: &Self) -> bool {
        self.lengths == other.lengths && self.values == other.values
    }
}

impl HuffmanTable {
    /// Builds a table from DHT code counts and symbols (ISO/IEC 10918-1 C.2).
    pub fn build_from_dht(lengths: &[u8; 16], values: &[u8]) -> Result<Self, JpegError> {
        let total: usize = lengths.iter().map(|&count| count as usize).sum();
        if total > 256 || total != values.len() {
            return Err(JpegError::InvalidHuffmanTable);
        }

        let mut table = Self {
            codes: [HuffmanCode::default(); 256],
            lengths: *lengths,
            values: values.to_vec(),
            min_code: [0; 17],
            max_code: [-1; 18],
            val_ptr: [0; 17],
            lookup: Box::new([(0, 0); LOOKAHEAD_SIZE]),
        };
        // Sentinel so the slow path always terminates.
        table.max_code[17] = i32::MAX;

        let mut code = 0u32;
        let mut index = 0usize;
        for length in 1..=MAXIMUM_CODE_LENGTH {
            let count = lengths[length - 1] as usize;
            if count > 0 {
                table.val_ptr[length] = index as i32;
                table.min_code[length] = code as i32;
                for _ in 0..count {
                    let symbol = values[index];
                    table.codes[symbol as usize] = HuffmanCode {
                        value: code as u16,
                        length: length as u8,
                    };
                    if length as u32 <= HUFFMAN_LOOKAHEAD_BITS {
                        let shift = HUFFMAN_LOOKAHEAD_BITS - length as u32;
                        let first = (code << shift) as usize;
                        for slot in &mut table.lookup[first..first + (1 << shift)] {
                            *slot = (length as u8, symbol);
                        }
                    }
                    code += 1;
                    index += 1;
                }
                table.max_code[length] = code as i32 - 1;
            }
            // The all-ones code of each length is reserved.
            if code >= (1u32 << length) {
                return Err(JpegError::InvalidHuffmanTable);
            }
            code <<= 1;
        }
        Ok(table)
    }

    pub fn standard_luminance_dc() -> Self {
        Self::standard(&STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES)
    }

    pub fn standard_luminance_ac() -> Self {
        Self::standard(&STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES)
    }

    pub fn standard_chrominance_dc() -> Self {
        Self::standard(&STD_CHROMINANCE_DC_LENGTHS, &STD_CHROMINANCE_DC_VALUES)
    }

    pub fn standard_chrominance_ac() -> Self {
        Self::standard(&STD_CHROMINANCE_AC_LENGTHS, &STD_CHROMINANCE_AC_VALUES)
    }

    fn standard(lengths: &[u8; 16], values: &[u8]) -> Self {
        match Self::build_from_dht(lengths, values) {
            Ok(table) => table,
            Err(_) => unreachable!("Annex K tables are well formed"),
        }
    }

    /// Builds the optimal table for the given symbol frequencies (Annex K.2).
    pub fn optimal(frequencies: &[u32; 256]) -> Result<Self, JpegError> {
        let (lengths, values) = optimal_code_lengths(frequencies);
        Self::build_from_dht(&lengths, &values)
    }

    /// Decodes the next symbol. An invalid code yields symbol 0 and marks the
    /// reader corrupt, which the decoder reports as a warning.
    pub fn decode(&self, reader: &mut JpegBitReader) -> u8 {
        let look = reader.peek_bits(HUFFMAN_LOOKAHEAD_BITS) as usize;
        let (length, symbol) = self.lookup[look];
        if length > 0 {
            reader.consume_bits(length as u32);
            return symbol;
        }

        let code16 = reader.peek_bits(MAXIMUM_CODE_LENGTH as u32) as i32;
        let mut length = HUFFMAN_LOOKAHEAD_BITS as usize + 1;
        let mut code = code16 >> (MAXIMUM_CODE_LENGTH - length);
        while code > self.max_code[length] {
            length += 1;
            if length > MAXIMUM_CODE_LENGTH {
                reader.consume_bits(MAXIMUM_CODE_LENGTH as u32);
                reader.mark_corrupt();
                return 0;
            }
            code = code16 >> (MAXIMUM_CODE_LENGTH - length);
        }
        reader.consume_bits(length as u32);
        let index = self.val_ptr[length] + code - self.min_code[length];
        self.values.get(index as usize).copied().unwrap_or(0)
    }

    /// Writes the code for `symbol`. Symbols absent from the table are an error.
    pub fn encode(&self, writer: &mut JpegBitWriter, symbol: u8) -> Result<(), JpegError> {
        let code = self.codes[symbol as usize];
        if code.length == 0 {
            return Err(JpegError::InvalidHuffmanTable);
        }
        writer.write_bits(code.value as u32, code.length as u32)
    }
}

/// Generates code lengths and symbol order from symbol statistics following
/// ISO/IEC 10918-1 Annex K.2, limited to 16-bit codes.
pub fn optimal_code_lengths(frequencies: &[u32; 256]) -> ([u8; 16], Vec<u8>) {
    const MAX_CODE_LENGTH_COUNTED: usize = 32;

    let mut freq = [0i64; 257];
    for (slot, &count) in freq.iter_mut().zip(frequencies.iter()) {
        *slot = count as i64;
    }
    // Reserved symbol guarantees no real symbol gets the all-ones code.
    freq[256] = 1;

    let mut code_size = [0usize; 257];
    let mut others = [-1i32; 257];

    loop {
        // c1: smallest nonzero frequency, ties broken toward the largest index.
        let mut c1 = -1i32;
        let mut v = i64::MAX;
        for (i, &f) in freq.iter().enumerate() {
            if f != 0 && f <= v {
                v = f;
                c1 = i as i32;
            }
        }
        // c2: next smallest nonzero frequency.
        let mut c2 = -1i32;
        v = i64::MAX;
        for (i, &f) in freq.iter().enumerate() {
            if f != 0 && f <= v && i as i32 != c1 {
                v = f;
                c2 = i as i32;
            }
        }
        if c2 < 0 {
            break;
        }

        let (mut c1, mut c2) = (c1 as usize, c2 as usize);
        freq[c1] += freq[c2];
        freq[c2] = 0;

        code_size[c1] += 1;
        while others[c1] >= 0 {
            c1 = others[c1] as usize;
            code_size[c1] += 1;
        }
        others[c1] = c2 as i32;

        code_size[c2] += 1;
        while others[c2] >= 0 {
            c2 = others[c2] as usize;
            code_size[c2] += 1;
        }
    }

    let mut bits = [0u32; MAX_CODE_LENGTH_COUNTED + 1];
    for &size in code_size.iter().filter(|&&size| size > 0) {
        bits[size.min(MAX_CODE_LENGTH_COUNTED)] += 1;
    }

    // Shorten codes longer than 16 bits (Figure K.3).
    for i in (MAXIMUM_CODE_LENGTH + 1..=MAX_CODE_LENGTH_COUNTED).rev() {
        while bits[i] > 0 {
            let mut j = i - 2;
            while bits[j] == 0 {
                j -= 1;
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        }
    }

    // Drop the reserved code point from the longest length in use.
    let mut i = MAXIMUM_CODE_LENGTH;
    while i > 0 && bits[i] == 0 {
        i -= 1;
    }
    if i > 0 {
        bits[i] -= 1;
    }

    let mut lengths = [0u8; 16];
    for (length, slot) in lengths.iter_mut().enumerate() {
        *slot = bits[length + 1] as u8;
    }

    let mut values = Vec::new();
    for size in 1..=MAX_CODE_LENGTH_COUNTED {
        for (symbol, &s) in code_size.iter().enumerate().take(256) {
            if s == size {
                values.push(symbol as u8);
            }
        }
    }
    (lengths, values)
}

/// Computes the magnitude category of a coefficient (ISO/IEC 10918-1 F.1.2.1).
pub fn magnitude_category(value: i32) -> u8 {
    (32 - value.unsigned_abs().leading_zeros()) as u8
}

/// Encodes the additional bits for `value` in its category (F.1.2.1.1).
pub fn encode_magnitude(value: i32, category: u8) -> u32 {
    if category == 0 {
        return 0;
    }
    let adjusted = if value < 0 { value - 1 } else { value };
    (adjusted as u32) & ((1u32 << category) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg1::bit_io::extend;

    fn encode_symbols(table: &HuffmanTable, symbols: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; 64];
        let len = {
            let mut writer = JpegBitWriter::new(&mut buffer);
            for &symbol in symbols {
                table.encode(&mut writer, symbol).unwrap();
            }
            writer.flush().unwrap();
            writer.len()
        };
        buffer.truncate(len);
        buffer
    }

    #[test]
    fn standard_luminance_dc_codes() {
        let table = HuffmanTable::standard_luminance_dc();
        assert_eq!(table.codes[0], HuffmanCode { value: 0b00, length: 2 });
        assert_eq!(table.codes[5], HuffmanCode { value: 0b110, length: 3 });
        assert_eq!(table.codes[11], HuffmanCode { value: 0b1_1111_1110, length: 9 });
    }

    #[test]
    fn decodes_long_codes_through_slow_path() {
        let table = HuffmanTable::standard_luminance_ac();
        // 0xfa has the longest (16-bit) code of the table.
        let symbols = [0x01, 0xfa, 0x00, 0xf0, 0x99];
        let data = encode_symbols(&table, &symbols);
        let mut reader = JpegBitReader::new(&data);
        for &expected in &symbols {
            assert_eq!(table.decode(&mut reader), expected);
        }
        assert!(!reader.corrupt());
    }

    #[test]
    fn invalid_code_yields_zero_and_marks_corrupt() {
        // Only the one-bit code 0 is defined.
        let mut lengths = [0u8; 16];
        lengths[0] = 1;
        let table = HuffmanTable::build_from_dht(&lengths, &[7]).unwrap();
        let data = [0xFF, 0x00, 0xFF, 0x00];
        let mut reader = JpegBitReader::new(&data);
        assert_eq!(table.decode(&mut reader), 0);
        assert!(reader.corrupt());
    }

    #[test]
    fn rejects_overfull_tables() {
        let mut lengths = [0u8; 16];
        lengths[0] = 2;
        assert_eq!(
            HuffmanTable::build_from_dht(&lengths, &[1, 2]).unwrap_err(),
            JpegError::InvalidHuffmanTable
        );
        lengths[0] = 1;
        assert!(HuffmanTable::build_from_dht(&lengths, &[1, 2]).is_err());
    }

    #[test]
    fn optimal_table_prefers_frequent_symbols() {
        let mut frequencies = [0u32; 256];
        frequencies[0x00] = 1000;
        frequencies[0x01] = 500;
        frequencies[0x11] = 10;
        frequencies[0x22] = 1;
        let table = HuffmanTable::optimal(&frequencies).unwrap();
        let len = |s: usize| table.codes[s].length;
        assert!(len(0x00) <= len(0x01));
        assert!(len(0x01) <= len(0x11));
        assert!(len(0x11) <= len(0x22));
        assert_eq!(table.values.len(), 4);
        for symbol in [0x00, 0x01, 0x11, 0x22] {
            assert_ne!(len(symbol), 0);
        }
    }

    #[test]
    fn optimal_lengths_never_exceed_sixteen_bits() {
        // Fibonacci frequencies produce a maximally skewed tree.
        let mut frequencies = [0u32; 256];
        let (mut a, mut b) = (1u32, 1u32);
        for slot in frequencies.iter_mut().take(30) {
            *slot = a;
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        let (lengths, values) = optimal_code_lengths(&frequencies);
        assert_eq!(values.len(), 30);
        assert_eq!(lengths.iter().map(|&c| c as usize).sum::<usize>(), 30);
        assert!(HuffmanTable::build_from_dht(&lengths, &values).is_ok());
    }

    #[test]
    fn single_symbol_gets_a_code() {
        let mut frequencies = [0u32; 256];
        frequencies[3] = 42;
        let table = HuffmanTable::optimal(&frequencies).unwrap();
        assert_eq!(table.codes[3].length, 1);
        assert_eq!(table.codes[3].value, 0);
    }

    #[test]
    fn magnitude_helpers_invert_extend() {
        for value in [-1023, -255, -2, -1, 1, 2, 7, 8, 1023] {
            let category = magnitude_category(value);
            let bits = encode_magnitude(value, category);
            assert_eq!(extend(bits, category), value);
        }
        assert_eq!(magnitude_category(0), 0);
        assert_eq!(magnitude_category(-8), 4);
    }
}
