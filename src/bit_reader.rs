/// Maximum number of leading zero bits accepted in an Exp-Golomb prefix before
/// the code is rejected.
pub const DEFAULT_GOLOMB_BUDGET: u32 = 32;

/// A MSB-first bit reader over a borrowed byte slice.
///
/// Reads never go past the declared bit length. A read that would do so sets a
/// sticky error flag and yields 0, so callers must check [`BitReader::has_error`]
/// after every field they care about.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_len: usize,
    pos: usize,
    error: bool,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_bit_len(data, data.len() * 8)
    }

    /// Creates a reader limited to `bit_len` bits. The length is clamped to the
    /// size of `data`.
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> Self {
        Self {
            data,
            bit_len: bit_len.min(data.len() * 8),
            pos: 0,
            error: false,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn bits_left(&self) -> usize {
        self.bit_len - self.pos
    }

    /// Reads `num_bits` (at most 32) bits.
    pub fn read_bits(&mut self, num_bits: u32) -> u32 {
        if num_bits > 32 || num_bits as usize > self.bits_left() {
            self.error = true;
            return 0;
        }

        let mut out: u64 = 0;
        for _ in 0..num_bits {
            let byte = self.data[self.pos / 8];
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            out = (out << 1) | bit as u64;
            self.pos += 1;
        }

        out as u32
    }

    /// Reads an unsigned Exp-Golomb code with the default prefix budget.
    pub fn read_golomb_ue(&mut self) -> u32 {
        self.read_golomb_ue_max(DEFAULT_GOLOMB_BUDGET)
    }

    /// Reads an unsigned Exp-Golomb code, giving up once more than `max_bits`
    /// leading zero bits have been seen.
    pub fn read_golomb_ue_max(&mut self, max_bits: u32) -> u32 {
        let mut leading_zero_bits = 0u32;
        loop {
            let bit = self.read_bits(1);
            if self.error {
                return 0;
            }
            if bit == 1 {
                break;
            }
            leading_zero_bits += 1;
            if leading_zero_bits > max_bits {
                self.error = true;
                return 0;
            }
        }

        // A shift by 32 or more is undefined for u32.
        if leading_zero_bits > 31 {
            self.error = true;
            return 0;
        }

        let suffix = self.read_bits(leading_zero_bits);
        if self.error {
            return 0;
        }

        ((1u32 << leading_zero_bits) - 1) + suffix
    }
}
