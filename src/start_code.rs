#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartCode {
    // The byte following `00 00 01`: a NAL header for H.264, the start code
    // value for MPEG-2.
    pub code: u8,
    // Index of `code` in the scanned buffer.
    pub offset: usize,
}

// Finds `00 00 01 xx` start codes with a 32-bit shift register, one byte at a
// time. Both the three and four byte forms are matched since a leading zero
// byte does not change the low 24 bits.
pub struct StartCodeScanner<'a> {
    data: &'a [u8],
    pos: usize,
    state: u32,
}

impl<'a> StartCodeScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            state: 0xffff_ffff,
        }
    }

    // Resumes scanning at `pos`, forgetting any partially matched prefix.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
        self.state = 0xffff_ffff;
    }
}

impl Iterator for StartCodeScanner<'_> {
    type Item = StartCode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&byte) = self.data.get(self.pos) {
            self.state = (self.state << 8) | byte as u32;
            self.pos += 1;
            if self.state & 0xffff_ff00 == 0x0000_0100 {
                return Some(StartCode {
                    code: byte,
                    offset: self.pos - 1,
                });
            }
        }

        None
    }
}

// Position of the next `00 00 01` prefix at or after `from`, or the end of
// `data` when there is none.
pub fn next_boundary(data: &[u8], from: usize) -> usize {
    data.get(from..)
        .and_then(|rest| rest.windows(3).position(|w| w == [0x00, 0x00, 0x01]))
        .map_or(data.len(), |i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_three_and_four_byte_codes() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xaa, 0x00, 0x00, 0x01, 0x68, 0xbb,
        ];
        let codes: Vec<StartCode> = StartCodeScanner::new(&data).collect();
        assert_eq!(
            codes,
            vec![
                StartCode {
                    code: 0x67,
                    offset: 4
                },
                StartCode {
                    code: 0x68,
                    offset: 9
                },
            ]
        );
    }

    #[test]
    fn code_at_buffer_start() {
        let data = [0x00, 0x00, 0x01, 0xb3];
        let codes: Vec<StartCode> = StartCodeScanner::new(&data).collect();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, 0xb3);
        assert_eq!(codes[0].offset, 3);
    }

    #[test]
    fn truncated_prefix_is_not_a_code() {
        let data = [0x12, 0x00, 0x00, 0x01];
        assert_eq!(StartCodeScanner::new(&data).count(), 0);
        assert_eq!(StartCodeScanner::new(&[]).count(), 0);
    }

    #[test]
    fn zero_runs() {
        // 00 00 00 00 01 00 is a single start code with value 0x00.
        let data = [0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01];
        let codes: Vec<StartCode> = StartCodeScanner::new(&data).collect();
        assert_eq!(
            codes,
            vec![StartCode {
                code: 0x00,
                offset: 5
            }]
        );
    }

    #[test]
    fn seek_resets_state() {
        let data = [0x00, 0x00, 0x01, 0x09, 0x00, 0x00, 0x01, 0x41];
        let mut scanner = StartCodeScanner::new(&data);
        scanner.seek(5);
        // Only one zero byte precedes 01 after the seek.
        assert_eq!(scanner.next(), None);

        scanner.seek(4);
        assert_eq!(scanner.next().map(|c| c.code), Some(0x41));
    }

    #[test]
    fn boundary() {
        let data = [0x11, 0x00, 0x00, 0x01, 0x22];
        assert_eq!(next_boundary(&data, 0), 1);
        assert_eq!(next_boundary(&data, 2), data.len());
        assert_eq!(next_boundary(&data, 10), data.len());
    }
}
