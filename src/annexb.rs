use log::debug;

use crate::caption::{AccessUnit, CaptionBlock, PictureType, ReorderBuffer};
use crate::ga94::{self, GA94_IDENTIFIER};
use crate::h264;
use crate::parser::BitstreamParser;
use crate::start_code::{next_boundary, StartCodeScanner};

const T35_PREFIX_LEN: usize = 3;

// Caption extractor for H.264 in Annex-B byte stream framing (MPEG-TS).
#[derive(Debug, Default)]
pub struct AnnexBParser {
    reorder: ReorderBuffer,
}

impl AnnexBParser {
    pub const NAME: &'static str = "h264-annexb";

    pub fn new() -> Self {
        Self::default()
    }
}

// Looks for GA94 cc_data anywhere in an SEI NAL unit without decoding the
// sei_message() framing. Broadcast encoders do not always size their SEI
// payloads correctly.
fn scan_sei(sei: &[u8], pts: f64, out: &mut Vec<CaptionBlock>) {
    let mut from = 0;
    while let Some(found) = sei
        .get(from..)
        .and_then(|rest| rest.windows(5).position(|w| w[..4] == GA94_IDENTIFIER && w[4] == 0x03))
    {
        let at = from + found;
        // Include the T.35 country and provider codes when there is room.
        let start = if at >= T35_PREFIX_LEN {
            at - T35_PREFIX_LEN
        } else {
            at
        };
        ga94::extract_into(&sei[start..], pts, out);
        from = at + GA94_IDENTIFIER.len();
    }
}

impl BitstreamParser for AnnexBParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&mut self, unit: &AccessUnit<'_>, out: &mut Vec<CaptionBlock>) -> PictureType {
        let data = unit.data;
        let mut picture = PictureType::Other;
        let mut blocks = Vec::new();
        let mut scanner = StartCodeScanner::new(data);

        while let Some(start) = scanner.next() {
            let nal_type = h264::nal_type(start.code);

            if h264::is_slice(nal_type) {
                match h264::detect_slice_type(&data[start.offset..]) {
                    PictureType::Invalid => {
                        debug!("corrupt slice header at offset {}", start.offset);
                        self.reorder.commit(PictureType::Invalid, blocks, out);
                        return PictureType::Invalid;
                    }
                    slice => picture = picture.dominate(slice),
                }
            } else if nal_type == h264::NAL_SEI {
                let end = next_boundary(data, start.offset + 1);
                scan_sei(&data[start.offset + 1..end], unit.pts, &mut blocks);
                scanner.seek(end);
            }
        }

        self.reorder.commit(picture, blocks, out);
        picture
    }

    fn reorder_buffer(&self) -> &ReorderBuffer {
        &self.reorder
    }

    fn reorder_buffer_mut(&mut self) -> &mut ReorderBuffer {
        &mut self.reorder
    }
}
