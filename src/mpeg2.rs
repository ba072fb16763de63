use log::debug;

use crate::caption::{AccessUnit, CaptionBlock, PictureType, ReorderBuffer};
use crate::ga94::{self, GA94_IDENTIFIER};
use crate::parser::BitstreamParser;
use crate::start_code::StartCodeScanner;

const PICTURE_START_CODE: u8 = 0x00;
const USER_DATA_START_CODE: u8 = 0xb2;

// SCTE-20 style user data: `'C' 'C' 0x01`.
const SCTE20_IDENTIFIER: [u8; 3] = [b'C', b'C', 0x01];
const SCTE20_HEADER_LEN: usize = 5;
const SCTE20_FIELD_MARKER: u8 = 0xff;
// cc_valid with cc_type 0 (field 1).
const SCTE20_TRIPLET_MARKER: u8 = 0x04;

// Caption extractor for MPEG-2 video elementary streams.
#[derive(Debug, Default)]
pub struct Mpeg2Parser {
    reorder: ReorderBuffer,
}

impl Mpeg2Parser {
    pub const NAME: &'static str = "mpeg2";

    pub fn new() -> Self {
        Self::default()
    }
}

// Reads picture_coding_type from the bytes following a picture start code.
fn picture_coding_type(header: &[u8]) -> Option<PictureType> {
    if header.len() < 5 {
        return None;
    }
    Some(match (header[1] & 0x38) >> 3 {
        1 => PictureType::IFrame,
        2 => PictureType::PFrame,
        _ => PictureType::Other,
    })
}

// `CC` user data with its flags byte present.
fn is_scte20(user_data: &[u8]) -> bool {
    user_data.len() >= SCTE20_HEADER_LEN && user_data.starts_with(&SCTE20_IDENTIFIER)
}

// Repacks SCTE-20 caption pairs into cc_data triplets.
// Every slot holds a field marker and two caption bytes. Only slots for the
// field selected by `oddidx` and flagged with the marker are kept.
fn extract_scte20(user_data: &[u8], pts: f64) -> Option<CaptionBlock> {
    let flags = *user_data.get(4)?;
    let oddidx = if flags & 0x80 != 0 { 0 } else { 1 };
    let extrafield = (flags & 0x01) as usize;
    let cc_count = ((flags & 0x3e) >> 1) as usize + extrafield;
    if cc_count == 0 {
        return None;
    }

    // The extra field only has its first slot.
    let slots = cc_count * 2 - extrafield;
    let payload = user_data.get(SCTE20_HEADER_LEN..SCTE20_HEADER_LEN + slots * 3)?;

    let mut data = Vec::with_capacity(cc_count * 3);
    for (slot, pair) in payload.chunks_exact(3).enumerate() {
        if slot % 2 == oddidx && pair[0] == SCTE20_FIELD_MARKER {
            data.extend_from_slice(&[SCTE20_TRIPLET_MARKER, pair[1], pair[2]]);
        }
    }

    if data.is_empty() {
        return None;
    }
    data.shrink_to_fit();
    Some(CaptionBlock::new(pts, data))
}

impl BitstreamParser for Mpeg2Parser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&mut self, unit: &AccessUnit<'_>, out: &mut Vec<CaptionBlock>) -> PictureType {
        let data = unit.data;
        let mut picture = PictureType::Other;
        let mut current = PictureType::Other;

        for start in StartCodeScanner::new(data) {
            let body = &data[start.offset + 1..];
            match start.code {
                PICTURE_START_CODE => {
                    if let Some(coding_type) = picture_coding_type(body) {
                        current = coding_type;
                        picture = picture.dominate(coding_type);
                    }
                }
                USER_DATA_START_CODE if body.starts_with(&GA94_IDENTIFIER) => {
                    if let Some(block) = ga94::extract(body, unit.pts) {
                        self.reorder.commit(current, vec![block], out);
                    }
                }
                USER_DATA_START_CODE if is_scte20(body) => {
                    // SCTE-20 data is already in display order.
                    picture = picture.dominate(PictureType::IFrame);
                    if let Some(block) = extract_scte20(body, unit.pts) {
                        debug!("SCTE-20 captions, {} bytes", block.data.len());
                        out.push(block);
                    }
                }
                _ => {}
            }
        }

        picture
    }

    fn reorder_buffer(&self) -> &ReorderBuffer {
        &self.reorder
    }

    fn reorder_buffer_mut(&mut self) -> &mut ReorderBuffer {
        &mut self.reorder
    }
}
