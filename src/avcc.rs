use bytes::Buf;
use log::debug;

use crate::caption::{AccessUnit, CaptionBlock, PictureType, ReorderBuffer};
use crate::h264;
use crate::parser::BitstreamParser;

const NAL_LENGTH_SIZE: usize = 4;

// Caption extractor for H.264 with 4-byte length-prefixed NAL units
// (MP4/Matroska).
#[derive(Debug, Default)]
pub struct AvccParser {
    reorder: ReorderBuffer,
}

impl AvccParser {
    pub const NAME: &'static str = "h264-avcc";

    pub fn new() -> Self {
        Self::default()
    }
}

impl BitstreamParser for AvccParser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(&mut self, unit: &AccessUnit<'_>, out: &mut Vec<CaptionBlock>) -> PictureType {
        let mut data = unit.data;
        let mut picture = PictureType::Other;
        let mut blocks = Vec::new();

        while data.remaining() >= NAL_LENGTH_SIZE {
            let nal_size = data.get_u32() as usize;
            if nal_size == 0 || nal_size > i32::MAX as usize || nal_size > data.remaining() {
                debug!(
                    "bad NAL length {} with {} bytes left",
                    nal_size,
                    data.remaining()
                );
                self.reorder.commit(PictureType::Invalid, blocks, out);
                return PictureType::Invalid;
            }

            let nal = &data[..nal_size];
            let nal_type = h264::nal_type(nal[0]);

            if h264::is_slice(nal_type) {
                match h264::detect_slice_type(nal) {
                    PictureType::Invalid => {
                        debug!("corrupt slice header in {} byte NAL unit", nal_size);
                        self.reorder.commit(PictureType::Invalid, blocks, out);
                        return PictureType::Invalid;
                    }
                    slice => picture = picture.dominate(slice),
                }
            } else if nal_type == h264::NAL_SEI {
                h264::process_sei(nal, unit.pts, &mut blocks);
            }

            data.advance(nal_size);
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
