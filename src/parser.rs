use log::debug;

use crate::annexb::AnnexBParser;
use crate::avcc::AvccParser;
use crate::caption::{AccessUnit, CaptionBlock, PictureType, ReorderBuffer};
use crate::error::Error;
use crate::mpeg2::Mpeg2Parser;

// MPEG-TS stream_type values.
pub const STREAM_TYPE_MPEG1_VIDEO: u8 = 0x01;
pub const STREAM_TYPE_MPEG2_VIDEO: u8 = 0x02;
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_H265: u8 = 0x24;

/// Smallest avcC record that carries a configuration version and NAL length size.
const AVCC_MIN_EXTRA_DATA: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    H264,
    Mpeg2,
}

impl Codec {
    pub fn from_stream_type(stream_type: u8) -> Result<Self, Error> {
        match stream_type {
            STREAM_TYPE_H264 => Ok(Codec::H264),
            STREAM_TYPE_MPEG1_VIDEO | STREAM_TYPE_MPEG2_VIDEO => Ok(Codec::Mpeg2),
            other => Err(Error::UnsupportedStreamType(other)),
        }
    }
}

/// Whether `stream_type` is a video stream, with or without a caption walker.
pub fn is_video_stream_type(stream_type: u8) -> bool {
    matches!(
        stream_type,
        STREAM_TYPE_MPEG1_VIDEO | STREAM_TYPE_MPEG2_VIDEO | STREAM_TYPE_H264 | STREAM_TYPE_H265
    )
}

/// A per-track caption extractor for one bitstream framing.
pub trait BitstreamParser {
    fn name(&self) -> &'static str;

    /// Scans one access unit, appending captions that are ready for
    /// presentation to `out`, and returns the aggregate picture type.
    fn parse(&mut self, unit: &AccessUnit<'_>, out: &mut Vec<CaptionBlock>) -> PictureType;

    fn reorder_buffer(&self) -> &ReorderBuffer;

    fn reorder_buffer_mut(&mut self) -> &mut ReorderBuffer;

    /// Captions still waiting for a non-reference picture.
    fn pending(&self) -> &[CaptionBlock] {
        self.reorder_buffer().pending()
    }

    /// End of stream: releases every pending caption to `out`.
    fn flush(&mut self, out: &mut Vec<CaptionBlock>) {
        self.reorder_buffer_mut().release(out);
    }
}

/// Whether H.264 extra data is an avcC record rather than Annex-B parameter sets.
pub fn is_avcc(extra_data: Option<&[u8]>) -> bool {
    match extra_data {
        Some(extra) => extra.len() >= AVCC_MIN_EXTRA_DATA && extra[0] == 0x01,
        None => false,
    }
}

/// Picks the walker for `codec`. H.264 framing is sniffed from the codec
/// extra data: an avcC record selects length-prefixed NAL units, anything
/// else start codes.
pub fn create_parser(codec: Codec, extra_data: Option<&[u8]>) -> Box<dyn BitstreamParser + Send> {
    let parser: Box<dyn BitstreamParser + Send> = match codec {
        Codec::Mpeg2 => Box::new(Mpeg2Parser::new()),
        Codec::H264 if is_avcc(extra_data) => Box::new(AvccParser::new()),
        Codec::H264 => Box::new(AnnexBParser::new()),
    };
    debug!("using {} for {:?}", parser.name(), codec);
    parser
}
