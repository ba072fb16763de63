//! Closed caption (CEA-608/708) extraction from H.264 and MPEG-2 video
//! bitstreams, with B-frame reordering so captions come out in presentation
//! order.

pub mod annexb;
pub mod avcc;
pub mod bit_reader;
pub mod caption;
pub mod error;
pub mod ga94;
pub mod h264;
pub mod hls;
pub mod mpeg2;
pub mod mpeg_ts;
pub mod parser;
pub mod start_code;

pub use caption::{AccessUnit, CaptionBlock, PictureType};
pub use error::Error;
pub use parser::{create_parser, BitstreamParser, Codec};
