use std::borrow::Cow;

use log::debug;

use crate::bit_reader::BitReader;
use crate::caption::{CaptionBlock, PictureType};
use crate::ga94;

pub const NAL_TYPE_MASK: u8 = 0x1f;
pub const NAL_SLICE: u8 = 1;
pub const NAL_SLICE_IDR: u8 = 5;
pub const NAL_SEI: u8 = 6;

// sei payloadType for user_data_registered_itu_t_t35.
const SEI_USER_DATA_REGISTERED: usize = 4;

pub fn nal_type(header: u8) -> u8 {
    header & NAL_TYPE_MASK
}

pub fn is_slice(nal_type: u8) -> bool {
    (NAL_SLICE..=NAL_SLICE_IDR).contains(&nal_type)
}

// Classifies a slice from the start of its NAL unit (header byte included).
pub fn detect_slice_type(nal: &[u8]) -> PictureType {
    if nal.len() < 2 {
        return PictureType::Invalid;
    }

    let mut reader = BitReader::with_bit_len(&nal[1..], (nal.len() - 1) * 8);

    let _first_mb_in_slice = reader.read_golomb_ue();
    if reader.has_error() {
        return PictureType::Invalid;
    }

    let slice_type = reader.read_golomb_ue();
    if reader.has_error() {
        return PictureType::Invalid;
    }

    match slice_type {
        2 | 7 => PictureType::IFrame,
        0 | 5 => PictureType::PFrame,
        1 | 3 | 4 | 6 | 8 | 9 => PictureType::Other,
        _ => {
            debug!("slice_type {} out of range", slice_type);
            PictureType::Invalid
        }
    }
}

// Strips emulation prevention bytes (the `03` of `00 00 03`), borrowing the
// input when there are none.
pub fn remove_emulation_prevention(data: &[u8]) -> Cow<'_, [u8]> {
    let has_epb = data.windows(3).any(|w| w == [0x00, 0x00, 0x03]);
    if !has_epb {
        return Cow::Borrowed(data);
    }

    let mut result = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0x00 { zeros + 1 } else { 0 };
        result.push(byte);
    }

    Cow::Owned(result)
}

// Reads one ff-extended SEI value, advancing `pos`. Returns `None` when the
// data runs out first.
fn read_sei_value(data: &[u8], pos: &mut usize) -> Option<usize> {
    let mut value = 0usize;
    loop {
        let byte = *data.get(*pos)?;
        *pos += 1;
        value += byte as usize;
        if byte != 0xff {
            return Some(value);
        }
    }
}

// Walks the sei_message() list of an SEI NAL unit (header byte included) and
// collects the caption blocks of every registered user data payload.
pub fn process_sei(nal: &[u8], pts: f64, out: &mut Vec<CaptionBlock>) {
    if nal.len() < 2 {
        return;
    }

    let rbsp = remove_emulation_prevention(&nal[1..]);
    let data = rbsp.as_ref();
    let mut pos = 0;

    while pos < data.len() {
        let Some(payload_type) = read_sei_value(data, &mut pos) else {
            break;
        };
        let Some(payload_size) = read_sei_value(data, &mut pos) else {
            break;
        };

        let Some(payload) = data.get(pos..pos + payload_size) else {
            debug!(
                "SEI payload type {} of {} bytes runs past the NAL unit",
                payload_type, payload_size
            );
            break;
        };

        if payload_type == SEI_USER_DATA_REGISTERED {
            ga94::extract_into(payload, pts, out);
        }

        pos += payload_size;

        // rbsp_trailing_bits
        if data.get(pos) == Some(&0x80) && pos + 1 == data.len() {
            break;
        }
    }
}
