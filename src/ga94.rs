use log::debug;

use crate::caption::CaptionBlock;

// ATSC A/53 user identifier.
pub const GA94_IDENTIFIER: [u8; 4] = *b"GA94";
// `user_data_type_code` for cc_data.
const CC_DATA_TYPE_CODE: u8 = 0x03;

const PROCESS_CC_DATA_FLAG: u8 = 0x40;
const CC_COUNT_MASK: u8 = 0x1f;
// Identifier, type code, flags and em_data precede the triplets.
const CC_DATA_HEADER_LEN: usize = 7;
// itu_t_t35_country_code plus itu_t_t35_provider_code.
const T35_PREFIX_LEN: usize = 3;

// Returns the offset of the `GA94` identifier, accepting either a bare
// `GA94 0x03` payload or one prefixed by the ITU-T T.35 country and provider
// codes.
fn find_identifier(buf: &[u8]) -> Option<usize> {
    if buf.len() < 8 {
        return None;
    }

    let is_ga94 = |at: usize| {
        buf[at..at + 4] == GA94_IDENTIFIER && buf[at + 4] == CC_DATA_TYPE_CODE
    };

    if buf.len() >= 11 && is_ga94(T35_PREFIX_LEN) {
        Some(T35_PREFIX_LEN)
    } else if is_ga94(0) {
        Some(0)
    } else {
        None
    }
}

// Extracts the cc_data triplets of a `GA94` user-data payload.
// Anything that is not a well-formed caption payload yields `None`; such
// payloads are common and never an error.
pub fn extract(buf: &[u8], pts: f64) -> Option<CaptionBlock> {
    let offset = find_identifier(buf)?;
    let ga94 = &buf[offset..];

    let flags = *ga94.get(5)?;
    if flags & PROCESS_CC_DATA_FLAG == 0 {
        debug!("GA94 payload without process_cc_data_flag");
        return None;
    }

    let cc_count = (flags & CC_COUNT_MASK) as usize;
    if cc_count == 0 {
        return None;
    }

    let end = CC_DATA_HEADER_LEN + cc_count * 3;
    if ga94.len() < end {
        debug!(
            "GA94 payload too short for {} triplets: {} bytes",
            cc_count,
            ga94.len()
        );
        return None;
    }

    Some(CaptionBlock::new(
        pts,
        ga94[CC_DATA_HEADER_LEN..end].to_vec(),
    ))
}

pub fn extract_into(buf: &[u8], pts: f64, out: &mut Vec<CaptionBlock>) {
    if let Some(block) = extract(buf, pts) {
        out.push(block);
    }
}
