use bytes::{Bytes, BytesMut};
use log::debug;

use crate::caption::AccessUnit;
use crate::error::Error;
use crate::parser::{self, Codec};

pub const TS_PACKET_SIZE: usize = 188;
const TS_SYNC_BYTE: u8 = 0x47;
const PAT_PID: u16 = 0x0000;
const PTS_CLOCK: f64 = 90000.0;
// CRC_32 closing every PSI section.
const PSI_CRC_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct PesPacket {
    pub data: Bytes,
    pub pts: f64,
}

impl PesPacket {
    pub fn access_unit(&self) -> AccessUnit<'_> {
        AccessUnit::new(&self.data, self.pts)
    }
}

// Follows the first video elementary stream of the first program.
#[derive(Debug, Default)]
pub struct TsDemuxer {
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
    stream_type: Option<u8>,
    pts: Option<i64>,
    pes: BytesMut,
    in_pes: bool,
}

impl TsDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_type(&self) -> Option<u8> {
        self.stream_type
    }

        pub fn codec(&self) -> Result<Codec, Error> {
        let stream_type = self.stream_type.ok_or(Error::NoVideoStream)?;
        Codec::from_stream_type(stream_type)
    }

    // Feeds one 188-byte packet, returning the PES packet it completed, if any.
    pub fn push_packet(&mut self, packet: &[u8]) -> Option<PesPacket> {
        if packet.len() != TS_PACKET_SIZE || packet[0] != TS_SYNC_BYTE {
            debug!("skipping packet without sync byte");
            return None;
        }

        let pusi = (packet[1] & 0x40) != 0; // Payload Unit Start Indicator
        let pid = ((packet[1] as u16 & 0x1F) << 8) | packet[2] as u16;
        let adaptation_present = (packet[3] & 0x20) != 0;
        let payload_present = (packet[3] & 0x10) != 0;
        let mut i = 4;

        if adaptation_present {
            let adaptation_length = packet[i] as usize;
            i += 1 + adaptation_length;
        }

        if !payload_present || i >= packet.len() {
            return None;
        }
        let payload = &packet[i..];

        if pid == PAT_PID {
            self.parse_pat(payload, pusi);
        } else if Some(pid) == self.pmt_pid {
            self.parse_pmt(payload, pusi);
        } else if Some(pid) == self.video_pid {
            return self.push_pes(payload, pusi);
        }

        None
    }

    // Returns the PES packet still being assembled.
    pub fn finish(&mut self) -> Option<PesPacket> {
        self.in_pes = false;
        self.take_pes()
    }

    // Skips the pointer field in front of a section start.
    fn section<'a>(payload: &'a [u8], pusi: bool) -> Option<&'a [u8]> {
        if !pusi {
            return None;
        }
        let pointer = *payload.first()? as usize;
        payload.get(1 + pointer..)
    }

    fn section_length(section: &[u8]) -> Option<usize> {
        let hi = *section.get(1)? as usize & 0x0f;
        Some((hi << 8) | *section.get(2)? as usize)
    }

    fn parse_pat(&mut self, payload: &[u8], pusi: bool) {
        let Some(section) = Self::section(payload, pusi) else {
            return;
        };
        let Some(section_length) = Self::section_length(section) else {
            return;
        };

        // Programs run from offset 8 to the CRC.
        let end = (3 + section_length).saturating_sub(PSI_CRC_LEN).min(section.len());
        let Some(programs) = section.get(8..end) else {
            return;
        };

        for program in programs.chunks_exact(4) {
            let program_number = u16::from_be_bytes([program[0], program[1]]);
            if program_number == 0 {
                // network_PID
                continue;
            }
            let pid = ((program[2] as u16 & 0x1F) << 8) | program[3] as u16;
            if self.pmt_pid != Some(pid) {
                debug!("Found PMT PID: {}", pid);
            }
            self.pmt_pid = Some(pid);
            return;
        }
    }

    fn parse_pmt(&mut self, payload: &[u8], pusi: bool) {
        let Some(section) = Self::section(payload, pusi) else {
            return;
        };
        let Some(section_length) = Self::section_length(section) else {
            return;
        };
        if section.len() < 12 {
            return;
        }

        let current = (section[5] & 0x01) != 0;
        if !current {
            return;
        }

        let program_info_length = ((section[10] as usize & 0x0F) << 8) | section[11] as usize;
        let end = (3 + section_length).saturating_sub(PSI_CRC_LEN).min(section.len());
        let mut i = 12 + program_info_length;

        while i + 5 <= end {
            let stream_type = section[i];
            let elementary_pid = ((section[i + 1] as u16 & 0x1F) << 8) | section[i + 2] as u16;
            let es_info_length = ((section[i + 3] as usize & 0x0F) << 8) | section[i + 4] as usize;

            if parser::is_video_stream_type(stream_type) {
                if self.video_pid != Some(elementary_pid) {
                    debug!(
                        "Found video stream PID: {}, type: 0x{:02x}",
                        elementary_pid, stream_type
                    );
                }
                self.video_pid = Some(elementary_pid);
                self.stream_type = Some(stream_type);
                return;
            }

            i += 5 + es_info_length;
        }
    }

    fn push_pes(&mut self, payload: &[u8], pusi: bool) -> Option<PesPacket> {
        if !pusi {
            if self.in_pes {
                self.pes.extend_from_slice(payload);
            }
            return None;
        }

        let done = self.take_pes();

        if payload.len() < 9 || payload[..3] != [0x00, 0x00, 0x01] {
            debug!("PES packet without start code prefix");
            self.in_pes = false;
            return done;
        }

        let has_pts = (payload[7] & 0x80) != 0;
        let header_length = payload[8] as usize;
        if has_pts && payload.len() >= 14 {
            self.pts = Some(parse_timestamp(&payload[9..14]));
        }

        if let Some(data) = payload.get(9 + header_length..) {
            self.pes.extend_from_slice(data);
        }
        self.in_pes = true;

        done
    }

    fn take_pes(&mut self) -> Option<PesPacket> {
        if self.pes.is_empty() {
            return None;
        }
        Some(PesPacket {
            data: self.pes.split().freeze(),
            pts: self.pts.unwrap_or(0) as f64 / PTS_CLOCK,
        })
    }
}

// Decodes a 33-bit PTS/DTS field.
fn parse_timestamp(data: &[u8]) -> i64 {
    if data.len() < 5 {
        return 0;
    }

    let mut pts = 0i64;
    pts |= (data[0] as i64 & 0x0E) << 29;
    pts |= (data[1] as i64 & 0xFF) << 22;
    pts |= (data[2] as i64 & 0xFE) << 14;
    pts |= (data[3] as i64 & 0xFF) << 7;
    pts |= (data[4] as i64 & 0xFE) >> 1;
    pts
}

// The video access units of one transport stream segment.
#[derive(Debug)]
pub struct DemuxedSegment {
    pub codec: Codec,
    pub units: Vec<PesPacket>,
}

// Demuxes a whole segment held in memory.
pub fn demux_segment(data: &[u8]) -> Result<DemuxedSegment, Error> {
    let start = data
        .iter()
        .position(|&b| b == TS_SYNC_BYTE)
        .unwrap_or(data.len());

    let mut demuxer = TsDemuxer::new();
    let mut units = Vec::new();
    for packet in data[start..].chunks_exact(TS_PACKET_SIZE) {
        units.extend(demuxer.push_packet(packet));
    }
    units.extend(demuxer.finish());

    let codec = demuxer.codec()?;
    debug!("Extracted {} video access units", units.len());
    Ok(DemuxedSegment { codec, units })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PMT_PID: u16 = 0x1000;
    const VIDEO_PID: u16 = 0x0100;

    fn ts_packet(pid: u16, pusi: bool, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= 184);
        let mut packet = vec![
            TS_SYNC_BYTE,
            (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1f),
            pid as u8,
            0x10,
        ];
        if payload.len() < 184 {
            packet[3] |= 0x20;
            let adaptation_length = 183 - payload.len();
            packet.push(adaptation_length as u8);
            if adaptation_length > 0 {
                packet.push(0x00);
                packet.extend(std::iter::repeat(0xff).take(adaptation_length - 1));
            }
        }
        packet.extend_from_slice(payload);
        assert_eq!(packet.len(), TS_PACKET_SIZE);
        packet
    }

    fn pat() -> Vec<u8> {
        let section = [
            0x00, 0x00, 0xb0, 0x11, 0x00, 0x01, 0xc1, 0x00, 0x00, // header
            0x00, 0x00, 0xe0, 0x10, // network PID
            0x00, 0x01, 0xe0 | (PMT_PID >> 8) as u8, PMT_PID as u8, // program 1
            0xde, 0xad, 0xbe, 0xef, // CRC
        ];
        ts_packet(PAT_PID, true, &section)
    }

    fn pmt(stream_type: u8) -> Vec<u8> {
        let section = [
            0x00, 0x02, 0xb0, 0x17, 0x00, 0x01, 0xc1, 0x00, 0x00, // header
            0xe1, 0x00, 0xf0, 0x00, // PCR PID, program_info_length
            0x0f, 0xe1, 0x01, 0xf0, 0x00, // AAC audio
            stream_type, 0xe0 | (VIDEO_PID >> 8) as u8, VIDEO_PID as u8, 0xf0, 0x00,
            0xde, 0xad, 0xbe, 0xef, // CRC
        ];
        ts_packet(PMT_PID, true, &section)
    }

    fn encode_pts(pts: i64) -> [u8; 5] {
        [
            0x21 | ((pts >> 29) & 0x0e) as u8,
            (pts >> 22) as u8,
            0x01 | ((pts >> 14) & 0xfe) as u8,
            (pts >> 7) as u8,
            0x01 | ((pts << 1) & 0xfe) as u8,
        ]
    }

    fn pes_start(pts: i64, data: &[u8]) -> Vec<u8> {
        let mut pes = vec![0x00, 0x00, 0x01, 0xe0, 0x00, 0x00, 0x80, 0x80, 0x05];
        pes.extend_from_slice(&encode_pts(pts));
        pes.extend_from_slice(data);
        pes
    }

    #[test]
    fn timestamp_round_trip() {
        for pts in [0i64, 1, 90000, 0x1_ffff_ffff] {
            assert_eq!(parse_timestamp(&encode_pts(pts)), pts);
        }
        assert_eq!(parse_timestamp(&[0x21]), 0);
    }

    #[test]
    fn reassembles_pes_packets() {
        let mut stream = Vec::new();
        stream.extend(pat());
        stream.extend(pmt(0x1b));
        stream.extend(ts_packet(VIDEO_PID, true, &pes_start(90000, &[1, 2, 3])));
        stream.extend(ts_packet(VIDEO_PID, false, &[4, 5]));
        stream.extend(ts_packet(0x101, false, &[0xaa; 10]));
        stream.extend(ts_packet(VIDEO_PID, true, &pes_start(135000, &[6])));

        let segment = demux_segment(&stream).unwrap();
        assert_eq!(segment.codec, Codec::H264);
        assert_eq!(segment.units.len(), 2);
        assert_eq!(&segment.units[0].data[..], &[1, 2, 3, 4, 5]);
        assert_eq!(segment.units[0].pts, 1.0);
        assert_eq!(&segment.units[1].data[..], &[6]);
        assert_eq!(segment.units[1].pts, 1.5);
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut stream = vec![0x00, 0x12];
        stream.extend(pat());
        stream.extend(pmt(0x02));
        stream.extend(ts_packet(VIDEO_PID, true, &pes_start(0, &[9, 9])));

        let segment = demux_segment(&stream).unwrap();
        assert_eq!(segment.codec, Codec::Mpeg2);
        assert_eq!(segment.units.len(), 1);
    }

    #[test]
    fn continuation_before_start_is_dropped() {
        let mut demuxer = TsDemuxer::new();
        assert!(demuxer.push_packet(&pat()).is_none());
        assert!(demuxer.push_packet(&pmt(0x1b)).is_none());
        assert!(demuxer
            .push_packet(&ts_packet(VIDEO_PID, false, &[1, 2, 3]))
            .is_none());
        assert!(demuxer.finish().is_none());
    }

    #[test]
    fn unsupported_stream_type() {
        let mut stream = Vec::new();
        stream.extend(pat());
        stream.extend(pmt(0x24));
        assert!(matches!(
            demux_segment(&stream),
            Err(Error::UnsupportedStreamType(0x24))
        ));
    }

    #[test]
    fn no_video_stream() {
        assert!(matches!(
            demux_segment(&pat()),
            Err(Error::NoVideoStream)
        ));
        assert!(matches!(demux_segment(&[]), Err(Error::NoVideoStream)));
    }

    #[test]
    fn captions_from_h264_segment() {
        use crate::h264::tests::{sei_nal, slice_nal};
        use crate::parser::create_parser;

        let mut access_unit = Vec::new();
        for nal in [sei_nal(2), slice_nal(0x01, 1)] {
            access_unit.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
            access_unit.extend(nal);
        }

        let mut stream = Vec::new();
        stream.extend(pat());
        stream.extend(pmt(0x1b));
        stream.extend(ts_packet(VIDEO_PID, true, &pes_start(180000, &access_unit)));

        let segment = demux_segment(&stream).unwrap();
        let mut parser = create_parser(segment.codec, None);
        let mut captions = Vec::new();
        for unit in &segment.units {
            parser.parse(&unit.access_unit(), &mut captions);
        }
        parser.flush(&mut captions);

        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].pts, 2.0);
        assert_eq!(captions[0].data.len(), 6);
    }

    #[test]
    fn malformed_packets() {
        let mut demuxer = TsDemuxer::new();
        assert!(demuxer.push_packet(&[0x47; 10]).is_none());

        // Adaptation field claims to be longer than the packet.
        let mut packet = vec![0x47, 0x41, 0x00, 0x30, 0xff];
        packet.resize(TS_PACKET_SIZE, 0);
        assert!(demuxer.push_packet(&packet).is_none());
    }
}
