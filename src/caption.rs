use log::debug;

/// Coding type of the picture(s) carried by an access unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// The access unit is corrupt and was not fully processed.
    Invalid,
    /// Non-reference picture (B, SI, SP, or unknown).
    Other,
    IFrame,
    PFrame,
}

impl PictureType {
    fn rank(self) -> u8 {
        match self {
            PictureType::Invalid => 0,
            PictureType::Other => 1,
            PictureType::PFrame => 2,
            PictureType::IFrame => 3,
        }
    }

    /// Combines the type seen so far with a newly classified picture.
    /// `IFrame` dominates `PFrame`, which dominates `Other`.
    pub fn dominate(self, other: PictureType) -> PictureType {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// One compressed access unit handed over by the demuxer.
#[derive(Debug, Clone, Copy)]
pub struct AccessUnit<'a> {
    pub data: &'a [u8],
    pub pts: f64,
}

impl<'a> AccessUnit<'a> {
    pub fn new(data: &'a [u8], pts: f64) -> Self {
        Self { data, pts }
    }
}

/// Raw caption triplets extracted from a single payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionBlock {
    pub pts: f64,
    pub data: Vec<u8>,
}

impl CaptionBlock {
    pub fn new(pts: f64, data: Vec<u8>) -> Self {
        Self { pts, data }
    }

    pub fn triplets(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(3)
    }
}

/// Holds caption blocks that rode on reference pictures until a
/// non-reference picture shows they can be presented.
///
/// The presentation-ordered output is owned by the caller and passed in on
/// every call, the pending blocks stay here between access units.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    pending: Vec<CaptionBlock>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[CaptionBlock] {
        &self.pending
    }

    /// Routes the blocks of one access unit according to its picture type.
    ///
    /// Access units without captions leave the pending blocks untouched,
    /// except for corrupt ones which always release them.
    pub fn commit(
        &mut self,
        picture: PictureType,
        blocks: Vec<CaptionBlock>,
        out: &mut Vec<CaptionBlock>,
    ) {
        match picture {
            PictureType::Invalid => {
                self.release(out);
                out.extend(blocks);
            }
            _ if blocks.is_empty() => {}
            PictureType::IFrame | PictureType::PFrame => {
                debug!(
                    "deferring {} caption block(s) on {:?}",
                    blocks.len(),
                    picture
                );
                self.pending.extend(blocks);
            }
            PictureType::Other => {
                self.release(out);
                out.extend(blocks);
            }
        }
    }

    /// Moves every pending block to `out`, most recently deferred first.
    pub fn release(&mut self, out: &mut Vec<CaptionBlock>) {
        out.extend(self.pending.drain(..).rev());
    }
}
