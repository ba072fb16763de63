#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("stream type 0x{0:02x} has no caption parser")]
    UnsupportedStreamType(u8),
    #[error("no video stream found")]
    NoVideoStream,
}
