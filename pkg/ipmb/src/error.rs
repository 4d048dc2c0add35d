use failure::Fail;

#[derive(Clone, Debug, Fail)]
pub enum FrameError {
    /// Fewer than the 7 bytes a minimal IPMB frame requires.
    ShortFrame,
    /// The whole-frame checksum did not sum to zero.
    BadChecksum,
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        std::fmt::Debug::fmt(self, f)
    }
}

pub type Result<T, E = FrameError> = std::result::Result<T, E>;
