use failure::Fail;

#[derive(Clone, Debug, Fail)]
pub enum Error {
    /// An IPMB frame shorter than the minimum 7 bytes.
    ShortFrame,
    /// An IPMB frame whose whole-buffer checksum did not sum to zero.
    BadChecksum,
    /// A non-hex character appeared where a hex digit was expected.
    BadHex,
    /// A FRU inventory area reported a size below the 8-byte header minimum.
    UndersizedArea(u16),
    /// The device's GET_FRU_INVENTORY_AREA_INFO response was malformed.
    InvalidInventorySize(u16),
    /// A READ_FRU_DATA or WRITE_FRU_DATA response claimed a byte count that
    /// does not fit the payload actually returned.
    CountMismatch { expected_max: usize, got: usize },
    /// A READ_FRU_DATA response claimed to move zero bytes without an error.
    ZeroProgress,
    /// The FRU is already mid-operation (read or write).
    Busy,
    /// The FRU handle was destroyed while an operation was outstanding.
    Cancelled,
    /// A buffer allocation failed.
    OutOfMemory,
    /// The remote device returned a non-zero IPMI completion code.
    IpmiError(u8),
    /// No decoder in a `FruDecoderRegistry` could interpret the inventory
    /// data, or a requested capability is not implemented by a codec.
    Unsupported(&'static str),
    /// Reserved for upstream/session-layer callers (e.g. a registry lookup
    /// by an identity this crate does not track). Nothing in this crate
    /// raises it.
    NotFound,
    /// Reserved for upstream/session-layer callers (e.g. an access-control
    /// decision made above this crate). Nothing in this crate raises it.
    PermissionDenied,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        std::fmt::Debug::fmt(self, f)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<ipmb::FrameError> for Error {
    fn from(e: ipmb::FrameError) -> Self {
        match e {
            ipmb::FrameError::ShortFrame => Error::ShortFrame,
            ipmb::FrameError::BadChecksum => Error::BadChecksum,
        }
    }
}
