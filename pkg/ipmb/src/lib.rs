mod checksum;
mod error;
mod frame;

pub use checksum::ipmb_checksum;
pub use error::{FrameError, Result};
pub use frame::IpmbMessage;
