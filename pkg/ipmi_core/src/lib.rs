mod channel;
mod codec;
mod commands;
mod error;
mod fru;
mod hex;
mod oem;
mod transport;

pub use channel::{SerialChannel, SerialTransport};
pub use codec::{CodecKind, InboundAddresses, InboundMessage};
pub use commands::{
    is_size_related, CC_BUSY, CC_CANNOT_RETURN_REQ_LENGTH, CC_OK,
    CC_REQUESTED_DATA_LENGTH_EXCEEDED, CC_REQUEST_DATA_LENGTH_INVALID, CC_TIMEOUT,
    CC_UNKNOWN_ERR, CMD_GET_DEVICE_ID, CMD_GET_FRU_INVENTORY_AREA_INFO, CMD_READ_FRU_DATA,
    CMD_WRITE_FRU_DATA, NETFN_APP, NETFN_STORAGE,
};
pub use error::{Error, Result};
pub use fru::{
    start_fetch as fru_start_fetch, start_write as fru_start_write, FetchedCallback, FruDecoder,
    FruDecoderRegistry, FruHandle, FruIdentity, FruRecordOps, FruRegistry, WriteCallback,
    MAX_FRU_DATA_WRITE, MAX_FRU_WRITE_RETRIES, MAX_READ_FETCH, MIN_READ_FETCH, READ_FETCH_STEP,
};
pub use oem::{channel_init as oem_channel_init, OemHandler, OemRegistry};
pub use transport::{ChannelBase, DeviceAddr, IpmiRequest, IpmiResponse, LogLevel, ResponseHandler, SharedChannel};

pub use ipmb::IpmbMessage;
