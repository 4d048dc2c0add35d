//! IPMI network function, command, and completion code constants used by the
//! FRU and OEM subsystems. Values match the IPMI specification, not any one
//! vendor's numbering.

pub const NETFN_APP: u8 = 0x06;
pub const NETFN_STORAGE: u8 = 0x0a;

pub const CMD_GET_DEVICE_ID: u8 = 0x01;
pub const CMD_GET_FRU_INVENTORY_AREA_INFO: u8 = 0x10;
pub const CMD_READ_FRU_DATA: u8 = 0x11;
pub const CMD_WRITE_FRU_DATA: u8 = 0x12;

pub const CC_OK: u8 = 0x00;
pub const CC_BUSY: u8 = 0x81;
pub const CC_TIMEOUT: u8 = 0xc3;
pub const CC_REQUEST_DATA_LENGTH_INVALID: u8 = 0xc7;
pub const CC_REQUESTED_DATA_LENGTH_EXCEEDED: u8 = 0xc8;
pub const CC_CANNOT_RETURN_REQ_LENGTH: u8 = 0xca;
pub const CC_UNKNOWN_ERR: u8 = 0xff;

/// Completion codes that indicate the remote device cannot service a read of
/// the size requested and that a smaller fetch size should be retried.
pub fn is_size_related(cc: u8) -> bool {
    matches!(
        cc,
        CC_CANNOT_RETURN_REQ_LENGTH
            | CC_REQUESTED_DATA_LENGTH_EXCEEDED
            | CC_REQUEST_DATA_LENGTH_INVALID
            | CC_TIMEOUT
            | CC_UNKNOWN_ERR
    )
}
