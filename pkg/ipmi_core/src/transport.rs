//! The upstream abstraction every component in this crate sends IPMI
//! commands and log lines through. Nothing here assumes a particular
//! transport (serial, LAN, loopback test fixture); it is defined purely by
//! the capability set callers need.

use std::sync::Arc;

use crate::codec::InboundMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Identifies the device a request should be routed to. For a BMC-local FRU
/// this is usually channel 0 at the BMC's own slave address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DeviceAddr {
    pub channel: u8,
    pub device_address: u8,
    pub lun: u8,
}

#[derive(Clone, Debug)]
pub struct IpmiRequest {
    pub netfn: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

/// An IPMI response with the completion code already split out of the
/// payload: `data` holds only the bytes that follow it.
#[derive(Clone, Debug)]
pub struct IpmiResponse {
    pub completion_code: u8,
    pub data: Vec<u8>,
}

impl IpmiResponse {
    pub fn ok(data: Vec<u8>) -> Self {
        IpmiResponse {
            completion_code: crate::commands::CC_OK,
            data,
        }
    }

    pub fn error(completion_code: u8) -> Self {
        IpmiResponse {
            completion_code,
            data: Vec::new(),
        }
    }
}

pub type ResponseHandler = Box<dyn FnOnce(IpmiResponse) + Send>;

/// Capability set any upstream sender must supply. FRU read/write, the OEM
/// device-ID probe, and `SerialChannel`'s inbound dispatch all go through
/// this one abstraction.
pub trait ChannelBase: Send + Sync {
    /// Allocates a scratch buffer of `size` bytes. The default never fails;
    /// override to exercise out-of-memory handling in tests.
    fn alloc(&self, size: usize) -> Option<Vec<u8>> {
        Some(vec![0u8; size])
    }

    fn log(&self, level: LogLevel, ctx: &str, message: &str);

    /// Delivers a fully decoded inbound IPMB message to the session/dispatch
    /// layer. Out of scope for this crate beyond the call site.
    fn smi_send(&self, msg: InboundMessage);

    /// Hands a completed response back to whatever queued the original
    /// message, so it can be framed and written to the transport.
    fn return_rsp(&self, original: &InboundMessage, rsp: &IpmiResponse);

    /// Sends an IPMI request to `addr` and invokes `handler` with the
    /// response. Implementations decide how replies are correlated
    /// (sequence numbers, a pending-request table, etc).
    fn send_command_addr(&self, addr: DeviceAddr, request: IpmiRequest, handler: ResponseHandler);
}

pub type SharedChannel = Arc<dyn ChannelBase>;
