//! OEM device identification: probe a device with GET_DEVICE_ID and install
//! whatever handler was registered for the manufacturer/product pair that
//! comes back.

use std::sync::Arc;

use crate::commands;
use crate::transport::{ChannelBase, DeviceAddr, IpmiRequest, IpmiResponse};

pub struct OemHandler {
    pub manufacturer_id: u32,
    pub product_id: u16,
    pub install: Box<dyn Fn(Arc<dyn ChannelBase>) + Send + Sync>,
}

/// Handlers are registered once up front, before any channel is
/// initialized, so lookups need no locking.
#[derive(Default)]
pub struct OemRegistry {
    handlers: Vec<OemHandler>,
}

impl OemRegistry {
    pub fn new() -> Self {
        OemRegistry {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: OemHandler) {
        self.handlers.push(handler);
    }

    fn find(&self, manufacturer_id: u32, product_id: u16) -> Option<&OemHandler> {
        self.handlers
            .iter()
            .find(|h| h.manufacturer_id == manufacturer_id && h.product_id == product_id)
    }
}

/// Sends a GET_DEVICE_ID probe and, on a matching manufacturer/product
/// pair, installs the registered OEM handler onto the channel. Intended to
/// run once at channel initialization.
pub fn channel_init(channel: Arc<dyn ChannelBase>, registry: Arc<OemRegistry>) {
    let request = IpmiRequest {
        netfn: commands::NETFN_APP,
        command: commands::CMD_GET_DEVICE_ID,
        data: Vec::new(),
    };

    let channel2 = channel.clone();
    channel.send_command_addr(
        DeviceAddr::default(),
        request,
        Box::new(move |rsp| {
            handle_device_id_response(channel2, registry, rsp);
        }),
    );
}

fn handle_device_id_response(channel: Arc<dyn ChannelBase>, registry: Arc<OemRegistry>, rsp: IpmiResponse) {
    if rsp.completion_code != commands::CC_OK || rsp.data.len() < 11 {
        return;
    }

    let manufacturer_id =
        (rsp.data[6] as u32) | ((rsp.data[7] as u32) << 8) | ((rsp.data[8] as u32) << 16);
    let product_id = (rsp.data[9] as u16) | ((rsp.data[10] as u16) << 8);

    if let Some(handler) = registry.find(manufacturer_id, product_id) {
        (handler.install)(channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{LogLevel, ResponseHandler};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct ProbeChannel {
        response: Mutex<Option<IpmiResponse>>,
    }
    impl ChannelBase for ProbeChannel {
        fn log(&self, _level: LogLevel, _ctx: &str, _message: &str) {}
        fn smi_send(&self, _msg: crate::codec::InboundMessage) {}
        fn return_rsp(&self, _original: &crate::codec::InboundMessage, _rsp: &IpmiResponse) {}
        fn send_command_addr(&self, _addr: DeviceAddr, _request: IpmiRequest, handler: ResponseHandler) {
            handler(self.response.lock().unwrap().take().unwrap());
        }
    }

    fn device_id_response(manufacturer_id: u32, product_id: u16) -> IpmiResponse {
        let mut data = vec![0u8; 11];
        data[6] = (manufacturer_id & 0xff) as u8;
        data[7] = ((manufacturer_id >> 8) & 0xff) as u8;
        data[8] = ((manufacturer_id >> 16) & 0xff) as u8;
        data[9] = (product_id & 0xff) as u8;
        data[10] = ((product_id >> 8) & 0xff) as u8;
        IpmiResponse::ok(data)
    }

    #[test]
    fn installs_the_handler_matching_manufacturer_and_product() {
        let channel = Arc::new(ProbeChannel {
            response: Mutex::new(Some(device_id_response(0x00a015, 0x1234))),
        });

        let installed = Arc::new(AtomicBool::new(false));
        let installed2 = installed.clone();

        let mut registry = OemRegistry::new();
        registry.register(OemHandler {
            manufacturer_id: 0x00a015,
            product_id: 0x1234,
            install: Box::new(move |_chan| {
                installed2.store(true, Ordering::SeqCst);
            }),
        });

        channel_init(channel, Arc::new(registry));
        assert!(installed.load(Ordering::SeqCst));
    }

    #[test]
    fn no_handler_installed_when_nothing_matches() {
        let channel = Arc::new(ProbeChannel {
            response: Mutex::new(Some(device_id_response(0x000002, 0x0001))),
        });

        let installed = Arc::new(AtomicBool::new(false));
        let installed2 = installed.clone();

        let mut registry = OemRegistry::new();
        registry.register(OemHandler {
            manufacturer_id: 0x00a015,
            product_id: 0x1234,
            install: Box::new(move |_chan| {
                installed2.store(true, Ordering::SeqCst);
            }),
        });

        channel_init(channel, Arc::new(registry));
        assert!(!installed.load(Ordering::SeqCst));
    }

    #[test]
    fn malformed_response_is_ignored() {
        let channel = Arc::new(ProbeChannel {
            response: Mutex::new(Some(IpmiResponse::ok(vec![0; 3]))),
        });
        channel_init(channel, Arc::new(OemRegistry::new()));
        // No panic, nothing installed: short response is simply dropped.
    }
}
