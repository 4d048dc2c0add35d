use std::sync::Arc;

use crate::commands::{self, is_size_related};
use crate::error::Error;
use crate::transport::{ChannelBase, IpmiRequest, IpmiResponse, LogLevel};

use super::decoder::FruDecoderRegistry;
use super::handle::{FetchedCallback, FruHandle, MIN_READ_FETCH};

/// Kicks off the inventory probe for a freshly allocated handle:
/// GET_FRU_INVENTORY_AREA_INFO, then the adaptive READ_FRU_DATA loop, then
/// decoding.
pub fn start_fetch(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    decoders: Arc<FruDecoderRegistry>,
    callback: FetchedCallback,
) {
    let request = IpmiRequest {
        netfn: commands::NETFN_STORAGE,
        command: commands::CMD_GET_FRU_INVENTORY_AREA_INFO,
        data: vec![handle.identity.device_id],
    };
    let addr = handle.address();

    let handle2 = handle.clone();
    let channel2 = channel.clone();
    channel.send_command_addr(
        addr,
        request,
        Box::new(move |rsp| {
            handle_area_info_response(handle2, channel2, decoders, rsp, callback);
        }),
    );
}

fn handle_area_info_response(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    decoders: Arc<FruDecoderRegistry>,
    rsp: IpmiResponse,
    callback: FetchedCallback,
) {
    if handle.is_deleted() {
        complete(handle, Err(Error::Cancelled), callback);
        return;
    }

    if rsp.completion_code != commands::CC_OK {
        channel.log(
            LogLevel::Error,
            "fru_reader",
            "error getting FRU inventory area info",
        );
        complete(handle, Err(Error::IpmiError(rsp.completion_code)), callback);
        return;
    }

    if rsp.data.len() < 3 {
        complete(handle, Err(Error::InvalidInventorySize(0)), callback);
        return;
    }

    let size = u16::from_le_bytes([rsp.data[0], rsp.data[1]]);
    let access_by_words = rsp.data[2] & 1 != 0;

    if size < 8 {
        complete(handle, Err(Error::UndersizedArea(size)), callback);
        return;
    }

    let buffer = match channel.alloc(size as usize) {
        Some(buf) => buf,
        None => {
            complete(handle, Err(Error::OutOfMemory), callback);
            return;
        }
    };

    handle.begin_read(buffer, access_by_words);
    request_next_chunk(handle, channel, decoders, callback);
}

fn request_next_chunk(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    decoders: Arc<FruDecoderRegistry>,
    callback: FetchedCallback,
) {
    let shift = if handle.access_by_words() { 1 } else { 0 };
    let (curr_pos, to_read) = handle.read_window();
    let offset = (curr_pos >> shift) as u16;
    let count = (to_read >> shift) as u8;

    let mut data = Vec::with_capacity(4);
    data.push(handle.identity.device_id);
    data.extend_from_slice(&offset.to_le_bytes());
    data.push(count);

    let request = IpmiRequest {
        netfn: commands::NETFN_STORAGE,
        command: commands::CMD_READ_FRU_DATA,
        data,
    };
    let addr = handle.address();

    let handle2 = handle.clone();
    let channel2 = channel.clone();
    channel.send_command_addr(
        addr,
        request,
        Box::new(move |rsp| {
            handle_read_response(handle2, channel2, decoders, rsp, callback);
        }),
    );
}

fn handle_read_response(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    decoders: Arc<FruDecoderRegistry>,
    rsp: IpmiResponse,
    callback: FetchedCallback,
) {
    if handle.is_deleted() {
        complete(handle, Err(Error::Cancelled), callback);
        return;
    }

    let cc = rsp.completion_code;

    if is_size_related(cc) && handle.fetch_size() > MIN_READ_FETCH {
        handle.shrink_fetch_size();
        request_next_chunk(handle, channel, decoders, callback);
        return;
    }

    if cc != commands::CC_OK {
        if handle.curr_pos() >= 8 {
            channel.log(
                LogLevel::Warning,
                "fru_reader",
                "truncated FRU read tolerated: header already present",
            );
            handle.truncate_to_curr_pos();
            finish_read(handle, channel, decoders, callback);
        } else {
            channel.log(LogLevel::Error, "fru_reader", "error reading FRU data");
            complete(handle, Err(Error::IpmiError(cc)), callback);
        }
        return;
    }

    if rsp.data.is_empty() {
        complete(
            handle,
            Err(Error::CountMismatch {
                expected_max: 0,
                got: 0,
            }),
            callback,
        );
        return;
    }

    let shift = if handle.access_by_words() { 1 } else { 0 };
    let count = (rsp.data[0] as usize) << shift;
    let available = rsp.data.len() - 1;

    if count == 0 {
        complete(handle, Err(Error::ZeroProgress), callback);
        return;
    }

    if count > available {
        complete(
            handle,
            Err(Error::CountMismatch {
                expected_max: available,
                got: count,
            }),
            callback,
        );
        return;
    }

    handle.append_read(&rsp.data[1..1 + count]);

    if handle.curr_pos() < handle.data_len() {
        request_next_chunk(handle, channel, decoders, callback);
    } else {
        finish_read(handle, channel, decoders, callback);
    }
}

fn finish_read(
    handle: Arc<FruHandle>,
    _channel: Arc<dyn ChannelBase>,
    decoders: Arc<FruDecoderRegistry>,
    callback: FetchedCallback,
) {
    let result = decoders.decode(&handle);
    handle.release_buffer();
    complete(handle, result, callback);
}

fn complete(handle: Arc<FruHandle>, result: crate::error::Result<()>, callback: FetchedCallback) {
    handle.clear_in_use();
    callback(handle, result);
}
