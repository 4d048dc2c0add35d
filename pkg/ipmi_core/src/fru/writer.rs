use std::sync::Arc;

use crate::commands::{self};
use crate::error::{Error, Result};
use crate::transport::{ChannelBase, IpmiRequest, IpmiResponse, LogLevel};

use super::handle::{FruHandle, MAX_FRU_DATA_WRITE, MAX_FRU_WRITE_RETRIES};

pub type WriteCallback = Box<dyn FnOnce(Arc<FruHandle>, Result<()>) + Send>;

/// Starts writing back whatever the attached record's `ops.write` marks
/// dirty. Fails immediately with `Error::Busy` if a read or write is
/// already outstanding on this handle — reentrancy is a programmer error,
/// not something to queue.
///
/// Unlike reads, an in-flight write is never cancelled by `FruHandle`
/// deletion: partially writing a FRU back is worse than letting the round
/// finish, so the deleted flag is not consulted here.
pub fn start_write(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    callback: WriteCallback,
) -> Result<()> {
    if !handle.try_begin_use() {
        return Err(Error::Busy);
    }

    let ops = match handle.ops() {
        Some(ops) => ops,
        None => {
            handle.clear_in_use();
            return Err(Error::Unsupported("no decoded record attached to this FRU"));
        }
    };

    let data_len = handle.data_len();
    let buffer = match channel.alloc(data_len) {
        Some(buf) => buf,
        None => {
            handle.clear_in_use();
            return Err(Error::OutOfMemory);
        }
    };
    handle.alloc_write_buffer(buffer);

    if let Err(e) = ops.write(&handle) {
        handle.clear_update_recs();
        handle.release_buffer();
        handle.clear_in_use();
        return Err(e);
    }

    if !handle.has_pending_updates() {
        handle.release_buffer();
        handle.clear_in_use();
        callback(handle, Ok(()));
        return Ok(());
    }

    next_write_round(handle, channel, callback);
    Ok(())
}

fn next_write_round(handle: Arc<FruHandle>, channel: Arc<dyn ChannelBase>, callback: WriteCallback) {
    let shift = if handle.access_by_words() { 1 } else { 0 };
    let (offset, bytes) = handle.pack_next_chunk(MAX_FRU_DATA_WRITE);

    let mut data = Vec::with_capacity(3 + bytes.len());
    data.push(handle.identity.device_id);
    data.extend_from_slice(&((offset >> shift) as u16).to_le_bytes());
    data.extend_from_slice(&bytes);

    handle.set_last_cmd(data.clone());

    let request = IpmiRequest {
        netfn: commands::NETFN_STORAGE,
        command: commands::CMD_WRITE_FRU_DATA,
        data,
    };
    let addr = handle.address();

    let handle2 = handle.clone();
    let channel2 = channel.clone();
    channel.send_command_addr(
        addr,
        request,
        Box::new(move |rsp| {
            handle_write_response(handle2, channel2, rsp, callback);
        }),
    );
}

fn retry_last_command(handle: Arc<FruHandle>, channel: Arc<dyn ChannelBase>, callback: WriteCallback) {
    let data = handle.last_cmd();
    let request = IpmiRequest {
        netfn: commands::NETFN_STORAGE,
        command: commands::CMD_WRITE_FRU_DATA,
        data,
    };
    let addr = handle.address();

    let handle2 = handle.clone();
    let channel2 = channel.clone();
    channel.send_command_addr(
        addr,
        request,
        Box::new(move |rsp| {
            handle_write_response(handle2, channel2, rsp, callback);
        }),
    );
}

fn handle_write_response(
    handle: Arc<FruHandle>,
    channel: Arc<dyn ChannelBase>,
    rsp: IpmiResponse,
    callback: WriteCallback,
) {
    let cc = rsp.completion_code;

    if cc == commands::CC_BUSY {
        if handle.retry_count() >= MAX_FRU_WRITE_RETRIES {
            finish_write(handle, Err(Error::IpmiError(cc)), callback);
            return;
        }
        handle.increment_retry();
        retry_last_command(handle, channel, callback);
        return;
    }

    if cc != commands::CC_OK {
        finish_write(handle, Err(Error::IpmiError(cc)), callback);
        return;
    }

    if rsp.data.is_empty() {
        finish_write(
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
    let echoed = (rsp.data[0] as usize) << shift;
    let expected = handle.last_cmd().len().saturating_sub(3);
    if echoed != expected {
        channel.log(
            LogLevel::Warning,
            "fru_writer",
            "device acknowledged a short write; continuing",
        );
    }

    if handle.has_pending_updates() {
        next_write_round(handle, channel, callback);
    } else {
        finish_write(handle, Ok(()), callback);
    }
}

fn finish_write(handle: Arc<FruHandle>, result: Result<()>, callback: WriteCallback) {
    if result.is_ok() {
        if let Some(ops) = handle.ops() {
            ops.write_complete();
        }
    }
    handle.clear_update_recs();
    handle.release_buffer();
    handle.clear_in_use();
    callback(handle, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::handle::FruRecordOps;
    use crate::fru::FruIdentity;
    use crate::transport::{DeviceAddr, ResponseHandler};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct CountingOps {
        dirty: Mutex<Vec<(usize, usize)>>,
    }
    impl FruRecordOps for CountingOps {
        fn write(&self, handle: &FruHandle) -> Result<()> {
            for (offset, length) in self.dirty.lock().unwrap().iter() {
                handle.push_update(*offset, *length);
            }
            Ok(())
        }
    }

    struct ScriptedChannel {
        script: Mutex<VecDeque<IpmiResponse>>,
        calls: Mutex<usize>,
    }
    impl ScriptedChannel {
        fn new(script: Vec<IpmiResponse>) -> Arc<Self> {
            Arc::new(ScriptedChannel {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            })
        }
    }
    impl ChannelBase for ScriptedChannel {
        fn log(&self, _level: LogLevel, _ctx: &str, _message: &str) {}
        fn smi_send(&self, _msg: crate::codec::InboundMessage) {}
        fn return_rsp(&self, _original: &crate::codec::InboundMessage, _rsp: &IpmiResponse) {}
        fn send_command_addr(&self, _addr: DeviceAddr, _request: IpmiRequest, handler: ResponseHandler) {
            *self.calls.lock().unwrap() += 1;
            let rsp = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("test script ran out of scripted responses");
            handler(rsp);
        }
    }

    fn handle_with_record(data_len: usize, dirty: Vec<(usize, usize)>) -> Arc<FruHandle> {
        let handle = FruHandle::new(FruIdentity {
            channel: 0,
            device_address: 0x20,
            device_id: 0,
            lun: 0,
        });
        handle.begin_read(vec![0xab; data_len], false);
        handle.attach_record(
            Arc::new(()),
            Arc::new(CountingOps {
                dirty: Mutex::new(dirty),
            }),
        );
        handle
    }

    #[test]
    fn busy_completion_code_retries_up_to_the_limit() {
        let handle = handle_with_record(16, vec![(0, 16)]);
        let mut script = vec![IpmiResponse::error(commands::CC_BUSY); 30];
        script.push(IpmiResponse::ok(vec![16]));
        let channel = ScriptedChannel::new(script);

        let result = Arc::new(Mutex::new(None));
        let result2 = result.clone();
        start_write(
            handle,
            channel.clone(),
            Box::new(move |h, r| {
                *result2.lock().unwrap() = Some((h, r));
            }),
        )
        .unwrap();

        assert_eq!(*channel.calls.lock().unwrap(), 31);
        let (_, r) = result.lock().unwrap().take().unwrap();
        assert!(r.is_ok());
    }

    #[test]
    fn exceeding_the_retry_limit_fails_the_write() {
        let handle = handle_with_record(16, vec![(0, 16)]);
        let script = vec![IpmiResponse::error(commands::CC_BUSY); 31];
        let channel = ScriptedChannel::new(script);

        let result = Arc::new(Mutex::new(None));
        let result2 = result.clone();
        start_write(
            handle,
            channel,
            Box::new(move |h, r| {
                *result2.lock().unwrap() = Some((h, r));
            }),
        )
        .unwrap();

        let (_, r) = result.lock().unwrap().take().unwrap();
        assert!(matches!(r, Err(Error::IpmiError(commands::CC_BUSY))));
    }

    #[test]
    fn coalesces_contiguous_dirty_ranges_into_one_write() {
        let handle = handle_with_record(16, vec![(0, 8), (8, 8)]);
        let channel = ScriptedChannel::new(vec![IpmiResponse::ok(vec![16])]);

        let result = Arc::new(Mutex::new(None));
        let result2 = result.clone();
        start_write(
            handle,
            channel.clone(),
            Box::new(move |h, r| {
                *result2.lock().unwrap() = Some((h, r));
            }),
        )
        .unwrap();

        assert_eq!(*channel.calls.lock().unwrap(), 1);
        let (_, r) = result.lock().unwrap().take().unwrap();
        assert!(r.is_ok());
    }

    #[test]
    fn reentrant_write_is_rejected_as_busy() {
        let handle = handle_with_record(16, vec![(0, 16)]);
        assert!(handle.try_begin_use());
        let channel = ScriptedChannel::new(vec![]);
        let err = start_write(handle, channel, Box::new(|_, _| {})).unwrap_err();
        assert!(matches!(err, Error::Busy));
    }
}
