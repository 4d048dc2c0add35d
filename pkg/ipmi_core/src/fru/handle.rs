use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::transport::DeviceAddr;

pub const MAX_READ_FETCH: usize = 32;
pub const MIN_READ_FETCH: usize = 16;
pub const READ_FETCH_STEP: usize = 8;
pub const MAX_FRU_DATA_WRITE: usize = 16;
pub const MAX_FRU_WRITE_RETRIES: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FruIdentity {
    pub channel: u8,
    pub device_address: u8,
    pub device_id: u8,
    pub lun: u8,
}

pub type FetchedCallback = Box<dyn FnOnce(Arc<FruHandle>, Result<()>) + Send>;
pub type DestroyedCallback = Box<dyn FnOnce() + Send>;

/// A contiguous byte range in the FRU's data buffer that has been modified
/// in memory and needs writing back to the device.
#[derive(Clone, Copy, Debug)]
pub struct UpdateRecord {
    pub offset: usize,
    pub length: usize,
}

/// A decoded record plus the operations needed to write it back.
///
/// `write` re-encodes the record into the handle's data buffer and pushes
/// the dirty ranges via `FruHandle::push_update`; `write_complete` is called
/// once those ranges have all been flushed successfully.
pub trait FruRecordOps: Send + Sync {
    fn write(&self, handle: &FruHandle) -> Result<()>;
    fn write_complete(&self) {}
}

pub(super) struct FruState {
    pub(super) fetch_size: usize,
    pub(super) access_by_words: bool,
    pub(super) data: Vec<u8>,
    pub(super) curr_pos: usize,
    pub(super) update_recs: VecDeque<UpdateRecord>,
    pub(super) last_cmd: Vec<u8>,
    pub(super) retry_count: u32,
    pub(super) in_use: bool,
    pub(super) deleted: bool,
    pub(super) record: Option<Arc<dyn Any + Send + Sync>>,
    pub(super) ops: Option<Arc<dyn FruRecordOps>>,
}

impl FruState {
    fn new() -> Self {
        FruState {
            fetch_size: MAX_READ_FETCH,
            access_by_words: false,
            data: Vec::new(),
            curr_pos: 0,
            update_recs: VecDeque::new(),
            last_cmd: Vec::new(),
            retry_count: 0,
            in_use: false,
            deleted: false,
            record: None,
            ops: None,
        }
    }
}

/// A single FRU's in-memory state: the inventory fetch machinery, the
/// decoded record (once fetched), and any pending writeback. Lifetime is
/// managed through `Arc` strong-count: the last `Arc<FruHandle>` to drop
/// runs the destroyed callback, replacing the hand-rolled refcount-plus-
/// registry-lock dance the reference implementation uses for the same
/// purpose.
pub struct FruHandle {
    pub identity: FruIdentity,
    pub(super) inner: Mutex<FruState>,
    destroyed_cb: Mutex<Option<DestroyedCallback>>,
}

impl Drop for FruHandle {
    fn drop(&mut self) {
        if let Some(cb) = self.destroyed_cb.lock().unwrap().take() {
            cb();
        }
    }
}

impl FruHandle {
    pub fn new(identity: FruIdentity) -> Arc<Self> {
        Arc::new(FruHandle {
            identity,
            inner: Mutex::new(FruState::new()),
            destroyed_cb: Mutex::new(None),
        })
    }

    pub fn set_destroyed_callback(&self, cb: DestroyedCallback) {
        *self.destroyed_cb.lock().unwrap() = Some(cb);
    }

    pub fn address(&self) -> DeviceAddr {
        DeviceAddr {
            channel: self.identity.channel,
            device_address: self.identity.device_address,
            lun: self.identity.lun,
        }
    }

    /// Marks the FRU as deleted. Outstanding reads observe this on their
    /// next response and surface `Error::Cancelled`; outstanding writes
    /// intentionally ignore it and run to completion.
    pub fn mark_deleted(&self) {
        self.inner.lock().unwrap().deleted = true;
    }

    pub fn is_deleted(&self) -> bool {
        self.inner.lock().unwrap().deleted
    }

    /// Atomically checks and sets `in_use`, returning `false` if an
    /// operation was already outstanding.
    pub fn try_begin_use(&self) -> bool {
        let mut s = self.inner.lock().unwrap();
        if s.in_use {
            return false;
        }
        s.in_use = true;
        true
    }

    pub fn clear_in_use(&self) {
        self.inner.lock().unwrap().in_use = false;
    }

    pub fn access_by_words(&self) -> bool {
        self.inner.lock().unwrap().access_by_words
    }

    pub fn data_len(&self) -> usize {
        self.inner.lock().unwrap().data.len()
    }

    pub fn curr_pos(&self) -> usize {
        self.inner.lock().unwrap().curr_pos
    }

    pub fn fetch_size(&self) -> usize {
        self.inner.lock().unwrap().fetch_size
    }

    pub fn shrink_fetch_size(&self) {
        let mut s = self.inner.lock().unwrap();
        s.fetch_size -= READ_FETCH_STEP;
    }

    pub fn data_snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().data.clone()
    }

    pub fn record<T: 'static + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .lock()
            .unwrap()
            .record
            .clone()
            .and_then(|r| r.downcast::<T>().ok())
    }

    pub fn ops(&self) -> Option<Arc<dyn FruRecordOps>> {
        self.inner.lock().unwrap().ops.clone()
    }

    pub(super) fn attach_record(&self, record: Arc<dyn Any + Send + Sync>, ops: Arc<dyn FruRecordOps>) {
        let mut s = self.inner.lock().unwrap();
        s.record = Some(record);
        s.ops = Some(ops);
    }

    pub(super) fn begin_read(&self, buffer: Vec<u8>, access_by_words: bool) {
        let mut s = self.inner.lock().unwrap();
        s.access_by_words = access_by_words;
        s.data = buffer;
        s.curr_pos = 0;
        s.fetch_size = MAX_READ_FETCH;
    }

    /// Returns `(offset, length)` of the next chunk to fetch given the
    /// current fetch size and position.
    pub(super) fn read_window(&self) -> (usize, usize) {
        let s = self.inner.lock().unwrap();
        let remaining = s.data.len() - s.curr_pos;
        let to_read = remaining.min(s.fetch_size);
        (s.curr_pos, to_read)
    }

    pub(super) fn append_read(&self, bytes: &[u8]) {
        let mut s = self.inner.lock().unwrap();
        let pos = s.curr_pos;
        s.data[pos..pos + bytes.len()].copy_from_slice(bytes);
        s.curr_pos += bytes.len();
    }

    pub(super) fn truncate_to_curr_pos(&self) {
        let mut s = self.inner.lock().unwrap();
        let pos = s.curr_pos;
        s.data.truncate(pos);
    }

    pub(super) fn release_buffer(&self) {
        self.inner.lock().unwrap().data = Vec::new();
    }

    pub(super) fn alloc_write_buffer(&self, buffer: Vec<u8>) {
        self.inner.lock().unwrap().data = buffer;
    }

    /// Registers a dirty byte range for write-back, rounding to a word
    /// boundary on both ends when the device is word-addressed.
    pub fn push_update(&self, offset: usize, length: usize) {
        let mut s = self.inner.lock().unwrap();
        let (mut offset, mut length) = (offset, length);
        if s.access_by_words {
            if offset % 2 == 1 {
                offset -= 1;
                length += 1;
            }
            if length % 2 == 1 {
                length += 1;
            }
        }
        s.update_recs.push_back(UpdateRecord { offset, length });
    }

    pub(super) fn clear_update_recs(&self) {
        self.inner.lock().unwrap().update_recs.clear();
    }

    pub(super) fn has_pending_updates(&self) -> bool {
        !self.inner.lock().unwrap().update_recs.is_empty()
    }

    /// Packs up to `max` contiguous dirty bytes starting at the front of the
    /// update queue into one write chunk, consuming (and partially
    /// consuming) records as needed. Returns `(offset, bytes)`.
    pub(super) fn pack_next_chunk(&self, max: usize) -> (usize, Vec<u8>) {
        let mut s = self.inner.lock().unwrap();
        let start = s.update_recs.front().unwrap().offset;
        let mut noff = start;
        let mut left = max;
        let mut out = Vec::new();

        while left > 0 {
            let (take, exhausted) = match s.update_recs.front_mut() {
                Some(rec) if rec.offset == noff => {
                    let take = left.min(rec.length);
                    rec.offset += take;
                    rec.length -= take;
                    (take, rec.length == 0)
                }
                _ => break,
            };
            out.extend_from_slice(&s.data[noff..noff + take]);
            noff += take;
            left -= take;
            if exhausted {
                s.update_recs.pop_front();
            }
        }

        (start, out)
    }

    pub(super) fn set_last_cmd(&self, cmd: Vec<u8>) {
        let mut s = self.inner.lock().unwrap();
        s.last_cmd = cmd;
        s.retry_count = 0;
    }

    pub(super) fn last_cmd(&self) -> Vec<u8> {
        self.inner.lock().unwrap().last_cmd.clone()
    }

    pub(super) fn retry_count(&self) -> u32 {
        self.inner.lock().unwrap().retry_count
    }

    pub(super) fn increment_retry(&self) {
        self.inner.lock().unwrap().retry_count += 1;
    }
}
