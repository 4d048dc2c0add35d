use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ipmb::IpmbMessage;

use crate::codec::{self, Codec, CodecEvent, CodecKind};
use crate::error::{Error, Result};
use crate::transport::{ChannelBase, LogLevel};

/// Where a `SerialChannel` writes the bytes it produces. Kept separate from
/// `ChannelBase` because the transport only ever moves raw bytes — it knows
/// nothing about IPMI.
pub trait SerialTransport: Send + Sync {
    fn ser_send(&self, bytes: &[u8]);
}

#[derive(Default)]
struct Queues {
    ipmb_q: VecDeque<IpmbMessage>,
    event_q: VecDeque<IpmbMessage>,
}

enum QueueKind {
    Ipmb,
    Event,
}

/// One serial line speaking a single codec variant, with the two outbound
/// FIFOs (`ipmb_q`, `event_q`) that TerminalMode and DirectMode drain
/// attention-signalled messages from, and the per-byte state machine that
/// decodes inbound traffic.
pub struct SerialChannel {
    codec: Mutex<Box<dyn Codec>>,
    kind: CodecKind,
    transport: Arc<dyn SerialTransport>,
    upstream: Arc<dyn ChannelBase>,
    attn_chars: Vec<u8>,
    attn_enabled: Mutex<bool>,
    queues: Mutex<Queues>,
}

impl SerialChannel {
    pub fn new(
        kind: CodecKind,
        transport: Arc<dyn SerialTransport>,
        upstream: Arc<dyn ChannelBase>,
        bmc_ipmb: u8,
        attn_chars: Vec<u8>,
    ) -> Self {
        SerialChannel {
            codec: Mutex::new(codec::new_codec(kind, bmc_ipmb)),
            kind,
            transport,
            upstream,
            attn_chars,
            attn_enabled: Mutex::new(true),
            queues: Mutex::new(Queues::default()),
        }
    }

    pub fn set_attention_enabled(&self, enabled: bool) {
        *self.attn_enabled.lock().unwrap() = enabled;
    }

    /// Feeds one byte received from the transport through the codec and
    /// dispatches whatever events it produces.
    pub fn handle_char(&self, ch: u8) {
        let events = self.codec.lock().unwrap().handle_char(ch);
        for event in events {
            match event {
                CodecEvent::Inbound(msg) => self.upstream.smi_send(msg),
                CodecEvent::Transmit(bytes) => self.transport.ser_send(&bytes),
                CodecEvent::Dropped(reason) => {
                    self.upstream.log(LogLevel::Warning, "serial_codec", reason)
                }
            }
        }
    }

    /// Encodes and writes a response message directly to the transport.
    pub fn send(&self, msg: &IpmbMessage) {
        let bytes = self.codec.lock().unwrap().encode(msg);
        self.transport.ser_send(&bytes);
    }

    /// Enqueues an IPMB message for asynchronous delivery down the wire.
    /// RadisysAscii has no FIFO behind this entry point — it formats and
    /// writes immediately instead.
    pub fn queue_ipmb(&self, msg: IpmbMessage) -> Result<()> {
        if self.kind == CodecKind::RadisysAscii {
            self.send(&msg);
            return Ok(());
        }
        self.enqueue(QueueKind::Ipmb, msg);
        Ok(())
    }

    /// Enqueues an asynchronous event message. Unsupported on codecs whose
    /// `supports_event_queue` is false (RadisysAscii).
    pub fn queue_event(&self, msg: IpmbMessage) -> Result<()> {
        if !self.codec.lock().unwrap().supports_event_queue() {
            return Err(Error::Unsupported(
                "this codec does not support asynchronous event queuing",
            ));
        }
        self.enqueue(QueueKind::Event, msg);
        Ok(())
    }

    pub fn dequeue_ipmb(&self) -> Option<IpmbMessage> {
        self.queues.lock().unwrap().ipmb_q.pop_front()
    }

    pub fn dequeue_event(&self) -> Option<IpmbMessage> {
        self.queues.lock().unwrap().event_q.pop_front()
    }

    fn enqueue(&self, which: QueueKind, msg: IpmbMessage) {
        let was_empty;
        {
            let mut queues = self.queues.lock().unwrap();
            let q = match which {
                QueueKind::Ipmb => &mut queues.ipmb_q,
                QueueKind::Event => &mut queues.event_q,
            };
            was_empty = q.is_empty();
            q.push_back(msg);
        }
        if was_empty && *self.attn_enabled.lock().unwrap() {
            self.transport.ser_send(&self.attn_chars);
        }
    }
}
