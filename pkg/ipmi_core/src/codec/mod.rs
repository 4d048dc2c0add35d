mod direct;
mod radisys;
mod terminal;

pub use direct::DirectCodec;
pub use radisys::RadisysCodec;
pub use terminal::TerminalCodec;

use ipmb::IpmbMessage;

/// Which wire framing a `SerialChannel` speaks. Picking one fixes both the
/// inbound parser and the outbound encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    TerminalMode,
    Direct,
    RadisysAscii,
}

/// Addressing carried alongside an inbound message. `DirectMode` and
/// `RadisysAscii` frames always carry it; `TerminalMode` never does, since
/// its wire format omits addresses entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InboundAddresses {
    pub responder_address: u8,
    pub responder_lun: u8,
    pub requester_address: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub netfn: u8,
    pub requester_lun: u8,
    pub sequence: u8,
    pub command: u8,
    pub payload: Vec<u8>,
    pub addresses: Option<InboundAddresses>,
}

impl InboundMessage {
    fn from_full(msg: IpmbMessage) -> Self {
        InboundMessage {
            netfn: msg.netfn,
            requester_lun: msg.requester_lun,
            sequence: msg.sequence,
            command: msg.command,
            payload: msg.payload,
            addresses: Some(InboundAddresses {
                responder_address: msg.responder_address,
                responder_lun: msg.responder_lun,
                requester_address: msg.requester_address,
            }),
        }
    }
}

/// One event produced by feeding a single byte to a codec's state machine.
/// A codec may emit zero, one, or (for `DirectMode`'s STOP handling) two of
/// these per byte.
pub enum CodecEvent {
    /// A fully decoded message ready for upstream dispatch.
    Inbound(InboundMessage),
    /// Raw bytes that must be written back to the transport immediately
    /// (DirectMode's handshake byte).
    Transmit(Vec<u8>),
    /// A frame was discarded locally. Codec errors never propagate past the
    /// byte that caused them; they are logged and parsing continues.
    Dropped(&'static str),
}

/// Per-byte parser plus response encoder for one wire framing.
pub trait Codec: Send {
    fn handle_char(&mut self, ch: u8) -> Vec<CodecEvent>;

    /// Encodes a response message for this framing and returns the bytes to
    /// write to the transport.
    fn encode(&self, msg: &IpmbMessage) -> Vec<u8>;

    /// Whether `SerialChannel::queue_event` may be used with this codec.
    fn supports_event_queue(&self) -> bool {
        true
    }
}

pub fn new_codec(kind: CodecKind, bmc_ipmb: u8) -> Box<dyn Codec> {
    match kind {
        CodecKind::TerminalMode => Box::new(TerminalCodec::new()),
        CodecKind::Direct => Box::new(DirectCodec::new()),
        CodecKind::RadisysAscii => Box::new(RadisysCodec::new(bmc_ipmb)),
    }
}
