use ipmb::IpmbMessage;

use super::{Codec, CodecEvent, InboundMessage};
use crate::hex::{decode_hex_pairs, is_space, push_hex_byte};

const CR: u8 = 0x0d;
const MAX_CHARS: usize = 256 * 2 + 4;

/// RadisysAscii framing: a full IPMB frame hex-encoded byte-for-byte,
/// terminated by `\r`. There is no FIFO behind this codec's outbound
/// IPMB path — `SerialChannel` routes it straight to `encode`/transport
/// instead of queueing, and it has no event queue at all.
pub struct RadisysCodec {
    buffer: Vec<u8>,
    overflow: bool,
    bmc_ipmb: u8,
}

impl RadisysCodec {
    pub fn new(bmc_ipmb: u8) -> Self {
        RadisysCodec {
            buffer: Vec::new(),
            overflow: false,
            bmc_ipmb,
        }
    }
}

impl Codec for RadisysCodec {
    fn handle_char(&mut self, ch: u8) -> Vec<CodecEvent> {
        let mut events = Vec::new();

        if ch == CR {
            if self.overflow {
                events.push(CodecEvent::Dropped("input overrun"));
            } else {
                match decode_hex_pairs(&self.buffer) {
                    Some(bytes) => match IpmbMessage::decode(&bytes) {
                        Ok(msg) => {
                            // Bridged traffic not addressed to this BMC is
                            // silently discarded rather than forwarded.
                            if msg.responder_address == self.bmc_ipmb || msg.responder_address == 1 {
                                events.push(CodecEvent::Inbound(InboundMessage::from_full(msg)));
                            } else {
                                events.push(CodecEvent::Dropped("bridging message discarded"));
                            }
                        }
                        Err(_) => events.push(CodecEvent::Dropped("bad ipmb frame")),
                    },
                    None => events.push(CodecEvent::Dropped("bad hex input")),
                }
            }
            self.buffer.clear();
            self.overflow = false;
            return events;
        }

        if self.overflow {
            return events;
        }

        if self.buffer.len() >= MAX_CHARS {
            self.overflow = true;
        } else if is_space(ch) && matches!(self.buffer.last(), Some(&b) if is_space(b)) {
            // Coalesce consecutive separators.
        } else {
            self.buffer.push(ch);
        }

        events
    }

    fn encode(&self, msg: &IpmbMessage) -> Vec<u8> {
        let frame = msg.encode_response();
        let mut out = Vec::with_capacity(frame.len() * 2 + 1);
        for b in frame {
            push_hex_byte(&mut out, b);
        }
        out.push(CR);
        out
    }

    fn supports_event_queue(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(codec: &mut RadisysCodec, bytes: &[u8]) -> Vec<CodecEvent> {
        let mut out = Vec::new();
        for &b in bytes {
            out.extend(codec.handle_char(b));
        }
        out
    }

    fn sample() -> IpmbMessage {
        IpmbMessage {
            responder_address: 0x20,
            responder_lun: 0,
            netfn: 0x07,
            requester_address: 0x81,
            requester_lun: 2,
            sequence: 0x15,
            command: 0x01,
            payload: vec![0xaa, 0xbb],
        }
    }

    fn wire_for_request(msg: &IpmbMessage) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(msg.responder_address);
        out.push((msg.netfn << 2) | (msg.responder_lun & 0x3));
        out.push(ipmb::ipmb_checksum(&out[0..2]));
        out.push(msg.requester_address);
        out.push((msg.sequence << 2) | (msg.requester_lun & 0x3));
        out.push(msg.command);
        out.extend_from_slice(&msg.payload);
        out.push(ipmb::ipmb_checksum(&out[3..]));
        out
    }

    #[test]
    fn accepts_a_frame_addressed_to_this_bmc() {
        let mut codec = RadisysCodec::new(0x20);
        let mut hex = Vec::new();
        for b in wire_for_request(&sample()) {
            push_hex_byte(&mut hex, b);
        }
        hex.push(CR);
        let events = feed(&mut codec, &hex);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CodecEvent::Inbound(_)));
    }

    #[test]
    fn discards_bridging_traffic_for_other_responders() {
        let mut codec = RadisysCodec::new(0x99);
        let mut hex = Vec::new();
        for b in wire_for_request(&sample()) {
            push_hex_byte(&mut hex, b);
        }
        hex.push(CR);
        let events = feed(&mut codec, &hex);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CodecEvent::Dropped(_)));
    }

    #[test]
    fn accepts_a_frame_addressed_to_the_fixed_address_one() {
        let mut codec = RadisysCodec::new(0x99);
        let mut msg = sample();
        msg.responder_address = 1;
        let mut hex = Vec::new();
        for b in wire_for_request(&msg) {
            push_hex_byte(&mut hex, b);
        }
        hex.push(CR);
        let events = feed(&mut codec, &hex);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CodecEvent::Inbound(_)));
    }

    #[test]
    fn event_queue_is_unsupported() {
        let codec = RadisysCodec::new(0x20);
        assert!(!codec.supports_event_queue());
    }

    #[test]
    fn encode_is_hex_then_carriage_return_with_no_double_transform() {
        let codec = RadisysCodec::new(0x20);
        let out = codec.encode(&sample());
        assert_eq!(*out.last().unwrap(), CR);
        assert_eq!(out.len(), (7 + sample().payload.len()) * 2 + 1);
    }
}
