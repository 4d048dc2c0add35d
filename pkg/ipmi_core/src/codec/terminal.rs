use ipmb::IpmbMessage;

use super::{Codec, CodecEvent, InboundMessage};
use crate::hex::{from_hex, is_space, push_hex_byte, skip_space};

/// Bounds how much a single `[...]` frame can accumulate before it is
/// considered overrun and discarded on `]`.
const MAX_CHARS: usize = 256 * 3 + 4;

/// ASCII terminal-mode framing: `[` starts a frame, `]` ends it, and the
/// body is hex-pair-per-byte with optional single spaces between pairs.
/// Carries no IPMB addressing — only netfn/lun, sequence, command, and the
/// command payload.
pub struct TerminalCodec {
    buffer: Vec<u8>,
    in_frame: bool,
    overflow: bool,
}

impl TerminalCodec {
    pub fn new() -> Self {
        TerminalCodec {
            buffer: Vec::new(),
            in_frame: false,
            overflow: false,
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
        self.overflow = false;
    }
}

fn parse_frame(buf: &[u8]) -> Result<InboundMessage, &'static str> {
    let mut decoded = Vec::new();
    let mut p = 0;
    skip_space(buf, &mut p);
    while p < buf.len() {
        let hi = from_hex(buf[p]).ok_or("bad hex digit")?;
        p += 1;
        if p >= buf.len() {
            return Err("dangling hex nibble");
        }
        let lo = from_hex(buf[p]).ok_or("bad hex digit")?;
        p += 1;
        decoded.push((hi << 4) | lo);
        skip_space(buf, &mut p);
    }

    if decoded.len() < 3 {
        return Err("frame shorter than netfn/seq/cmd");
    }

    let byte0 = decoded[0];
    let byte1 = decoded[1];
    let command = decoded[2];
    let len = decoded.len() - 3;

    Ok(InboundMessage {
        netfn: byte0 >> 2,
        requester_lun: byte0 & 0x3,
        sequence: byte1 >> 2,
        command,
        payload: decoded[3..3 + len].to_vec(),
        addresses: None,
    })
}

impl Codec for TerminalCodec {
    fn handle_char(&mut self, ch: u8) -> Vec<CodecEvent> {
        let mut events = Vec::new();

        if ch == b'[' {
            if self.in_frame {
                events.push(CodecEvent::Dropped("frame started inside another frame"));
            }
            self.buffer.clear();
            self.in_frame = true;
            self.overflow = false;
            return events;
        }

        if !self.in_frame {
            return events;
        }

        if ch == b']' {
            if self.overflow {
                events.push(CodecEvent::Dropped("input overrun"));
            } else {
                match parse_frame(&self.buffer) {
                    Ok(msg) => events.push(CodecEvent::Inbound(msg)),
                    Err(reason) => events.push(CodecEvent::Dropped(reason)),
                }
            }
            self.reset();
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
        let mut out = Vec::with_capacity(4 + msg.payload.len() * 3);
        out.push(b'[');
        push_hex_byte(&mut out, (msg.netfn << 2) | (msg.requester_lun & 0x3));
        push_hex_byte(&mut out, msg.sequence << 2);
        push_hex_byte(&mut out, msg.command);
        for b in &msg.payload {
            out.push(b' ');
            push_hex_byte(&mut out, *b);
        }
        out.push(b']');
        out.push(b'\n');
        out
    }
}
