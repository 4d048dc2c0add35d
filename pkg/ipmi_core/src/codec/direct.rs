use ipmb::IpmbMessage;

use super::{Codec, CodecEvent, InboundMessage};

pub const START: u8 = 0xa0;
pub const STOP: u8 = 0xa5;
pub const HANDSHAKE: u8 = 0xa6;
pub const ESCAPE: u8 = 0xaa;

const MAX_MSG_LEN: usize = 256;

/// Binary DirectMode framing: `START`/`STOP` delimit a frame, `ESCAPE`
/// introduces one of a fixed 5-entry substitution table for the four framing
/// bytes plus 0x1B, and every `STOP` unconditionally elicits a `HANDSHAKE`
/// byte back on the transport regardless of whether the frame was valid.
pub struct DirectCodec {
    buffer: Vec<u8>,
    in_message: bool,
    in_escape: bool,
    overflow: bool,
}

impl DirectCodec {
    pub fn new() -> Self {
        DirectCodec {
            buffer: Vec::new(),
            in_message: false,
            in_escape: false,
            overflow: false,
        }
    }
}

fn unescape(byte: u8) -> Option<u8> {
    match byte {
        0xb0 => Some(START),
        0xb5 => Some(STOP),
        0xb6 => Some(HANDSHAKE),
        0xba => Some(ESCAPE),
        0x3b => Some(0x1b),
        _ => None,
    }
}

fn escape_into(out: &mut Vec<u8>, byte: u8) {
    match byte {
        START => out.extend_from_slice(&[ESCAPE, 0xb0]),
        STOP => out.extend_from_slice(&[ESCAPE, 0xb5]),
        HANDSHAKE => out.extend_from_slice(&[ESCAPE, 0xb6]),
        ESCAPE => out.extend_from_slice(&[ESCAPE, 0xba]),
        0x1b => out.extend_from_slice(&[ESCAPE, 0x3b]),
        other => out.push(other),
    }
}

impl Codec for DirectCodec {
    fn handle_char(&mut self, ch: u8) -> Vec<CodecEvent> {
        let mut events = Vec::new();

        match ch {
            START => {
                if self.in_message {
                    events.push(CodecEvent::Dropped("frame started inside another frame"));
                }
                self.buffer.clear();
                self.in_message = true;
                self.in_escape = false;
                self.overflow = false;
            }
            STOP => {
                if !self.in_message {
                    events.push(CodecEvent::Dropped("STOP received outside a frame"));
                } else if self.in_escape {
                    events.push(CodecEvent::Dropped("message ended inside an escape"));
                } else if self.overflow {
                    events.push(CodecEvent::Dropped("message too long"));
                } else {
                    match IpmbMessage::decode(&self.buffer) {
                        Ok(msg) => events.push(CodecEvent::Inbound(InboundMessage::from_full(msg))),
                        Err(_) => events.push(CodecEvent::Dropped("bad ipmb frame")),
                    }
                }
                self.in_message = false;
                self.in_escape = false;
                // Always acknowledged, valid frame or not.
                events.push(CodecEvent::Transmit(vec![HANDSHAKE]));
            }
            HANDSHAKE => {
                self.in_escape = false;
            }
            ESCAPE => {
                if self.in_message && !self.overflow {
                    self.in_escape = true;
                }
            }
            other => {
                if !self.in_message {
                    return events;
                }

                let byte = if self.in_escape {
                    self.in_escape = false;
                    match unescape(other) {
                        Some(b) => b,
                        None => {
                            self.overflow = true;
                            return events;
                        }
                    }
                } else {
                    other
                };

                if !self.overflow {
                    if self.buffer.len() >= MAX_MSG_LEN {
                        self.overflow = true;
                    } else {
                        self.buffer.push(byte);
                    }
                }
            }
        }

        events
    }

    fn encode(&self, msg: &IpmbMessage) -> Vec<u8> {
        let frame = msg.encode_response();
        let mut out = Vec::with_capacity(frame.len() * 2 + 2);
        out.push(START);
        for b in frame {
            escape_into(&mut out, b);
        }
        out.push(STOP);
        out
    }
}
