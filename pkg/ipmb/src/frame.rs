use crate::checksum::ipmb_checksum;
use crate::error::{FrameError, Result};

/// A fully addressed IPMB message.
///
/// `responder_address`/`responder_lun` always name the BMC side and
/// `requester_address`/`requester_lun` always name the remote side,
/// regardless of which direction the message is travelling. Only the wire
/// *byte order* depends on direction: an inbound frame is addressed to the
/// BMC, so byte 0 is the responder; an outbound response is addressed to the
/// remote device, so byte 0 is the requester. `decode` and `encode_response`
/// are therefore not inverses of one another — they parse/produce frames
/// travelling in opposite directions using the same field names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpmbMessage {
    pub responder_address: u8,
    pub responder_lun: u8,
    pub netfn: u8,
    pub requester_address: u8,
    pub requester_lun: u8,
    pub sequence: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl IpmbMessage {
    /// Encodes this message as an outbound response frame: the requester
    /// address goes first (it is the destination), the responder address
    /// (the BMC itself) goes second.
    pub fn encode_response(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7 + self.payload.len());

        out.push(self.requester_address);
        out.push((self.netfn << 2) | (self.requester_lun & 0x3));
        let first_checksum = ipmb_checksum(&out[0..2]);
        out.push(first_checksum);

        out.push(self.responder_address);
        out.push((self.sequence << 2) | (self.responder_lun & 0x3));
        out.push(self.command);
        out.extend_from_slice(&self.payload);

        let second_checksum = ipmb_checksum(&out[3..]);
        out.push(second_checksum);

        out
    }

    /// Decodes an inbound frame addressed to the BMC: byte 0 is the
    /// responder (the BMC), byte 3 is the requester (the originator).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 7 {
            return Err(FrameError::ShortFrame);
        }
        if ipmb_checksum(bytes) != 0 {
            return Err(FrameError::BadChecksum);
        }

        let end = bytes.len() - 1;
        Ok(IpmbMessage {
            responder_address: bytes[0],
            netfn: bytes[1] >> 2,
            responder_lun: bytes[1] & 0x3,
            requester_address: bytes[3],
            sequence: bytes[4] >> 2,
            requester_lun: bytes[4] & 0x3,
            command: bytes[5],
            payload: bytes[6..end].to_vec(),
        })
    }
}
