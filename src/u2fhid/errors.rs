//! U2FHID ERROR frame construction and the error code byte set.

use super::types::{command, FRAME_LEN};

/// The one-byte code carried in an ERROR frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    None = 0,
    InvalidCmd = 1,
    InvalidPar = 2,
    InvalidLen = 3,
    InvalidSeq = 4,
    MsgTimeout = 5,
    ChannelBusy = 6,
    LockRequired = 10,
    InvalidCid = 11,
    Other = 127,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Builds the single init frame an ERROR reply always is: cmd=ERROR,
/// payload_len=1, payload = the error code byte.
pub fn build_error_frame(channel: u32, code: ErrorCode) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..4].copy_from_slice(&channel.to_be_bytes());
    frame[4] = command::ERROR;
    frame[5..7].copy_from_slice(&1u16.to_be_bytes());
    frame[7] = code.as_u8();
    frame
}
