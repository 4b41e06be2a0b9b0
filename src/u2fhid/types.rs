//! Shared constants for the U2FHID transport: channel/frame geometry and
//! the command byte set.

use modular_bitfield::prelude::*;

/// The 32-bit channel id reserved for the INIT handshake. Not a real,
/// allocated channel: no session is ever created for it directly.
pub const BROADCAST_CHANNEL: u32 = 0xFFFF_FFFF;

/// Every U2FHID frame, init or continuation, is exactly this many bytes.
pub const FRAME_LEN: usize = 64;

/// Payload bytes an init frame can carry: 64 - 4 (channel) - 1 (cmd) - 2 (len).
pub const INIT_PAYLOAD_MAX: usize = 57;

/// Payload bytes a continuation frame can carry: 64 - 4 (channel) - 1 (seq).
pub const CONT_PAYLOAD_MAX: usize = 59;

/// Upper bound on a reassembled MSG/PING payload held in a session buffer.
pub const MAX_MESSAGE_LEN: usize = 2048;

/// Upper bound on the number of 64-byte frames queued for one response.
pub const MAX_RESPONSE_FRAMES: usize = 48;

/// Number of concurrently live channel sessions a [`crate::u2fhid::handler::Handler`]
/// can track. Must be a power of two (`heapless::FnvIndexMap` requirement).
pub const SESSION_CAPACITY: usize = 4;

/// The mandatory U2FHID command bytes. The high bit is always set; it's
/// what [`is_init`] tests to distinguish an init frame from a continuation.
pub mod command {
    pub const PING: u8 = 0x81;
    pub const MSG: u8 = 0x83;
    pub const INIT: u8 = 0x86;
    pub const ERROR: u8 = 0xBF;

    /// Recognized but unimplemented: the dispatcher answers these with
    /// `InvalidCmd` rather than treating them as unknown frames.
    pub const LOCK: u8 = 0x84;
    pub const WINK: u8 = 0x88;
    pub const SYNC: u8 = 0xBC;
}

/// The byte at frame offset 4, packed the same way the frame shapes share
/// it: the high bit flags an init frame, the low 7 bits carry either the
/// init frame's command (already including that high bit, per
/// [`command`]) or the continuation frame's sequence number (`seq < 0x80`,
/// so the high bit reads back as 0). Mirrors the teacher's `#[bitfield]`
/// treatment of `MacHeader`'s packed MHDR byte.
#[bitfield]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTag {
    pub low_bits: B7,
    pub is_init: bool,
}

/// An init frame's command byte always has the high bit set; a
/// continuation frame's sequence byte never does (`seq < 0x80`).
pub fn is_init(cmd_byte: u8) -> bool {
    FrameTag::from_bytes([cmd_byte]).is_init()
}
