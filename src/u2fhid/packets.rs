//! Parsing and generation of the two 64-byte U2FHID frame shapes.

use heapless::Vec;

use super::types::{is_init, CONT_PAYLOAD_MAX, FRAME_LEN, INIT_PAYLOAD_MAX, MAX_RESPONSE_FRAMES};

/// A parsed init frame: `channel[4] | cmd[1] | payload_len_be[2] | payload[0..57]`.
///
/// `payload` is the frame's full 57-byte payload region, not truncated to
/// `payload_len` — the caller truncates when copying into a session buffer.
#[derive(Debug, Clone, Copy)]
pub struct InitPacket<'a> {
    pub channel: u32,
    pub cmd: u8,
    pub payload_len: u16,
    pub payload: &'a [u8],
}

/// A parsed continuation frame: `channel[4] | seq[1] | payload[0..59]`.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationPacket<'a> {
    pub channel: u32,
    pub seq: u8,
    pub payload: &'a [u8],
}

/// Reads a 64-byte frame already known to be an init frame (high bit of
/// byte 4 set).
pub fn parse_init(frame: &[u8; FRAME_LEN]) -> InitPacket<'_> {
    debug_assert!(is_init(frame[4]));
    let channel = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let cmd = frame[4];
    let payload_len = u16::from_be_bytes([frame[5], frame[6]]);
    InitPacket {
        channel,
        cmd,
        payload_len,
        payload: &frame[7..7 + INIT_PAYLOAD_MAX],
    }
}

/// Reads a 64-byte frame already known to be a continuation frame (high
/// bit of byte 4 clear).
pub fn parse_continuation(frame: &[u8; FRAME_LEN]) -> ContinuationPacket<'_> {
    debug_assert!(!is_init(frame[4]));
    let channel = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    let seq = frame[4];
    ContinuationPacket {
        channel,
        seq,
        payload: &frame[5..5 + CONT_PAYLOAD_MAX],
    }
}

/// Splits `payload` into the init-plus-continuation frame sequence a
/// response of that size requires, per §4.E: first frame carries up to 57
/// bytes tagged with `cmd` and the full payload length, every subsequent
/// frame carries up to 59 bytes tagged with an incrementing sequence
/// number starting at 0.
pub fn generate_response_frames(
    payload: &[u8],
    cmd: u8,
    channel: u32,
) -> Vec<[u8; FRAME_LEN], MAX_RESPONSE_FRAMES> {
    let mut frames = Vec::new();

    let mut first = [0u8; FRAME_LEN];
    first[0..4].copy_from_slice(&channel.to_be_bytes());
    first[4] = cmd;
    first[5..7].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    let first_len = core::cmp::min(INIT_PAYLOAD_MAX, payload.len());
    first[7..7 + first_len].copy_from_slice(&payload[..first_len]);
    let _ = frames.push(first);

    let mut offset = first_len;
    let mut seq: u8 = 0;
    while offset < payload.len() {
        let chunk_len = core::cmp::min(CONT_PAYLOAD_MAX, payload.len() - offset);
        let mut cont = [0u8; FRAME_LEN];
        cont[0..4].copy_from_slice(&channel.to_be_bytes());
        cont[4] = seq;
        cont[5..5 + chunk_len].copy_from_slice(&payload[offset..offset + chunk_len]);
        let _ = frames.push(cont);
        offset += chunk_len;
        seq += 1;
    }

    frames
}
