//! The U2FHID channel/session state machine: fragmentation, reassembly,
//! sequence discipline and command dispatch.

use heapless::{FnvIndexMap, Vec};
use rand_core::{CryptoRng, RngCore};

use crate::log::{trace, warn};
use crate::token::TokenHandler;

use super::errors::{build_error_frame, ErrorCode};
use super::packets::{generate_response_frames, parse_continuation, parse_init};
use super::types::{
    command, is_init, BROADCAST_CHANNEL, CONT_PAYLOAD_MAX, FRAME_LEN, INIT_PAYLOAD_MAX,
    MAX_MESSAGE_LEN, MAX_RESPONSE_FRAMES, SESSION_CAPACITY,
};

/// Protocol version bytes the INIT response advertises. Pinned to the
/// values a U2FHID client expects, not the originating board's own
/// firmware version numbers.
const PROTOCOL_VERSION: u8 = 2;
const DEVICE_VERSION_MAJOR: u8 = 1;
const DEVICE_VERSION_MINOR: u8 = 0;
const DEVICE_VERSION_BUILD: u8 = 0;
const CAPABILITIES: u8 = 0x00;

/// Per-channel reassembly state (§3 Session).
struct Session {
    command: u8,
    expected_total: u16,
    buffer: Vec<u8, MAX_MESSAGE_LEN>,
    remaining: usize,
    last_sequence: u8,
    zero_seen: bool,
}

impl Session {
    fn fresh(command: u8, expected_total: u16) -> Self {
        Session {
            command,
            expected_total,
            buffer: Vec::new(),
            remaining: expected_total as usize,
            last_sequence: 0,
            zero_seen: false,
        }
    }
}

/// The channel/session state machine described in §3 and §4.F. Generic
/// over the token dispatch capability (`T`) and the RNG used to mint
/// channel ids on INIT (`R`) so board glue supplies both.
pub struct Handler<T, R> {
    token: T,
    rng: R,
    sessions: FnvIndexMap<u32, Session, SESSION_CAPACITY>,
    outbound: Vec<[u8; FRAME_LEN], MAX_RESPONSE_FRAMES>,
    outbound_index: usize,
    accumulating: bool,
    last_channel_id: u32,
}

impl<T, R> Handler<T, R>
where
    T: TokenHandler,
    R: RngCore + CryptoRng,
{
    pub fn new(token: T, rng: R) -> Self {
        Handler {
            token,
            rng,
            sessions: FnvIndexMap::new(),
            outbound: Vec::new(),
            outbound_index: 0,
            accumulating: false,
            last_channel_id: 0,
        }
    }

    /// A complete 64-byte HID output report arrived.
    pub fn on_rx(&mut self, frame: &[u8]) {
        let frame: &[u8; FRAME_LEN] = match frame.try_into() {
            Ok(f) => f,
            Err(_) => {
                self.clear_all();
                return;
            }
        };

        if is_init(frame[4]) {
            self.on_init_frame(frame);
        } else {
            self.on_continuation_frame(frame);
        }
    }

    /// The host is polling for the next 64-byte HID input report.
    pub fn on_tx(&mut self) -> Option<[u8; FRAME_LEN]> {
        if self.outbound.is_empty() || self.accumulating {
            return None;
        }

        let frame = self.outbound[self.outbound_index];
        self.outbound_index += 1;

        if self.outbound_index >= self.outbound.len() {
            self.sessions.remove(&self.last_channel_id);
            self.outbound.clear();
            self.outbound_index = 0;
            self.last_channel_id = 0;
        }

        Some(frame)
    }

    fn on_init_frame(&mut self, frame: &[u8; FRAME_LEN]) {
        let ip = parse_init(frame);

        let first_chunk = core::cmp::min(INIT_PAYLOAD_MAX, ip.payload_len as usize);
        let mut session = Session::fresh(ip.cmd, ip.payload_len);
        let _ = session.buffer.extend_from_slice(&ip.payload[..first_chunk]);
        session.remaining = ip.payload_len as usize - first_chunk;

        let dispatch_now = session.remaining == 0;

        // `insert` only fails when the map is already at SESSION_CAPACITY
        // and `ip.channel` isn't one of the existing keys (a reused channel
        // always succeeds, since it replaces its own entry in place).
        if self.sessions.insert(ip.channel, session).is_err() {
            warn!(
                "u2fhid: channel {} rejected, {} sessions already open",
                ip.channel, SESSION_CAPACITY
            );
            self.emit_error(ip.channel, ErrorCode::ChannelBusy);
            return;
        }

        if dispatch_now {
            self.dispatch(ip.channel);
        } else {
            self.accumulating = true;
        }
    }

    fn on_continuation_frame(&mut self, frame: &[u8; FRAME_LEN]) {
        let cp = parse_continuation(frame);

        let (zero_seen, last_sequence) = match self.sessions.get(&cp.channel) {
            Some(s) => (s.zero_seen, s.last_sequence),
            None => {
                self.emit_error(cp.channel, ErrorCode::InvalidCid);
                return;
            }
        };

        let seq_ok = if !zero_seen {
            cp.seq == 0
        } else {
            cp.seq == last_sequence + 1
        };
        if !seq_ok {
            self.sessions.remove(&cp.channel);
            self.emit_error(cp.channel, ErrorCode::InvalidSeq);
            return;
        }

        let dispatch_now = {
            let session = self
                .sessions
                .get_mut(&cp.channel)
                .expect("checked above");
            session.zero_seen = true;
            session.last_sequence = cp.seq;

            let take = core::cmp::min(CONT_PAYLOAD_MAX, session.remaining);
            let _ = session.buffer.extend_from_slice(&cp.payload[..take]);
            session.remaining -= take;

            (session.buffer.len() as u16) >= session.expected_total
        };

        if dispatch_now {
            self.dispatch(cp.channel);
        }
    }

    fn dispatch(&mut self, channel: u32) {
        self.accumulating = false;
        self.last_channel_id = channel;

        let session_command = {
            let session = self.sessions.get(&channel).expect("dispatch needs a session");
            session.command
        };

        let frames = match session_command {
            command::INIT => {
                trace!("u2fhid: dispatching INIT on channel {}", channel);
                self.build_init_response(channel)
            }
            command::PING => {
                trace!("u2fhid: dispatching PING on channel {}", channel);
                let session = self.sessions.get(&channel).expect("dispatch needs a session");
                generate_response_frames(&session.buffer, command::PING, channel)
            }
            command::MSG => {
                trace!("u2fhid: dispatching MSG on channel {}", channel);
                let buffer = self
                    .sessions
                    .get(&channel)
                    .expect("dispatch needs a session")
                    .buffer
                    .clone();
                let response = self.token.handle_message(&buffer);
                generate_response_frames(&response, command::MSG, channel)
            }
            other => {
                warn!(
                    "u2fhid: unrecognized command {} on channel {}",
                    other, channel
                );
                self.outbound.clear();
                let _ = self
                    .outbound
                    .push(build_error_frame(channel, ErrorCode::InvalidCmd));
                self.outbound_index = 0;
                return;
            }
        };

        self.outbound = frames;
        self.outbound_index = 0;
    }

    fn build_init_response(&mut self, channel: u32) -> Vec<[u8; FRAME_LEN], MAX_RESPONSE_FRAMES> {
        if channel != BROADCAST_CHANNEL {
            let mut v = Vec::new();
            let _ = v.push(build_error_frame(channel, ErrorCode::Other));
            return v;
        }

        let nonce = {
            let session = self.sessions.get(&channel).expect("dispatch needs a session");
            let mut n = [0u8; 8];
            let take = 8.min(session.buffer.len());
            n[..take].copy_from_slice(&session.buffer[..take]);
            n
        };

        let mut assigned = [0u8; 4];
        loop {
            self.rng.fill_bytes(&mut assigned);
            let candidate = u32::from_be_bytes(assigned);
            if candidate != 0 && candidate != BROADCAST_CHANNEL {
                break;
            }
        }

        let mut payload = [0u8; 17];
        payload[0..8].copy_from_slice(&nonce);
        payload[8..12].copy_from_slice(&assigned);
        payload[12] = PROTOCOL_VERSION;
        payload[13] = DEVICE_VERSION_MAJOR;
        payload[14] = DEVICE_VERSION_MINOR;
        payload[15] = DEVICE_VERSION_BUILD;
        payload[16] = CAPABILITIES;

        generate_response_frames(&payload, command::INIT, BROADCAST_CHANNEL)
    }

    fn emit_error(&mut self, channel: u32, code: ErrorCode) {
        warn!(
            "u2fhid: emitting error code {} on channel {}",
            code.as_u8(),
            channel
        );
        self.accumulating = false;
        self.outbound.clear();
        let _ = self.outbound.push(build_error_frame(channel, code));
        self.outbound_index = 0;
        self.last_channel_id = channel;
    }

    fn clear_all(&mut self) {
        self.sessions.clear();
        self.outbound.clear();
        self.outbound_index = 0;
        self.accumulating = false;
        self.last_channel_id = 0;
    }
}
