//! FIDO U2F security token core: U2FHID USB-HID transport, U2F raw-message
//! (APDU) parsing and dispatch, and a deterministic Yubico-style
//! key-wrapping keyring.
//!
//! Supports `no_std`. USB device enumeration, report-descriptor
//! advertising, board bring-up, and persistent counter storage are left to
//! the board integration; this crate exposes the capability traits
//! (`counter::Counter`, `token::TokenHandler`) those pieces plug into.
#![no_std]

extern crate alloc;

pub mod apdu;
pub mod counter;
pub mod hid;
pub mod keyring;
pub mod token;
pub mod u2fhid;

mod log;

pub use counter::Counter;
pub use keyring::Keyring;
pub use token::Token;
pub use u2fhid::Handler;
