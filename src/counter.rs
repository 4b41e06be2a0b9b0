//! The monotonic signing counter and user-presence probe.
//!
//! Neither is implemented by this crate: a real counter needs to survive
//! power loss, and user presence needs a button or capacitive pad wired to
//! actual hardware. Both are supplied by the board integration.

/// A monotonic counter plus a user-presence probe, as required by the FIDO
/// U2F raw message spec.
///
/// Implementors must guarantee that `increment` never returns the same
/// value twice and never regresses across a crash or power cycle — cloned
/// tokens are detected by the relying party noticing the counter go
/// backwards, so persistence on every call is strongly recommended.
pub trait Counter {
    /// Error type surfaced back through [`crate::keyring::Keyring::authenticate`].
    type Error;

    /// Advance and return the counter associated with this (app_id,
    /// challenge, key_handle) authentication.
    ///
    /// The value must be non-zero after the first call and strictly
    /// increasing thereafter.
    fn increment(
        &mut self,
        app_id: &[u8],
        challenge: &[u8],
        key_handle: &[u8],
    ) -> Result<u32, Self::Error>;

    /// Returns whether a human has confirmed presence for the operation in
    /// progress (button press, capacitive touch, ...).
    fn user_presence(&mut self) -> bool;
}
