//! Deterministic per-relying-party key derivation (Yubico-style key wrapping).
//!
//! A [`Keyring`] never stores a registered key pair. Everything needed to
//! recover it — the HMAC-derived scalar seed and the nonce that seeded it —
//! is folded into the 64-byte key handle minted at `register` time, and
//! replayed at `authenticate` time. See the module's `register`/
//! `authenticate` docs for the exact byte layout.

extern crate alloc;

use alloc::vec::Vec;

use crypto_bigint::{NonZero, U256};
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::ff::PrimeField;
use p256::{NonZeroScalar, PublicKey, Scalar, SecretKey};
use rand_core::{CryptoRng, RngCore};
use sha2::Sha256;

use crate::counter::Counter;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of a key handle: a 32-byte MAC followed by a 32-byte nonce.
pub const KEY_HANDLE_LEN: usize = 64;

/// The order of the NIST P-256 group, big-endian.
///
/// `crypto_bigint::U256::from_be_hex` is a const fn; this is the same
/// constant `elliptic::P256().Params().N` resolves to in Go.
const P256_ORDER: U256 =
    U256::from_be_hex("FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551");

/// An opaque 64-byte token minted at registration and presented at
/// authentication. `mac()` is the HMAC binding the nonce to the app_id and
/// derived scalar; `nonce()` is recoverable as the trailing 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyHandle([u8; KEY_HANDLE_LEN]);

impl KeyHandle {
    fn new(mac: &[u8], nonce: &[u8; 32]) -> Self {
        let mut bytes = [0u8; KEY_HANDLE_LEN];
        bytes[..32].copy_from_slice(mac);
        bytes[32..].copy_from_slice(nonce);
        Self(bytes)
    }

    /// The derivation nonce, recovered from the trailing 32 bytes.
    pub fn nonce(&self) -> &[u8] {
        &self.0[32..]
    }

    /// The HMAC binding this handle to its app_id and derived scalar.
    pub fn mac(&self) -> &[u8] {
        &self.0[..32]
    }

    pub fn as_bytes(&self) -> &[u8; KEY_HANDLE_LEN] {
        &self.0
    }
}

impl core::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("KeyHandle").field(&"<64 bytes>").finish()
    }
}

/// Error produced by a bytes slice that isn't exactly [`KEY_HANDLE_LEN`] long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyHandleTooShort;

impl<'a> TryFrom<&'a [u8]> for KeyHandle {
    type Error = KeyHandleTooShort;

    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        if bytes.len() < KEY_HANDLE_LEN {
            return Err(KeyHandleTooShort);
        }
        let mut out = [0u8; KEY_HANDLE_LEN];
        out.copy_from_slice(&bytes[..KEY_HANDLE_LEN]);
        Ok(KeyHandle(out))
    }
}

/// Everything that can go wrong deriving or exercising a relying-party key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringError<E> {
    /// The master secret held by the keyring is empty.
    MasterKeyEmpty,
    /// `app_id` passed to `register`/`authenticate` was empty.
    AppIdEmpty,
    /// The presented key handle is shorter than [`KEY_HANDLE_LEN`].
    KeyHandleTooShort,
    /// The counter collaborator failed to advance.
    Counter(E),
    /// ECDSA signing failed (practically unreachable: only a zero scalar
    /// triggers it, and the deterministic reduction never produces one).
    Signature,
}

impl<E> From<KeyHandleTooShort> for KeyringError<E> {
    fn from(_: KeyHandleTooShort) -> Self {
        KeyringError::KeyHandleTooShort
    }
}

/// Deterministically derives per-relying-party P-256 key pairs from a single
/// master secret, per the Yubico key-wrapping scheme.
///
/// Neither `master` nor `counter` is copied beyond what's needed to hold
/// them for the keyring's lifetime.
pub struct Keyring<C> {
    master: Vec<u8>,
    counter: C,
}

impl<C: Counter> Keyring<C> {
    pub fn new(master: Vec<u8>, counter: C) -> Self {
        Self { master, counter }
    }

    fn validate(&self) -> Result<(), KeyringError<C::Error>> {
        if self.master.is_empty() {
            return Err(KeyringError::MasterKeyEmpty);
        }
        Ok(())
    }

    /// A reference to the attached counter, for board glue that wants to
    /// poll user presence outside of an authenticate call.
    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    /// Derives the relying-party private scalar seed:
    /// `HMAC_SHA256(master, app_id || nonce)`.
    fn rp_priv_seed(&self, app_id: &[u8], nonce: &[u8; 32]) -> [u8; 32] {
        let mut mac =
            HmacSha256::new_from_slice(&self.master).expect("hmac accepts keys of any length");
        mac.update(app_id);
        mac.update(nonce);
        mac.finalize().into_bytes().into()
    }

    /// Register a deterministic key pair for `app_id`.
    ///
    /// If `nonce` is `None`, 32 fresh random bytes are drawn from `rng`.
    /// Returns the derived public key and the 64-byte key handle that
    /// recovers it.
    pub fn register<R: RngCore + CryptoRng>(
        &mut self,
        app_id: &[u8],
        nonce: Option<[u8; 32]>,
        rng: &mut R,
    ) -> Result<(PublicKey, KeyHandle), KeyringError<C::Error>> {
        self.validate()?;
        if app_id.is_empty() {
            return Err(KeyringError::AppIdEmpty);
        }

        let nonce = match nonce {
            Some(n) => n,
            None => {
                let mut n = [0u8; 32];
                rng.fill_bytes(&mut n);
                n
            }
        };

        let rp_priv = self.rp_priv_seed(app_id, &nonce);

        let mut kh_mac =
            HmacSha256::new_from_slice(&self.master).expect("hmac accepts keys of any length");
        kh_mac.update(app_id);
        kh_mac.update(&rp_priv);
        let kh_mac = kh_mac.finalize().into_bytes();

        let secret_key = derive_secret_key(&rp_priv);
        let public_key = secret_key.public_key();

        Ok((public_key, KeyHandle::new(&kh_mac, &nonce)))
    }

    /// Recomputes `register(app_id, Some(nonce)).1` for ownership checks,
    /// without touching the counter or drawing randomness.
    pub fn derive_key_handle(&self, app_id: &[u8], nonce: &[u8; 32]) -> KeyHandle {
        let rp_priv = self.rp_priv_seed(app_id, nonce);
        let mut kh_mac =
            HmacSha256::new_from_slice(&self.master).expect("hmac accepts keys of any length");
        kh_mac.update(app_id);
        kh_mac.update(&rp_priv);
        KeyHandle::new(&kh_mac.finalize().into_bytes(), nonce)
    }

    /// Produces a FIDO U2F authentication signature for `key_handle` over
    /// `app_id`/`challenge`, advancing the attached counter.
    pub fn authenticate<R: RngCore + CryptoRng>(
        &mut self,
        app_id: &[u8],
        challenge: &[u8],
        key_handle: &KeyHandle,
        user_presence: bool,
        rng: &mut R,
    ) -> Result<(Vec<u8>, u32), KeyringError<C::Error>> {
        self.validate()?;
        if app_id.is_empty() {
            return Err(KeyringError::AppIdEmpty);
        }

        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(key_handle.nonce());
        let rp_priv = self.rp_priv_seed(app_id, &nonce);
        let secret_key = derive_secret_key(&rp_priv);

        let count = self
            .counter
            .increment(app_id, challenge, key_handle.as_bytes())
            .map_err(KeyringError::Counter)?;

        let mut payload = Vec::with_capacity(app_id.len() + 1 + 4 + challenge.len());
        payload.extend_from_slice(app_id);
        payload.push(u8::from(user_presence));
        payload.extend_from_slice(&count.to_be_bytes());
        payload.extend_from_slice(challenge);

        let signing_key = SigningKey::from(&secret_key);
        let signature: Signature = signing_key.sign_with_rng(rng, &payload);
        let der = signature.to_der();

        Ok((der.as_bytes().to_vec(), count))
    }
}

/// Reduces a 32-byte HMAC output to a valid P-256 scalar via
/// `k = (seed mod (n-1)) + 1`, mirroring Go's adaptation of
/// `crypto/ecdsa.GenerateKey` to consume exactly 32 bytes of entropy rather
/// than the 40 bytes `ecdsa.GenerateKey` wants.
///
/// This reduction is mandatory for cross-implementation determinism: a
/// generic "generate a key" routine would consume excess entropy and break
/// reproducibility.
fn derive_secret_key(seed: &[u8; 32]) -> SecretKey {
    let order_minus_one = P256_ORDER.wrapping_sub(&U256::ONE);
    let modulus =
        NonZero::new(order_minus_one).expect("P-256 order minus one is nonzero by construction");

    let k = U256::from_be_slice(seed);
    let reduced = k.rem(&modulus);
    let scalar_int = reduced.wrapping_add(&U256::ONE);

    let scalar_bytes: [u8; 32] = scalar_int.to_be_bytes();
    let scalar = Scalar::from_repr(scalar_bytes.into())
        .into_option()
        .expect("scalar_int lies in [1, n-1] by construction");
    let nonzero = NonZeroScalar::new(scalar)
        .into_option()
        .expect("scalar_int is never zero by construction");

    SecretKey::from(nonzero)
}
