//! U2F message dispatch: Register, Authenticate, Version, and the
//! attestation signature that binds a fresh registration to this device.

extern crate alloc;

use alloc::vec::Vec;

use p256::ecdsa::signature::RandomizedSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::SecretKey;
use rand_core::{CryptoRng, RngCore};

use crate::apdu::{Command, Request, Response, StatusWord};
use crate::counter::Counter;
use crate::keyring::{KeyHandle, Keyring, KeyringError, KEY_HANDLE_LEN};
use crate::log::{trace, warn};

/// A capability the U2FHID handler feeds reassembled MSG payloads to.
/// Implemented by [`Token`]; kept as a trait so the handler doesn't need
/// to know about APDUs or attestation at all.
pub trait TokenHandler {
    fn handle_message(&mut self, frame_bytes: &[u8]) -> Vec<u8>;
}

/// Failure constructing a [`Token`] from its PEM-encoded attestation
/// material.
#[derive(Debug)]
pub enum TokenError {
    CertPem(pem_rfc7468::Error),
    KeyPemUtf8(core::str::Utf8Error),
    KeyPem(p256::elliptic_curve::Error),
}

/// Dispatches U2F raw-message requests against a [`Keyring`], attesting
/// fresh registrations with a long-lived certificate and private key.
///
/// `R` is the RNG used both for nonce generation (delegated to the
/// keyring) and for the per-signature ECDSA nonce on attestation
/// signatures.
pub struct Token<C, R> {
    keyring: Keyring<C>,
    attestation_cert_der: Vec<u8>,
    attestation_key: SecretKey,
    rng: R,
}

impl<C: Counter, R: RngCore + CryptoRng> Token<C, R> {
    /// Exposes the attached counter so board glue (or tests) can poll or
    /// drive user presence outside of a dispatched request.
    pub fn counter_mut(&mut self) -> &mut C {
        self.keyring.counter_mut()
    }

    /// Decodes the PEM-wrapped attestation certificate (any label) and the
    /// SEC1 `EC PRIVATE KEY` PEM, retaining the certificate's raw DER bytes
    /// and the parsed private key.
    pub fn new(
        keyring: Keyring<C>,
        attestation_cert_pem: &[u8],
        attestation_key_pem: &[u8],
        rng: R,
    ) -> Result<Self, TokenError> {
        let (_label, attestation_cert_der) =
            pem_rfc7468::decode_vec(attestation_cert_pem).map_err(TokenError::CertPem)?;

        let key_pem_str =
            core::str::from_utf8(attestation_key_pem).map_err(TokenError::KeyPemUtf8)?;
        let attestation_key =
            SecretKey::from_sec1_pem(key_pem_str).map_err(TokenError::KeyPem)?;

        Ok(Token {
            keyring,
            attestation_cert_der,
            attestation_key,
            rng,
        })
    }

    /// `Register`: require a fresh-nonce 64-byte payload and user presence,
    /// mint a new keyring entry, and attest it with the device's private
    /// key.
    fn handle_register(&mut self, req: &Request) -> Result<Vec<u8>, StatusWord> {
        if req.data.len() != 64 {
            return Err(StatusWord::WrongLength);
        }
        if !self.keyring.counter_mut().user_presence() {
            return Err(StatusWord::ConditionsNotSatisfied);
        }

        let challenge = &req.data[0..32];
        let app_id = &req.data[32..64];

        let (public_key, key_handle) = self
            .keyring
            .register(app_id, None, &mut self.rng)
            .map_err(keyring_error_to_status)?;

        let encoded_point = public_key.to_encoded_point(false);
        let pub_bytes = encoded_point.as_bytes();

        let mut sig_payload = Vec::with_capacity(
            1 + app_id.len() + challenge.len() + KEY_HANDLE_LEN + pub_bytes.len(),
        );
        sig_payload.push(0x00);
        sig_payload.extend_from_slice(app_id);
        sig_payload.extend_from_slice(challenge);
        sig_payload.extend_from_slice(key_handle.as_bytes());
        sig_payload.extend_from_slice(pub_bytes);

        let signing_key = SigningKey::from(&self.attestation_key);
        let signature: Signature = signing_key.sign_with_rng(&mut self.rng, &sig_payload);
        let sig_der = signature.to_der();

        let mut data = Vec::with_capacity(
            1 + pub_bytes.len()
                + 1
                + KEY_HANDLE_LEN
                + self.attestation_cert_der.len()
                + sig_der.as_bytes().len(),
        );
        data.push(0x05);
        data.extend_from_slice(pub_bytes);
        data.push(KEY_HANDLE_LEN as u8);
        data.extend_from_slice(key_handle.as_bytes());
        data.extend_from_slice(&self.attestation_cert_der);
        data.extend_from_slice(sig_der.as_bytes());

        Ok(data)
    }

    /// `Authenticate`: recovers the key handle's nonce, re-derives it from
    /// `app_id` to confirm ownership (the ownership check the original
    /// source skips), then signs per the control-byte semantics.
    fn handle_authenticate(&mut self, req: &Request) -> Result<Vec<u8>, StatusWord> {
        if req.data.len() < 65 {
            return Err(StatusWord::WrongLength);
        }

        let challenge = &req.data[0..32];
        let app_id = &req.data[32..64];
        let kh_len = req.data[64] as usize;
        if req.data.len() != 65 + kh_len {
            return Err(StatusWord::WrongLength);
        }
        let key_handle =
            KeyHandle::try_from(&req.data[65..65 + kh_len]).map_err(|_| StatusWord::WrongData)?;

        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(key_handle.nonce());
        let derived = self.keyring.derive_key_handle(app_id, &nonce);
        if derived.as_bytes() != key_handle.as_bytes() {
            return Err(StatusWord::WrongData);
        }

        let up = self.keyring.counter_mut().user_presence();

        match req.p1 {
            0x07 => return Err(StatusWord::ConditionsNotSatisfied),
            0x03 => {
                if !up {
                    return Err(StatusWord::ConditionsNotSatisfied);
                }
            }
            0x08 => {}
            _ => return Err(StatusWord::ConditionsNotSatisfied),
        }

        let (signature, count) = self
            .keyring
            .authenticate(app_id, challenge, &key_handle, up, &mut self.rng)
            .map_err(keyring_error_to_status)?;

        let mut data = Vec::with_capacity(1 + 4 + signature.len());
        data.push(u8::from(up));
        data.extend_from_slice(&count.to_be_bytes());
        data.extend_from_slice(&signature);
        Ok(data)
    }
}

fn keyring_error_to_status<E>(err: KeyringError<E>) -> StatusWord {
    match err {
        KeyringError::MasterKeyEmpty => StatusWord::ConditionsNotSatisfied,
        KeyringError::AppIdEmpty => StatusWord::WrongData,
        KeyringError::KeyHandleTooShort => StatusWord::WrongData,
        KeyringError::Counter(_) => StatusWord::ConditionsNotSatisfied,
        KeyringError::Signature => StatusWord::ConditionsNotSatisfied,
    }
}

impl<C: Counter, R: RngCore + CryptoRng> TokenHandler for Token<C, R> {
    fn handle_message(&mut self, frame_bytes: &[u8]) -> Vec<u8> {
        let req = match Request::parse(frame_bytes) {
            Ok(r) => r,
            Err(_) => return Response::error(StatusWord::ConditionsNotSatisfied).serialize(),
        };

        let result = match req.command {
            Some(Command::Version) => {
                trace!("u2f: received request: version");
                Ok(b"U2F_V2".to_vec())
            }
            Some(Command::Register) => {
                trace!("u2f: received request: register");
                self.handle_register(&req)
            }
            Some(Command::Authenticate) => {
                trace!("u2f: received request: authenticate p1={}", req.p1);
                self.handle_authenticate(&req)
            }
            None => {
                warn!("u2f: received request: unknown ins={}", frame_bytes.get(1).copied().unwrap_or(0));
                Err(StatusWord::ConditionsNotSatisfied)
            }
        };

        match result {
            Ok(data) => Response::ok(data).serialize(),
            Err(status) => Response::error(status).serialize(),
        }
    }
}
