use rand_core::SeedableRng;

use u2f_token::apdu::StatusWord;
use u2f_token::keyring::Keyring;
use u2f_token::token::{Token, TokenHandler};
use u2f_token::Counter;

#[derive(Default)]
struct TestCounter {
    count: u32,
    presence: bool,
}

impl Counter for TestCounter {
    type Error = core::convert::Infallible;

    fn increment(&mut self, _app_id: &[u8], _challenge: &[u8], _key_handle: &[u8]) -> Result<u32, Self::Error> {
        self.count += 1;
        Ok(self.count)
    }

    fn user_presence(&mut self) -> bool {
        self.presence
    }
}

fn rng() -> rand_chacha::ChaCha20Rng {
    rand_chacha::ChaCha20Rng::from_seed([9u8; 32])
}

fn build_token() -> Token<TestCounter, rand_chacha::ChaCha20Rng> {
    let attestation_key = p256::SecretKey::random(&mut rng());
    let key_pem = attestation_key
        .to_sec1_pem(pem_rfc7468::LineEnding::LF)
        .expect("valid SEC1 PEM");
    let cert_pem = pem_rfc7468::encode_string("CERTIFICATE", pem_rfc7468::LineEnding::LF, &[0xAB; 32])
        .expect("valid PEM envelope");

    let keyring = Keyring::new(b"a 32 byte master secret for tok!".to_vec(), TestCounter::default());
    Token::new(keyring, cert_pem.as_bytes(), key_pem.as_bytes(), rng()).expect("token construction")
}

fn version_request() -> Vec<u8> {
    vec![0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
}

fn register_request(challenge: &[u8; 32], app_id: &[u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(challenge);
    data.extend_from_slice(app_id);
    let mut raw = vec![0x00, 0x01, 0x00, 0x00, 0x00];
    raw.extend_from_slice(&64u16.to_be_bytes());
    raw.extend_from_slice(&data);
    raw.extend_from_slice(&[0x00, 0x00]);
    raw
}

fn authenticate_request(p1: u8, challenge: &[u8; 32], app_id: &[u8; 32], key_handle: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(65 + key_handle.len());
    data.extend_from_slice(challenge);
    data.extend_from_slice(app_id);
    data.push(key_handle.len() as u8);
    data.extend_from_slice(key_handle);
    let mut raw = vec![0x00, 0x02, p1, 0x00, 0x00];
    raw.extend_from_slice(&(data.len() as u16).to_be_bytes());
    raw.extend_from_slice(&data);
    raw.extend_from_slice(&[0x00, 0x00]);
    raw
}

/// Pulls the 64-byte key handle out of a successful Register response:
/// `0x05 || pub_bytes(65) || len(key_handle) || key_handle || cert || sig`.
fn key_handle_from_register_response(response: &[u8]) -> Vec<u8> {
    let kh_len = response[66] as usize;
    response[67..67 + kh_len].to_vec()
}

#[test]
fn version_request_returns_u2f_v2() {
    let mut token = build_token();
    let response = token.handle_message(&version_request());
    assert_eq!(&response[..6], b"U2F_V2");
    assert_eq!(&response[6..8], &StatusWord::NoError.to_be_bytes());
}

#[test]
fn register_without_user_presence_is_rejected() {
    let mut token = build_token();
    let challenge = [0x01u8; 32];
    let app_id = [0x02u8; 32];

    let response = token.handle_message(&register_request(&challenge, &app_id));
    assert_eq!(response, StatusWord::ConditionsNotSatisfied.to_be_bytes());
}

#[test]
fn register_builds_an_attested_response_when_present() {
    let mut token = build_token();
    token.counter_mut().presence = true;

    let challenge = [0x01u8; 32];
    let app_id = [0x02u8; 32];

    let response = token.handle_message(&register_request(&challenge, &app_id));
    assert_eq!(response[0], 0x05);
    assert_eq!(response[1], 0x04); // uncompressed SEC1 point marker
    let status = &response[response.len() - 2..];
    assert_eq!(status, &StatusWord::NoError.to_be_bytes());
}

#[test]
fn authenticate_with_key_handle_minted_for_a_different_app_id_is_wrong_data() {
    // spec §8 scenario 5: register under app_id_A, then authenticate with
    // app_id_B and the key handle from A.
    let mut token = build_token();
    token.counter_mut().presence = true;

    let app_id_a = [0xAAu8; 32];
    let app_id_b = [0xBBu8; 32];
    let register_challenge = [0x01u8; 32];

    let register_response = token.handle_message(&register_request(&register_challenge, &app_id_a));
    let key_handle = key_handle_from_register_response(&register_response);

    let auth_challenge = [0x02u8; 32];
    let response = token.handle_message(&authenticate_request(0x08, &auth_challenge, &app_id_b, &key_handle));

    assert_eq!(response, StatusWord::WrongData.to_be_bytes());
}

#[test]
fn authenticate_check_only_never_signs_even_with_presence() {
    let mut token = build_token();
    token.counter_mut().presence = true;

    let app_id = [0x03u8; 32];
    let register_challenge = [0x04u8; 32];
    let register_response = token.handle_message(&register_request(&register_challenge, &app_id));
    let key_handle = key_handle_from_register_response(&register_response);

    let auth_challenge = [0x05u8; 32];
    let response = token.handle_message(&authenticate_request(0x07, &auth_challenge, &app_id, &key_handle));

    assert_eq!(response, StatusWord::ConditionsNotSatisfied.to_be_bytes());
}

#[test]
fn authenticate_enforce_presence_is_rejected_without_it() {
    let mut token = build_token();
    token.counter_mut().presence = true;

    let app_id = [0x06u8; 32];
    let register_challenge = [0x07u8; 32];
    let register_response = token.handle_message(&register_request(&register_challenge, &app_id));
    let key_handle = key_handle_from_register_response(&register_response);

    token.counter_mut().presence = false;
    let auth_challenge = [0x08u8; 32];
    let response = token.handle_message(&authenticate_request(0x03, &auth_challenge, &app_id, &key_handle));

    assert_eq!(response, StatusWord::ConditionsNotSatisfied.to_be_bytes());
}

#[test]
fn authenticate_round_trips_a_verifiable_signature() {
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::{Signature, VerifyingKey};
    use p256::EncodedPoint;

    let mut token = build_token();
    token.counter_mut().presence = true;

    let app_id = [0x09u8; 32];
    let register_challenge = [0x0Au8; 32];
    let register_response = token.handle_message(&register_request(&register_challenge, &app_id));
    let public_key_bytes = &register_response[1..66];
    let key_handle = key_handle_from_register_response(&register_response);

    let auth_challenge = [0x0Bu8; 32];
    let response = token.handle_message(&authenticate_request(0x03, &auth_challenge, &app_id, &key_handle));

    assert_eq!(&response[response.len() - 2..], &StatusWord::NoError.to_be_bytes());
    let user_presence_byte = response[0];
    let counter = u32::from_be_bytes(response[1..5].try_into().unwrap());
    let sig_der = &response[5..response.len() - 2];

    let mut payload = Vec::new();
    payload.extend_from_slice(&app_id);
    payload.push(user_presence_byte);
    payload.extend_from_slice(&counter.to_be_bytes());
    payload.extend_from_slice(&auth_challenge);

    let encoded_point = EncodedPoint::from_bytes(public_key_bytes).expect("valid SEC1 point");
    let verifying_key = VerifyingKey::from_encoded_point(&encoded_point).expect("valid public key");
    let signature = Signature::from_der(sig_der).expect("valid DER signature");
    verifying_key
        .verify(&payload, &signature)
        .expect("authenticate signature must verify against the registered public key");
}
