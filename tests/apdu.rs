use u2f_token::apdu::{Command, ParseError, Request, StatusWord};

#[test]
fn version_query_parses_with_no_data_and_zero_ne() {
    let raw = [0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    let req = Request::parse(&raw).expect("well-formed version query");

    assert_eq!(req.command, Some(Command::Version));
    assert!(req.data.is_empty());
    assert_eq!(req.max_response_bytes, 0);
}

#[test]
fn register_request_carries_its_64_byte_payload() {
    let data = [0xABu8; 64];
    let mut raw = Vec::new();
    raw.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00]);
    raw.extend_from_slice(&(data.len() as u16).to_be_bytes());
    raw.extend_from_slice(&data);
    raw.extend_from_slice(&[0x01, 0x00]);

    let req = Request::parse(&raw).unwrap();
    assert_eq!(req.command, Some(Command::Register));
    assert_eq!(req.data, &data[..]);
    assert_eq!(req.max_response_bytes, 0x0100);
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(Request::parse(&[]), Err(ParseError::Empty)));
}

#[test]
fn nonzero_class_byte_is_bad_framing() {
    let raw = [0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert!(matches!(Request::parse(&raw), Err(ParseError::BadFraming)));
}

#[test]
fn truncated_trailer_is_bad_ne_length() {
    // Nc = 0, but only one trailing byte instead of two.
    let raw = [0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert!(matches!(Request::parse(&raw), Err(ParseError::BadNeLength)));
}

#[test]
fn response_serializes_data_then_status_word() {
    use u2f_token::apdu::Response;

    let ok = Response::ok(alloc_vec(b"U2F_V2"));
    assert_eq!(ok.serialize(), b"U2F_V2\x90\x00");

    let err = Response::error(StatusWord::WrongData);
    assert_eq!(err.serialize(), [0x6A, 0x80]);
}

fn alloc_vec(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec()
}
