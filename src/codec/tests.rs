//! Unit tests for the little-endian message codec.

use bytes::Bytes;
use proptest::prelude::*;
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn codec() -> LittleEndianCodec { LittleEndianCodec::default() }

#[rstest]
fn encodes_fixed_header(codec: LittleEndianCodec) {
    let bytes = codec
        .encode(&Message::new(0x0102_0304, "ping"))
        .expect("encode should succeed");

    assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(&bytes[4..8], &[4, 0, 0, 0]);
    assert_eq!(&bytes[8..], b"ping");
}

#[rstest]
fn empty_body_is_header_only(codec: LittleEndianCodec) {
    let bytes = codec.encode(&Message::new(7, Bytes::new())).expect("encode");
    assert_eq!(bytes.len(), HEADER_LEN);
    assert_eq!(codec.decode(bytes).expect("decode"), Message::new(7, Bytes::new()));
}

#[rstest]
#[case(vec![], 0)]
#[case(vec![1, 0, 0, 0, 0, 0, 0], 7)]
fn short_header_is_rejected(codec: LittleEndianCodec, #[case] frame: Vec<u8>, #[case] have: usize) {
    assert_eq!(
        codec.decode(Bytes::from(frame)),
        Err(CodecError::HeaderTooShort {
            have,
            need: HEADER_LEN
        })
    );
}

#[rstest]
#[case(vec![1, 0, 0, 0, 3, 0, 0, 0, b'a', b'b'], 3, 2)]
#[case(vec![1, 0, 0, 0, 1, 0, 0, 0, b'a', b'b'], 1, 2)]
fn size_mismatch_is_rejected(
    codec: LittleEndianCodec,
    #[case] frame: Vec<u8>,
    #[case] declared: usize,
    #[case] actual: usize,
) {
    assert_eq!(
        codec.decode(Bytes::from(frame)),
        Err(CodecError::SizeMismatch { declared, actual })
    );
}

#[test]
fn oversized_body_is_rejected() {
    let codec = LittleEndianCodec::new(Some(2));
    let frame = LittleEndianCodec::default()
        .encode(&Message::new(1, "abc"))
        .expect("encode");

    assert_eq!(
        codec.decode(frame),
        Err(CodecError::Oversized { size: 3, max: 2 })
    );
}

#[test]
fn body_at_limit_is_accepted() {
    let codec = LittleEndianCodec::new(Some(2));
    let frame = codec.encode(&Message::new(1, "ab")).expect("encode");
    assert_eq!(codec.decode(frame).expect("decode").body().as_ref(), b"ab");
}

proptest! {
    #[test]
    fn decode_inverts_encode(event in any::<u32>(), body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let codec = LittleEndianCodec::default();
        let message = Message::new(event, body);
        let bytes = codec.encode(&message).expect("encode");
        prop_assert_eq!(bytes.len(), HEADER_LEN + message.body_size());
        prop_assert_eq!(codec.decode(bytes).expect("decode"), message);
    }
}
