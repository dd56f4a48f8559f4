//! Property tests: reassembly is independent of how the stream is chunked.

use eventwire::{
    LittleEndianCodec,
    Message,
    MessageCodec,
    frame::{Endianness, FrameConfig, FrameReassembler},
};
use eventwire_testing::{chunk_at, encode_messages};
use proptest::prelude::*;

fn message_strategy() -> impl Strategy<Value = Message> {
    (any::<u32>(), proptest::collection::vec(any::<u8>(), 0..64))
        .prop_map(|(event, body)| Message::new(event, body))
}

fn reassemble(config: FrameConfig, chunks: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let mut reassembler = FrameReassembler::new(config).expect("valid config");
    let mut frames = Vec::new();
    for chunk in chunks {
        let feed = reassembler.feed(chunk).into_result().expect("well-formed stream");
        assert!(feed.discarded.is_empty());
        frames.extend(feed.frames.into_iter().map(|f| f.to_vec()));
    }
    assert_eq!(reassembler.buffered(), 0, "no trailing partial frame");
    frames
}

proptest! {
    #[test]
    fn chunking_does_not_change_messages(
        messages in proptest::collection::vec(message_strategy(), 1..12),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..24),
    ) {
        let stream = encode_messages(&messages);
        let cuts: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();
        let codec = LittleEndianCodec::default();

        let decoded: Vec<Message> = reassemble(FrameConfig::default(), &chunk_at(&stream, &cuts))
            .into_iter()
            .map(|frame| codec.decode(frame.into()).expect("decodes"))
            .collect();

        prop_assert_eq!(decoded, messages);
    }

    #[test]
    fn stripped_big_endian_prefix_yields_payloads(
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 1..8),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
    ) {
        let config = FrameConfig {
            byte_order: Endianness::Big,
            length_field_offset: 0,
            length_field_length: 2,
            initial_bytes_to_strip: 2,
            ..FrameConfig::default()
        };
        let stream: Vec<u8> = payloads
            .iter()
            .flat_map(|p| {
                let len = u16::try_from(p.len()).expect("payload fits u16");
                len.to_be_bytes().into_iter().chain(p.iter().copied())
            })
            .collect();
        let cuts: Vec<usize> = cuts.iter().map(|i| i.index(stream.len() + 1)).collect();

        prop_assert_eq!(reassemble(config, &chunk_at(&stream, &cuts)), payloads);
    }
}

#[test]
fn oversized_frame_between_valid_ones_is_skipped() {
    let config = FrameConfig {
        max_frame_length: 32,
        ..FrameConfig::default()
    };
    let stream = encode_messages(&[
        Message::new(1, "before"),
        Message::new(2, vec![7u8; 100]),
        Message::new(3, "after"),
    ]);
    let mut reassembler = FrameReassembler::new(config).expect("valid config");
    let codec = LittleEndianCodec::default();

    let mut events = Vec::new();
    let mut discarded = 0;
    for chunk in stream.chunks(5) {
        let feed = reassembler.feed(chunk).into_result().expect("recoverable");
        discarded += feed.discarded.len();
        for frame in feed.frames {
            events.push(codec.decode(frame).expect("decodes").event());
        }
    }

    assert_eq!(events, [1, 3]);
    assert_eq!(discarded, 1);
}
