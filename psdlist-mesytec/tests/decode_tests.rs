#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::unreadable_literal,
    clippy::float_cmp
)]
use approx::assert_relative_eq;
use psdlist_core::event::split_words;
use psdlist_core::{BLOCK_SEPARATOR, CLOSING_SIGNATURE, HEADER_SEPARATOR};
use psdlist_mesytec::{
    ByteStream, CancellationToken, ChunkSplitter, DecoderConfig, Error, InstrumentConfig,
    ListmodeDecoder, Stage,
};

const MAGIC: &[u8] = b"mesytec psd listmode data\nrun 42\n";

// Helper to append a 48-bit value as three big-endian words, low word first
fn push_word48(out: &mut Vec<u8>, value: u64) {
    let (w1, w2, w3) = split_words(value);
    for w in [w1, w2, w3] {
        out.extend_from_slice(&w.to_be_bytes());
    }
}

// Helper to create a trigger record
fn trigger_word(trig_id: u64, data_id: u64, local_time: u64) -> u64 {
    (1 << 47) | (trig_id << 44) | (data_id << 40) | local_time
}

// Helper to create a chopper trigger on channel 1
fn chopper_word(local_time: u64) -> u64 {
    trigger_word(7, 0, local_time)
}

// Helper to create a neutron record
fn neutron_word(slot: u64, position: u64, local_time: u64) -> u64 {
    (slot << 39) | (position << 19) | local_time
}

// Helper to create a complete data block
fn make_block(device_id: u8, buffer_number: u16, timestamp: u64, events: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    let buffer_length = 21 + 3 * events.len() as u16;
    for w in [buffer_length, 1, 21, buffer_number, 7] {
        out.extend_from_slice(&w.to_be_bytes());
    }
    out.push(device_id);
    out.push(0);
    push_word48(&mut out, timestamp);
    out.extend_from_slice(&[0u8; 24]);
    for &e in events {
        push_word48(&mut out, e);
    }
    out.extend_from_slice(&BLOCK_SEPARATOR);
    out
}

// Helper to create a file from blocks
fn make_file(blocks: &[Vec<u8>], closing: bool) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    out.extend_from_slice(&HEADER_SEPARATOR);
    for block in blocks {
        out.extend_from_slice(block);
    }
    if closing {
        out.extend_from_slice(&CLOSING_SIGNATURE);
    }
    out
}

fn config() -> DecoderConfig {
    DecoderConfig::new().with_chopper_channel(1)
}

// A run with a chopper trigger every 10_000 ticks and neutrons spread
// over a handful of pixels.
fn make_run(block_count: u64) -> Vec<Vec<u8>> {
    (0..block_count)
        .map(|b| {
            let events: Vec<u64> = (0..40u64)
                .map(|i| {
                    if i % 10 == 0 {
                        chopper_word(i * 100)
                    } else {
                        neutron_word(i % 7, (i * 37 + b) % 1024, i * 100 + 5)
                    }
                })
                .collect();
            make_block((b % 4) as u8, b as u16, 10_000 + b * 4_000, &events)
        })
        .collect()
}

// Foreign trigger ending in `0000 FFFF` followed by a neutron starting with
// `5555 AAAA`: the pair spells out a block separator inside the payload.
const FOREIGN_SEPARATOR_HEAD: u64 = 0xFFFF_0000_1234;
const NEUTRON_SEPARATOR_TAIL: u64 = 0x0001_AAAA_5555;

fn make_separator_payload_run(block_count: u64) -> Vec<Vec<u8>> {
    (0..block_count)
        .map(|b| {
            let mut events = vec![chopper_word(10)];
            for _ in 0..10 {
                events.push(FOREIGN_SEPARATOR_HEAD);
                events.push(NEUTRON_SEPARATOR_TAIL);
            }
            make_block(0, b as u16, b * 1_000_000, &events)
        })
        .collect()
}

fn block_ends(body_start: usize, blocks: &[Vec<u8>]) -> Vec<usize> {
    blocks
        .iter()
        .scan(body_start, |end, block| {
            *end += block.len();
            Some(*end)
        })
        .collect()
}

#[test]
fn test_single_event_time_of_flight() {
    let block = make_block(0, 0, 1000, &[chopper_word(50), neutron_word(0, 42, 200)]);
    let data = make_file(&[block], true);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    let run = decoder.decode(&data).unwrap();

    assert_eq!(decoder.stage(), Stage::Done);
    assert_eq!(run.event_count(), 1);
    let events: Vec<(usize, f64)> = run.events().collect();
    assert_eq!(events[0].0, 42);
    assert_relative_eq!(events[0].1, 15.0);
    assert_eq!(run.statistics.trigger_events, 1);
    assert_eq!(run.statistics.neutron_events, 1);
}

#[test]
fn test_block_count_and_header() {
    for n in [0usize, 1, 5, 23] {
        let blocks: Vec<Vec<u8>> = (0..n)
            .map(|i| make_block(0, i as u16, i as u64 * 100, &[neutron_word(1, 2, 3)]))
            .collect();
        for closing in [false, true] {
            let data = make_file(&blocks, closing);
            let mut decoder =
                ListmodeDecoder::new(config().with_min_chunk_bytes(0).with_threads(Some(3)))
                    .unwrap();
            let run = decoder.decode(&data).unwrap();
            assert_eq!(run.statistics.blocks, n as u64, "n = {n}, closing = {closing}");
            assert_eq!(run.header.as_bytes(), MAGIC);
        }
    }
}

#[test]
fn test_out_of_range_pixel_is_counted() {
    let blocks = vec![
        make_block(0, 0, 0, &[chopper_word(1), neutron_word(3, 10, 20)]),
        make_block(4, 1, 100, &[neutron_word(0, 10, 20)]),
    ];
    let data = make_file(&blocks, false);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    let run = decoder.decode(&data).unwrap();

    assert_eq!(run.statistics.bad_pixel_events, 1);
    assert_eq!(run.event_count(), 1);
    assert_eq!(decoder.stage(), Stage::Done);
}

#[test]
fn test_separator_mismatch_fails_without_output() {
    let good = make_block(0, 0, 0, &[chopper_word(1), neutron_word(0, 1, 5)]);
    let mut bad = make_block(0, 1, 100, &[neutron_word(0, 1, 5)]);
    let len = bad.len();
    bad[len - 3] = 0x42;
    let data = make_file(&[good.clone(), bad, good], false);

    let mut decoder =
        ListmodeDecoder::new(config().with_min_chunk_bytes(0).with_threads(Some(2))).unwrap();
    let result = decoder.decode(&data);

    match result {
        Err(Error::Integrity { found, expected, .. }) => {
            assert_eq!(found[5], 0x42);
            assert_eq!(expected, BLOCK_SEPARATOR);
        }
        other => panic!("expected integrity error, got {other:?}"),
    }
    assert_eq!(decoder.stage(), Stage::CorruptBlock);
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut data = b"some other list-mode data".to_vec();
    data.extend_from_slice(&HEADER_SEPARATOR);
    data.extend(make_block(0, 0, 0, &[]));

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    let err = decoder.decode(&data).unwrap_err();
    assert!(matches!(err, Error::InvalidHeader(_)));
    assert!(err.to_string().contains("not a recognized list-mode file"));
    assert_eq!(decoder.stage(), Stage::HeaderInvalid);
}

#[test]
fn test_truncated_file_is_fatal() {
    let block = make_block(0, 0, 0, &[neutron_word(0, 1, 5), neutron_word(0, 2, 6)]);
    let mut data = make_file(&[block], false);
    data.truncate(data.len() - 10);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    assert!(matches!(decoder.decode(&data), Err(Error::Truncated { .. })));
    assert_eq!(decoder.stage(), Stage::Truncated);
}

#[test]
fn test_parallel_decode_matches_sequential() {
    let data = make_file(&make_run(64), true);

    let mut sequential = ListmodeDecoder::new(config().with_threads(Some(1))).unwrap();
    let expected = sequential.decode(&data).unwrap();
    assert_eq!(expected.statistics.chunks, 1);

    for threads in [2, 3, 8] {
        let mut parallel =
            ListmodeDecoder::new(config().with_threads(Some(threads)).with_min_chunk_bytes(0))
                .unwrap();
        let run = parallel.decode(&data).unwrap();

        // One chunk per pool thread at most.
        assert!(run.statistics.chunks > 1, "threads = {threads}");
        assert!(run.statistics.chunks <= threads as u64, "threads = {threads}");
        assert_eq!(run.tof, expected.tof);
        assert_eq!(run.statistics.blocks, 64);
        assert_eq!(run.statistics.neutron_events, expected.statistics.neutron_events);
        assert_eq!(run.statistics.trigger_events, expected.statistics.trigger_events);
    }
}

#[test]
fn test_parallel_decode_with_separator_bytes_in_payload() {
    let data = make_file(&make_separator_payload_run(40), true);
    let window = &data[MAGIC.len() + HEADER_SEPARATOR.len()..];
    assert!(window.windows(8).filter(|w| *w == BLOCK_SEPARATOR).count() > 40);

    let mut sequential = ListmodeDecoder::new(config().with_threads(Some(1))).unwrap();
    let expected = sequential.decode(&data).unwrap();
    assert_eq!(expected.event_count(), 400);
    assert_eq!(expected.statistics.foreign_triggers, 400);

    for threads in 2..=16 {
        let mut parallel =
            ListmodeDecoder::new(config().with_threads(Some(threads)).with_min_chunk_bytes(0))
                .unwrap();
        let run = parallel.decode(&data).unwrap();

        assert_eq!(run.tof, expected.tof, "threads = {threads}");
        assert_eq!(run.statistics.blocks, 40);
        assert_eq!(run.statistics.foreign_triggers, 400);
    }
}

#[test]
fn test_split_of_file_body_reproduces_input() {
    let body_start = MAGIC.len() + HEADER_SEPARATOR.len();

    for blocks in [make_run(20), make_separator_payload_run(30)] {
        let data = make_file(&blocks, false);
        let ends = block_ends(body_start, &blocks);

        for target in 1..=12 {
            let mut stream = ByteStream::new(&data);
            stream.skip(body_start);
            let chunks = ChunkSplitter::new(0).split(&mut stream, target);

            let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.to_vec()).collect();
            assert_eq!(joined, &data[body_start..]);
            for chunk in &chunks {
                let end = chunk.offset + chunk.len();
                assert!(ends.contains(&end), "target {target}: chunk ends inside a block at {end}");
            }
        }
    }
}

#[test]
fn test_pre_chopper_events() {
    // Neutron at 1100 precedes the only trigger at 1500.
    let block = make_block(
        0,
        0,
        1000,
        &[neutron_word(0, 9, 100), chopper_word(500), neutron_word(0, 9, 700)],
    );
    let data = make_file(&[block], false);

    let mut discard = ListmodeDecoder::new(config()).unwrap();
    let run = discard.decode(&data).unwrap();
    assert_eq!(run.tof[9].len(), 1);
    assert_relative_eq!(run.tof[9][0], 20.0);
    assert_eq!(run.statistics.pre_chopper_discarded, 1);

    let mut keep =
        ListmodeDecoder::new(config().with_discard_pre_chopper_events(false)).unwrap();
    let run = keep.decode(&data).unwrap();
    assert_eq!(run.tof[9].len(), 2);
    assert_relative_eq!(run.tof[9][0], 110.0);
    assert_relative_eq!(run.tof[9][1], 20.0);
}

#[test]
fn test_triggers_of_other_channels_are_ignored() {
    let block = make_block(
        0,
        0,
        0,
        &[
            chopper_word(100),
            trigger_word(7, 1, 300), // chopper channel 2
            neutron_word(0, 0, 400),
        ],
    );
    let data = make_file(&[block], false);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    let run = decoder.decode(&data).unwrap();
    assert_relative_eq!(run.tof[0][0], 30.0);
    assert_eq!(run.statistics.foreign_triggers, 1);

    let mut decoder = ListmodeDecoder::new(config().with_chopper_channel(2)).unwrap();
    let run = decoder.decode(&data).unwrap();
    assert_relative_eq!(run.tof[0][0], 10.0);
}

#[test]
fn test_chopper_channel_from_instrument() {
    let block = make_block(0, 0, 0, &[trigger_word(7, 2, 100), neutron_word(0, 0, 400)]);
    let data = make_file(&[block], false);

    let instrument = InstrumentConfig {
        chopper_channel: Some(3),
    };
    let mut decoder = ListmodeDecoder::with_instrument(DecoderConfig::new(), &instrument).unwrap();
    let run = decoder.decode(&data).unwrap();
    assert_relative_eq!(run.tof[0][0], 30.0);
}

#[test]
fn test_normalized_bin_boundaries() {
    // Neutron at 900 precedes the trigger at 1000 and is discarded.
    let block = make_block(
        0,
        0,
        900,
        &[
            neutron_word(0, 1, 0),
            chopper_word(100),
            neutron_word(0, 1, 200),
            neutron_word(0, 2, 350),
        ],
    );
    let data = make_file(&[block], false);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    assert_eq!(decoder.decode(&data).unwrap().bin_edges, None);

    let mut decoder =
        ListmodeDecoder::new(config().with_normalize_bin_boundaries(true)).unwrap();
    let run = decoder.decode(&data).unwrap();
    assert_eq!(run.statistics.pre_chopper_discarded, 1);
    assert_relative_eq!(run.tof[1][0], 10.0);
    let edges = run.bin_edges.unwrap();
    assert_relative_eq!(edges[0], 0.0);
    assert_relative_eq!(edges[1], 25.0);
}

#[test]
fn test_cancelled_decode_discards_output() {
    let data = make_file(&make_run(8), false);
    let token = CancellationToken::new();
    let mut decoder = ListmodeDecoder::new(config())
        .unwrap()
        .with_cancellation(token.clone());
    token.cancel();

    assert_eq!(decoder.decode(&data), Err(Error::Cancelled));
    assert_eq!(decoder.stage(), Stage::Cancelled);
}

#[test]
fn test_duplicate_events_are_kept() {
    let block = make_block(
        0,
        0,
        0,
        &[chopper_word(0), neutron_word(0, 3, 50), neutron_word(0, 3, 50)],
    );
    let data = make_file(&[block], false);

    let mut decoder = ListmodeDecoder::new(config()).unwrap();
    let run = decoder.decode(&data).unwrap();
    assert_eq!(run.tof[3], vec![5.0, 5.0]);
}
