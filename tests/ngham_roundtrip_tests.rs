use obdh_core::config::{NGH_PAR_SIZE, NGH_PL_SIZE, NGH_PREAMBLE_LEN, NGH_SIZES, NGH_SYNC};
use obdh_core::ngham::{decode_frame, encode, Decoder, PacketCondition};

fn split_frame(frame: &[u8]) -> ([u8; 3], &[u8]) {
    let tag_start = NGH_PREAMBLE_LEN + NGH_SYNC.len();
    let tag = [frame[tag_start], frame[tag_start + 1], frame[tag_start + 2]];
    (tag, &frame[tag_start + 3..])
}

#[test]
fn every_bucket_round_trips_clean() {
    for bucket in 0..NGH_SIZES {
        let payload: Vec<u8> = (0..NGH_PL_SIZE[bucket]).map(|i| (i * 7 % 256) as u8).collect();
        let frame = encode(&payload, 0).unwrap();
        let (tag, codeword) = split_frame(&frame);
        match decode_frame(tag, codeword) {
            PacketCondition::Ok { payload: decoded, errors, .. } => {
                assert_eq!(decoded, payload, "bucket {bucket} payload mismatch");
                assert_eq!(errors, 0, "bucket {bucket} should decode with no corrections");
            }
            other => panic!("bucket {bucket}: expected Ok, got {other:?}"),
        }
    }
}

#[test]
fn every_bucket_corrects_up_to_half_its_parity() {
    for bucket in 0..NGH_SIZES {
        let payload: Vec<u8> = (0..NGH_PL_SIZE[bucket]).map(|i| (i % 256) as u8).collect();
        let mut frame = encode(&payload, 0).unwrap();
        let (tag_start, max_correctable) = (NGH_PREAMBLE_LEN + NGH_SYNC.len(), NGH_PAR_SIZE[bucket] / 2);

        for i in 0..max_correctable {
            let pos = tag_start + 3 + i * 7;
            if pos < frame.len() {
                frame[pos] ^= 0xFF;
            }
        }

        let (tag, codeword) = split_frame(&frame);
        match decode_frame(tag, codeword) {
            PacketCondition::Ok { payload: decoded, .. } => assert_eq!(decoded, payload, "bucket {bucket}"),
            other => panic!("bucket {bucket}: expected correctable Ok, got {other:?}"),
        }
    }
}

#[test]
fn decoder_state_machine_drives_same_result_as_decode_frame() {
    let payload = vec![0x42; 60];
    let frame = encode(&payload, 3).unwrap();
    let (tag, codeword) = split_frame(&frame);

    let mut decoder = Decoder::new();
    let mut result = None;
    for byte in tag {
        assert!(decoder.push_byte(byte).is_none());
    }
    for &byte in codeword {
        if let Some(r) = decoder.push_byte(byte) {
            result = Some(r);
        }
    }

    match result.unwrap() {
        PacketCondition::Ok { payload: decoded, flags, .. } => {
            assert_eq!(decoded, payload);
            assert_eq!(flags, 3);
        }
        other => panic!("expected Ok, got {other:?}"),
    }
}

#[test]
fn decoder_flags_halfway_hook_partway_through_a_frame() {
    let payload = vec![0xAA; 92];
    let frame = encode(&payload, 0).unwrap();
    let (tag, codeword) = split_frame(&frame);

    let mut decoder = Decoder::new();
    for byte in tag {
        decoder.push_byte(byte);
    }
    assert!(!decoder.halfway_reached());
    for &byte in &codeword[..15] {
        decoder.push_byte(byte);
    }
    assert!(decoder.halfway_reached());
}

#[test]
fn size_tag_corner_case_is_recovered_within_tolerance() {
    let payload = vec![0x11; 28];
    let frame = encode(&payload, 0).unwrap();
    let (mut tag, codeword) = split_frame(&frame);

    // Flip bits up to the documented tolerance; the nearest bucket must still win.
    tag[2] ^= 0b0000_0111;

    match decode_frame(tag, codeword) {
        PacketCondition::Ok { payload: decoded, .. } => assert_eq!(decoded, payload),
        other => panic!("expected recovery within Hamming tolerance, got {other:?}"),
    }
}

#[test]
fn garbage_size_tag_prefails_without_touching_reed_solomon() {
    let payload = vec![0x11; 28];
    let frame = encode(&payload, 0).unwrap();
    let (_, codeword) = split_frame(&frame);

    let garbage_tag = [0x00, 0x00, 0x00];
    assert_eq!(decode_frame(garbage_tag, codeword), PacketCondition::PreFail);
}
