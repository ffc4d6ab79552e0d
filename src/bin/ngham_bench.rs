//! Diagnostic self-check for the NGHam codec: encodes and decodes one
//! payload per size bucket, with and without injected byte errors, and
//! reports pass/fail for each — a quick bench to run after touching the
//! Reed-Solomon or scrambler tables.

use colored::*;
use obdh_core::config::{NGH_PAR_SIZE, NGH_PL_SIZE, NGH_PREAMBLE_LEN, NGH_SIZES, NGH_SYNC};
use obdh_core::ngham::{decode_frame, encode, PacketCondition};

fn main() {
    println!("{}", "NGHam codec bench".bright_blue().bold());
    println!("{}", "=================".bright_blue());

    let mut all_ok = true;
    for bucket in 0..NGH_SIZES {
        let payload: Vec<u8> = (0..NGH_PL_SIZE[bucket]).map(|i| (i % 256) as u8).collect();
        let clean_ok = run_case(bucket, &payload, 0);
        let max_correctable = NGH_PAR_SIZE[bucket] / 2;
        let corrected_ok = run_case(bucket, &payload, max_correctable);
        all_ok &= clean_ok && corrected_ok;
    }

    if all_ok {
        println!("{}", "all buckets passed".bright_green());
    } else {
        println!("{}", "one or more buckets failed".bright_red());
        std::process::exit(1);
    }
}

fn run_case(bucket: usize, payload: &[u8], flip_count: usize) -> bool {
    let mut frame = match encode(payload, 0) {
        Ok(frame) => frame,
        Err(e) => {
            println!("bucket {bucket}: encode failed: {e}");
            return false;
        }
    };

    let tag_start = NGH_PREAMBLE_LEN + NGH_SYNC.len();
    for i in 0..flip_count {
        let pos = tag_start + 3 + i * 7;
        if pos < frame.len() {
            frame[pos] ^= 0xFF;
        }
    }

    let tag = [frame[tag_start], frame[tag_start + 1], frame[tag_start + 2]];
    let codeword = &frame[tag_start + 3..];

    match decode_frame(tag, codeword) {
        PacketCondition::Ok { payload: decoded, errors, .. } => {
            let pass = decoded == payload;
            let label = format!("bucket {bucket} ({} bytes, {flip_count} flips)", payload.len());
            if pass {
                println!("{} {} ({errors} errors corrected)", "PASS".bright_green(), label);
            } else {
                println!("{} {} (payload mismatch)", "FAIL".bright_red(), label);
            }
            pass
        }
        other => {
            println!("{} bucket {bucket} ({flip_count} flips): {other:?}", "FAIL".bright_red());
            false
        }
    }
}
