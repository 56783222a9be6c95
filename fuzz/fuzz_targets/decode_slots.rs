#![no_main]

use honest_report::decode::decode_call;
use honest_report::slot::{ReportSlot, ReportSlotPayload};
use honest_report::tags::parse_meta;
use libfuzzer_sys::fuzz_target;

const SLOT_BYTES: usize = 17;

// Layout: [flags] [meta len] [meta ...] [slot: kind, 16 payload bytes]*
// Pointer payloads are arbitrary addresses; decoding must never fault.
fuzz_target!(|data: &[u8]| {
    let [flags, meta_len, rest @ ..] = data else {
        return;
    };
    let meta_len = (*meta_len as usize).min(rest.len());
    let (meta, slot_bytes) = rest.split_at(meta_len);
    let meta = parse_meta(&String::from_utf8_lossy(meta));

    let slots: Vec<ReportSlot> = slot_bytes
        .chunks_exact(SLOT_BYTES)
        .take(64)
        .map(|c| {
            let mut ext = [0u8; 16];
            ext.copy_from_slice(&c[1..]);
            ReportSlot {
                kind: u32::from(c[0] % 6),
                payload: ReportSlotPayload { ext },
            }
        })
        .collect();

    let is_return = flags & 1 != 0;
    let pointer_outputs = flags & 2 != 0;
    let a = decode_call(&meta, is_return, &slots, pointer_outputs);
    let b = decode_call(&meta, is_return, &slots, pointer_outputs);
    assert_eq!(a, b);
});
