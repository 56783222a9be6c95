#![no_main]

use honest_report::tags::{encode_meta, parse_meta, TypeTag};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > 64 * 1024 {
        &data[..64 * 1024]
    } else {
        data
    };

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let meta = parse_meta(text);
    for t in &meta.types {
        let _ = TypeTag::parse(t);
    }
    let _ = meta.return_type();
    let _ = meta.return_site_params();

    let again = parse_meta(&encode_meta(&meta.name, &meta.types));
    assert_eq!(again, meta);
});
