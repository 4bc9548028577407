#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // parsing and compiling must never panic
        if let Ok(f) = nexusquery::query::parse_filter_json(s) {
            let _ = f.compile();
        }
    }
});
