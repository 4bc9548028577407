#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = nexusquery::normalize::infer_text(s);
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(s) {
            let _ = nexusquery::normalize::normalize(&v, false);
        }
    }
});
