#![no_main]

use data_client_emulator::filter::like_match;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    // First line is the pattern, the rest is the subject.
    let (pattern, text) = s.split_once('\n').unwrap_or((s, ""));
    let _ = like_match(pattern, text, false);
    let _ = like_match(pattern, text, true);

    // Every text matches itself once LIKE metacharacters are escaped.
    let escaped: String = text
        .chars()
        .flat_map(|c| match c {
            '%' | '_' | '\\' => vec!['\\', c],
            other => vec![other],
        })
        .collect();
    assert!(like_match(&escaped, text, false));
    // A lone `%` matches everything.
    assert!(like_match("%", text, false));
});
