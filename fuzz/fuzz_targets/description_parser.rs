#![no_main]

use kdescgen::description::{format, format_stable, parse};
use kdescgen::diagnostics::Diagnostics;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut diags = Diagnostics::new();
    if let Some(desc) = parse(text, "fuzz.txt", &mut diags) {
        // Whatever parses must format into a fixed point.
        let once = format_stable(&desc, "fuzz.txt", &mut diags).expect("formatted output must parse");
        let reparsed = parse(&once, "fuzz.txt", &mut diags).expect("stable output must parse");
        assert_eq!(format(&reparsed), once);
    }
});
