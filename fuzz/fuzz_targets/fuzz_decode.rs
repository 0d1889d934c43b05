#![no_main]

use libfuzzer_sys::fuzz_target;
use refnum::codec::CodeEncoder;

fuzz_target!(|data: &[u8]| {
    let encoder = CodeEncoder::new();
    let input = String::from_utf8_lossy(data);

    // Anything that decodes must encode back to the same code, modulo case.
    if let Ok(seed) = encoder.decode(&input) {
        assert!(seed < CodeEncoder::CAPACITY);
        let code = encoder.encode(seed).expect("decoded seed is within capacity");
        assert_eq!(code, input.to_ascii_uppercase());
    }
});
