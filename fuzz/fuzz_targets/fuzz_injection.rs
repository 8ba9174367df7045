#![no_main]
use libfuzzer_sys::fuzz_target;
use prompt_shield::prelude::*;
use std::sync::OnceLock;

static SHIELD: OnceLock<PromptShield> = OnceLock::new();
static RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let shield = SHIELD.get_or_init(|| PromptShieldBuilder::new().build().unwrap());
        let rt = RUNTIME.get_or_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
        });

        // Should never panic, and should produce a consistent verdict for
        // identical input run twice.
        let first = rt.block_on(shield.analyze_prompt(s));
        let second = rt.block_on(shield.analyze_prompt(s));
        if let (Ok(a), Ok(b)) = (first, second) {
            assert_eq!(a.is_threat, b.is_threat, "non-deterministic verdict for identical input");
        }
    }
});
