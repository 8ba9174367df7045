#![no_main]
use libfuzzer_sys::fuzz_target;
use prompt_shield::model::AnalysisRequest;
use prompt_shield::validator::Validator;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let validator = Validator::new(50_000);
        let request = AnalysisRequest::from_prompt(s);
        // Should never panic on any UTF-8 input, however malformed.
        let _ = validator.validate(&request);
    }
});
