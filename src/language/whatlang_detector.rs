//! Reference [`LanguageDetector`] backed by the `whatlang` crate.

use super::{LanguageDetectionResult, LanguageDetector};

/// Detects language using `whatlang`'s n-gram based classifier.
///
/// `whatlang` reports its own confidence (`0.0..=1.0`) and a reliability
/// flag derived from how decisively the top candidate beat the runner-up;
/// both are surfaced verbatim into [`LanguageDetectionResult`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> LanguageDetectionResult {
        let Some(info) = whatlang::detect(text) else {
            return LanguageDetectionResult::undetermined();
        };

        LanguageDetectionResult {
            code: iso_639_1(info.lang()).to_string(),
            script: iso_15924_script(info.script()),
            confidence: info.confidence(),
            reliable: info.is_reliable(),
        }
    }
}

/// Map `whatlang`'s ISO-639-3 language enum to an ISO-639-1 two-letter
/// code, per §3's data model (`SupportedLanguages` is expressed in
/// ISO-639-1, e.g. `"en"`). Falls back to the ISO-639-3 code for the
/// handful of `whatlang` languages with no two-letter assignment.
fn iso_639_1(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Eng => "en",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Ben => "bn",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ukr => "uk",
        Lang::Kat => "ka",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Heb => "he",
        Lang::Yid => "yi",
        Lang::Pol => "pl",
        Lang::Amh => "am",
        Lang::Jav => "jv",
        Lang::Kor => "ko",
        Lang::Nob => "nb",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Nld => "nl",
        Lang::Hun => "hu",
        Lang::Ces => "cs",
        Lang::Ell => "el",
        Lang::Bul => "bg",
        Lang::Bel => "be",
        Lang::Mar => "mr",
        Lang::Kan => "kn",
        Lang::Ron => "ro",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Mkd => "mk",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Est => "et",
        Lang::Tam => "ta",
        Lang::Vie => "vi",
        Lang::Urd => "ur",
        Lang::Tha => "th",
        Lang::Guj => "gu",
        Lang::Uzb => "uz",
        Lang::Pan => "pa",
        Lang::Aze => "az",
        Lang::Ind => "id",
        Lang::Tel => "te",
        Lang::Pes => "fa",
        Lang::Mal => "ml",
        Lang::Ori => "or",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Sin => "si",
        Lang::Khm => "km",
        Lang::Afr => "af",
        Lang::Slk => "sk",
        Lang::Cat => "ca",
        Lang::Tgl => "tl",
        Lang::Hye => "hy",
        _ => lang.code(),
    }
}

/// Map `whatlang`'s `Script` enum to its ISO-15924 four-letter code.
fn iso_15924_script(script: whatlang::Script) -> String {
    use whatlang::Script;
    match script {
        Script::Latin => "Latn",
        Script::Cyrillic => "Cyrl",
        Script::Arabic => "Arab",
        Script::Devanagari => "Deva",
        Script::Hebrew => "Hebr",
        Script::Ethiopic => "Ethi",
        Script::Georgian => "Geor",
        Script::Mandarin => "Hani",
        Script::Bengali => "Beng",
        Script::Hiragana => "Hira",
        Script::Katakana => "Kana",
        Script::Hangul => "Hang",
        Script::Greek => "Grek",
        Script::Kannada => "Knda",
        Script::Tamil => "Taml",
        Script::Thai => "Thai",
        Script::Gujarati => "Gujr",
        Script::Gurmukhi => "Guru",
        Script::Telugu => "Telu",
        Script::Malayalam => "Mlym",
        Script::Oriya => "Orya",
        Script::Myanmar => "Mymr",
        Script::Sinhala => "Sinh",
        Script::Khmer => "Khmr",
        Script::Armenian => "Armn",
        _ => "Zzzz",
    }
    .to_string()
}
