//! Shared keyword/regex tables for the feature-based scorer (§4.6).
//!
//! Kept distinct from [`crate::layers::heuristics::analyzers`]'s tables:
//! the heuristic layer's thresholds are sensitivity-scaled counts, while
//! these feed fixed per-feature weights into the ML ensemble. The word
//! lists overlap in spirit (both catalogue injection vocabulary) but are
//! tuned independently per layer, since L2 and L3 are meant to be
//! distinct evidence sources rather than duplicates of each other.

use std::sync::OnceLock;

pub const INJECTION_KEYWORDS: &[&str] = &[
    "ignore", "disregard", "forget", "override", "bypass", "jailbreak", "unfiltered", "unrestricted",
];

pub const COMMAND_KEYWORDS: &[&str] = &[
    "execute", "run", "system(", "eval(", "exec(", "sudo", "rm -rf", "curl ", "wget ",
];

pub const ROLE_KEYWORDS: &[&str] = &[
    "you are now", "act as", "pretend to be", "from now on", "new role", "persona",
];

macro_rules! lazy_regex {
    ($vis:vis fn $name:ident() -> $source:expr;) => {
        #[must_use]
        $vis fn $name() -> &'static regex::Regex {
            static CELL: OnceLock<regex::Regex> = OnceLock::new();
            CELL.get_or_init(|| regex::Regex::new($source).expect("lexicon regex must compile"))
        }
    };
}

lazy_regex!(pub fn ignore_pattern() -> r"(?i)ignore\s+(all\s+)?(the\s+)?(previous|above|prior)\b";);
lazy_regex!(pub fn new_instructions_pattern() -> r"(?i)\bnew\s+instructions?\b";);
lazy_regex!(pub fn persona_switch_pattern() -> r"(?i)\b(you\s+are\s+now|act\s+as|pretend\s+to\s+be)\b";);
lazy_regex!(pub fn system_prompt_reference_pattern() -> r"(?i)\bsystem\s+prompt\b";);
lazy_regex!(pub fn fenced_code_pattern() -> r"```[\s\S]*?```";);
lazy_regex!(pub fn repeated_delimiter_pattern() -> r"(#{5,}|={5,}|-{5,}|\*{5,}|~{5,}|_{5,})";);
lazy_regex!(pub fn xml_tag_pattern() -> r"</?[a-zA-Z][\w:-]*\s*/?>";);
lazy_regex!(pub fn base64_blob_pattern() -> r"[A-Za-z0-9+/=]{32,}";);
lazy_regex!(pub fn template_placeholder_pattern() -> r"\{\{[^{}]{1,64}\}\}|\$\{[^{}]{1,64}\}";);
