//! The crate's built-in pattern catalogue.
//!
//! Ported from the staged injection-pattern library this crate's detection
//! engine grew out of, re-categorised and extended with two categories the
//! catalogue previously lacked: [`PatternCategory::ExcessiveRepetition`] and
//! [`PatternCategory::HarmfulContentSolicitation`].

use super::{DetectionPattern, PatternCategory};
use crate::model::Severity;
use std::borrow::Cow;

macro_rules! pat {
    ($id:expr, $name:expr, $cat:expr, $desc:expr, $re:expr, $sev:expr) => {
        DetectionPattern {
            id: Cow::Borrowed($id),
            name: Cow::Borrowed($name),
            category: $cat,
            description: Cow::Borrowed($desc),
            regex_source: Cow::Borrowed($re),
            severity: $sev,
            enabled: true,
        }
    };
}

/// Returns the full built-in catalogue (50+ patterns across seven
/// categories, covering every pattern family named in §4.2).
#[allow(clippy::too_many_lines)]
#[must_use]
pub fn builtin_patterns() -> Vec<DetectionPattern> {
    use PatternCategory::{
        DelimiterManipulation, EncodingEvasion, ExcessiveRepetition, HarmfulContentSolicitation,
        InstructionOverride, RoleConfusion, SystemPromptExtraction,
    };
    use Severity::{Critical, High, Low, Medium};

    vec![
        // ── Role Confusion (jailbreak / persona switch) ─────────────
        pat!(
            "RC-001",
            "you_are_now",
            RoleConfusion,
            "You are now",
            r"(?i)you\s+are\s+now\b",
            High
        ),
        pat!(
            "RC-002",
            "ignore_previous_instructions",
            RoleConfusion,
            "Ignore previous instructions",
            r"(?i)ignore\s+(all\s+)?previous\s+instructions",
            Critical
        ),
        pat!(
            "RC-003",
            "act_as_a",
            RoleConfusion,
            "Act as a/an",
            r"(?i)act\s+as\s+(a|an)\b",
            High
        ),
        pat!(
            "RC-004",
            "pretend_to_be",
            RoleConfusion,
            "Pretend to be",
            r"(?i)pretend\s+(to\s+be|you\s+are)\b",
            High
        ),
        pat!(
            "RC-005",
            "forget_everything",
            RoleConfusion,
            "Forget everything",
            r"(?i)forget\s+everything",
            Critical
        ),
        pat!(
            "RC-006",
            "your_new_role_is",
            RoleConfusion,
            "Your new role is",
            r"(?i)your\s+new\s+role\s+is\b",
            High
        ),
        pat!(
            "RC-007",
            "disregard_prior",
            RoleConfusion,
            "Disregard prior",
            r"(?i)disregard\s+(all\s+)?prior\b",
            Critical
        ),
        pat!(
            "RC-008",
            "switch_to_mode",
            RoleConfusion,
            "Switch to mode",
            r"(?i)switch\s+to\s+\w+\s+mode",
            Medium
        ),
        pat!(
            "RC-009",
            "from_now_on",
            RoleConfusion,
            "From now on",
            r"(?i)from\s+now\s+on\b",
            Medium
        ),
        pat!(
            "RC-010",
            "you_must_now",
            RoleConfusion,
            "You must now",
            r"(?i)you\s+must\s+now\b",
            High
        ),
        pat!(
            "RC-011",
            "system_prefix",
            RoleConfusion,
            "System: prefix",
            r"(?i)^system:\s",
            High
        ),
        pat!(
            "RC-012",
            "override_your_programming",
            RoleConfusion,
            "Override your programming",
            r"(?i)override\s+your\s+programming",
            Critical
        ),
        pat!(
            "RC-013",
            "you_have_been_reprogrammed",
            RoleConfusion,
            "You have been reprogrammed",
            r"(?i)you\s+have\s+been\s+reprogrammed",
            Critical
        ),
        pat!(
            "RC-014",
            "new_instructions_prefix",
            RoleConfusion,
            "New instructions:",
            r"(?i)new\s+instructions?\s*:",
            High
        ),
        pat!(
            "RC-015",
            "dan_mode",
            RoleConfusion,
            "DAN / do anything now",
            r"(?i)\bDAN\b.*do\s+anything\s+now|do\s+anything\s+now.*\bDAN\b",
            Critical
        ),
        pat!(
            "RC-016",
            "jailbreak_keyword",
            RoleConfusion,
            "Explicit jailbreak request",
            r"(?i)\bjailbreak\b",
            High
        ),
        // ── Instruction Override ────────────────────────────────────
        pat!(
            "IO-001",
            "ignore_the_above",
            InstructionOverride,
            "Ignore the above",
            r"(?i)ignore\s+the\s+above",
            Critical
        ),
        pat!(
            "IO-002",
            "disregard_the_and",
            InstructionOverride,
            "Disregard the ... and",
            r"(?i)disregard\s+the\s+\w+\s+and\b",
            High
        ),
        pat!(
            "IO-003",
            "do_not_follow",
            InstructionOverride,
            "Do not follow",
            r"(?i)do\s+not\s+follow",
            High
        ),
        pat!(
            "IO-004",
            "cancel_all_restrictions",
            InstructionOverride,
            "Cancel all restrictions",
            r"(?i)cancel\s+all\s+restrictions",
            Critical
        ),
        pat!(
            "IO-005",
            "remove_safety",
            InstructionOverride,
            "Remove safety",
            r"(?i)remove\s+(all\s+)?safety",
            Critical
        ),
        pat!(
            "IO-006",
            "disable_filters",
            InstructionOverride,
            "Disable filters",
            r"(?i)disable\s+(all\s+)?filters",
            Critical
        ),
        pat!(
            "IO-007",
            "bypass_the",
            InstructionOverride,
            "Bypass the",
            r"(?i)bypass\s+the\b",
            High
        ),
        pat!(
            "IO-008",
            "override_prefix",
            InstructionOverride,
            "Override: prefix",
            r"(?i)^override\s*:",
            High
        ),
        pat!(
            "IO-009",
            "admin_tag_injection",
            InstructionOverride,
            "Admin tag injection",
            r"<admin>",
            Critical
        ),
        pat!(
            "IO-010",
            "execute_the_following",
            InstructionOverride,
            "Execute the following",
            r"(?i)execute\s+the\s+following",
            Medium
        ),
        pat!(
            "IO-011",
            "unlock_hidden_mode",
            InstructionOverride,
            "Unlock hidden/secret mode",
            r"(?i)unlock\s+(hidden|secret)\s+mode",
            High
        ),
        pat!(
            "IO-012",
            "enter_developer_mode",
            InstructionOverride,
            "Enter developer/debug/god mode",
            r"(?i)enter\s+(developer|debug|god)\s+mode",
            High
        ),
        // ── Delimiter Manipulation ───────────────────────────────────
        pat!(
            "DM-001",
            "dash_delimited_system_prefix",
            DelimiterManipulation,
            "Dash-delimited system: prefix",
            r"---\n.*(?i)system\s*:",
            High
        ),
        pat!(
            "DM-002",
            "code_block_system_hijack",
            DelimiterManipulation,
            "Code block system: hijack",
            r"```\w*\n.*(?i)system\s*:",
            High
        ),
        pat!(
            "DM-003",
            "inst_tag_injection",
            DelimiterManipulation,
            "[INST] tag injection",
            r"\[INST\]",
            High
        ),
        pat!(
            "DM-004",
            "special_token_injection",
            DelimiterManipulation,
            "Special token injection",
            r"<\|[a-z_]+\|>",
            Critical
        ),
        pat!(
            "DM-005",
            "end_of_prompt_marker",
            DelimiterManipulation,
            "End of prompt marker",
            r"(?i)end\s+of\s+prompt",
            Medium
        ),
        pat!(
            "DM-006",
            "template_variable_abuse",
            DelimiterManipulation,
            "Template variable abuse",
            r"(?i)\{\{[^}]*\}\}",
            Medium
        ),
        pat!(
            "DM-007",
            "html_comment_injection",
            DelimiterManipulation,
            "HTML comment injection",
            r"<!--.*?-->",
            Medium
        ),
        pat!(
            "DM-008",
            "end_of_sequence_token",
            DelimiterManipulation,
            "End-of-sequence token",
            r"</s>",
            High
        ),
        pat!(
            "DM-009",
            "chatml_markers",
            DelimiterManipulation,
            "ChatML markers",
            r"(?i)<\|im_start\|>|<\|im_end\|>",
            Critical
        ),
        pat!(
            "DM-010",
            "hash_delimited_override",
            DelimiterManipulation,
            "Hash-delimited override block",
            r"#{3,}[^\n#]*#{3,}",
            Medium
        ),
        // ── System Prompt Extraction ─────────────────────────────────
        pat!(
            "SE-001",
            "repeat_the_instructions",
            SystemPromptExtraction,
            "Repeat the/your/all instructions",
            r"(?i)repeat\s+(the|your|all)\s+instructions",
            High
        ),
        pat!(
            "SE-002",
            "print_show_display_prompt",
            SystemPromptExtraction,
            "Print/show/display prompt",
            r"(?i)(print|show|display)\s+(the|your)\s+(prompt|instructions)",
            High
        ),
        pat!(
            "SE-003",
            "show_me_the_original",
            SystemPromptExtraction,
            "Show me the original",
            r"(?i)show\s+me\s+the\s+original",
            Medium
        ),
        pat!(
            "SE-004",
            "tell_me_your_rules",
            SystemPromptExtraction,
            "Tell me your rules",
            r"(?i)tell\s+me\s+your\s+rules",
            High
        ),
        pat!(
            "SE-005",
            "what_were_you_told",
            SystemPromptExtraction,
            "What were you told / your instructions",
            r"(?i)what\s+(were\s+you|are\s+your)\s+(told|instructions|rules)",
            High
        ),
        pat!(
            "SE-006",
            "what_is_your_system_prompt",
            SystemPromptExtraction,
            "What is your system prompt",
            r"(?i)what\s+is\s+your\s+system\s+prompt",
            Critical
        ),
        pat!(
            "SE-007",
            "start_response_with_quote",
            SystemPromptExtraction,
            "Start response with quote",
            r#"(?i)start\s+your\s+response\s+with\s+["']"#,
            Medium
        ),
        pat!(
            "SE-008",
            "reproduce_the_text_above",
            SystemPromptExtraction,
            "Reproduce the text above",
            r"(?i)reproduce\s+the\s+text\s+above",
            High
        ),
        // ── Encoding Evasion ─────────────────────────────────────────
        pat!(
            "EE-001",
            "unicode_escape_sequences",
            EncodingEvasion,
            "Unicode escape sequences",
            r"\\u[0-9a-fA-F]{4}",
            Medium
        ),
        pat!(
            "EE-002",
            "url_encoded_characters",
            EncodingEvasion,
            "URL-encoded characters",
            r"%[0-9a-fA-F]{2}",
            Medium
        ),
        pat!(
            "EE-003",
            "html_entities",
            EncodingEvasion,
            "HTML entities",
            r"&#x?[0-9a-fA-F]+;",
            Medium
        ),
        pat!(
            "EE-004",
            "base64_like_blob",
            EncodingEvasion,
            "Base64-like high-entropy string",
            r"(?i)[a-zA-Z0-9+/]{32,}={0,2}",
            Low
        ),
        pat!(
            "EE-005",
            "encoding_method_reference",
            EncodingEvasion,
            "Encoding method reference",
            r"(?i)\brot13\b|\bbase64\b|\bhex\s+encode",
            Medium
        ),
        pat!(
            "EE-006",
            "decode_this",
            EncodingEvasion,
            "Decode this/the following",
            r"(?i)decode\s+(this|the\s+following)",
            Medium
        ),
        pat!(
            "EE-007",
            "hex_blob",
            EncodingEvasion,
            "Long hexadecimal run",
            r"(?i)(?:[0-9a-f]{2}\s?){16,}",
            Low
        ),
        // ── Excessive Repetition ─────────────────────────────────────
        //
        // A same-word-repeated-N-times rule would need a backreference,
        // which the `regex` crate doesn't support; that case is instead
        // covered by the heuristic layer's `RepetitivePatternsAnalyzer`,
        // which counts token repetition directly rather than matching it
        // with a regex.
        pat!(
            "RR-002",
            "repeated_punctuation_run",
            ExcessiveRepetition,
            "Repeated punctuation used as a context-exhaustion filler",
            r"(!{10,}|\?{10,}|\.{10,})",
            Low
        ),
        // ── Harmful Content Solicitation ─────────────────────────────
        pat!(
            "HC-001",
            "how_to_make_weapon",
            HarmfulContentSolicitation,
            "Direct request for weapon/explosive construction",
            r"(?i)how\s+(do\s+i|to)\s+(make|build|synthesize)\s+(a\s+)?(bomb|explosive|weapon)",
            Critical
        ),
        pat!(
            "HC-002",
            "for_educational_purposes_only",
            HarmfulContentSolicitation,
            "Harmful-intent disclaimer often used to solicit compliance",
            r"(?i)for\s+educational\s+purposes\s+only.{0,40}(hack|exploit|bomb|weapon|malware)",
            High
        ),
        pat!(
            "HC-003",
            "write_malware",
            HarmfulContentSolicitation,
            "Direct request to author malicious code",
            r"(?i)write\s+(a\s+)?(virus|malware|ransomware|keylogger)",
            Critical
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_at_least_50_patterns() {
        assert!(builtin_patterns().len() >= 50);
    }

    #[test]
    fn all_required_categories_represented() {
        let patterns = builtin_patterns();
        let categories: std::collections::HashSet<_> =
            patterns.iter().map(|p| p.category).collect();
        for expected in [
            PatternCategory::RoleConfusion,
            PatternCategory::InstructionOverride,
            PatternCategory::DelimiterManipulation,
            PatternCategory::SystemPromptExtraction,
            PatternCategory::EncodingEvasion,
            PatternCategory::ExcessiveRepetition,
            PatternCategory::HarmfulContentSolicitation,
        ] {
            assert!(categories.contains(&expected), "missing category {expected}");
        }
    }

    #[test]
    fn pattern_ids_are_unique() {
        let patterns = builtin_patterns();
        let ids: std::collections::HashSet<_> = patterns.iter().map(|p| &p.id).collect();
        assert_eq!(ids.len(), patterns.len(), "duplicate pattern IDs detected");
    }

    #[test]
    fn all_patterns_compile() {
        for p in &builtin_patterns() {
            regex::Regex::new(&p.regex_source).unwrap_or_else(|e| {
                panic!("pattern {} has invalid regex: {e}", p.id);
            });
        }
    }

    #[test]
    fn ignore_previous_instructions_matches_case_insensitively() {
        let p = builtin_patterns()
            .into_iter()
            .find(|p| p.id == "RC-002")
            .unwrap();
        let re = regex::Regex::new(&p.regex_source).unwrap();
        assert!(re.is_match("IgNoRe AlL pReViOuS iNsTrUcTiOnS"));
    }
}
