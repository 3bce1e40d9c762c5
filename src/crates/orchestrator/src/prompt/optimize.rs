//! Feature- and model-specific prompt optimization.
//!
//! A fixed table of phrase substitutions per feature followed by universal
//! whitespace/punctuation normalization, plus an instruction-emphasis pass
//! keyed by model id. Deterministic surface transforms only; substitution
//! pairs are chosen so no replacement output matches another pattern,
//! keeping the result independent of application order.

use domain::Feature;
use regex::Regex;

/// Phrase substitutions applied for a feature. Patterns are matched on
/// word boundaries so `match` never rewrites `matchmaker` or `matches`.
fn phrase_table(feature: Feature) -> &'static [(&'static str, &'static str)] {
    match feature {
        Feature::Matching => &[
            ("match", "find compatibility between"),
            ("group of people", "tribe"),
        ],
        Feature::Personality => &[
            ("personality test", "assessment"),
            ("quiz", "assessment"),
        ],
        Feature::Engagement => &[
            ("icebreaker", "conversation prompt"),
            ("game", "challenge"),
        ],
        Feature::Recommendation => &[("nearby", "local"), ("outing", "activity")],
        Feature::Conversation => &[],
    }
}

/// Apply the feature phrase table, then normalize whitespace and
/// punctuation spacing.
pub fn optimize_for_feature(text: &str, feature: Feature) -> String {
    let mut optimized = text.to_string();
    for (from, to) in phrase_table(feature) {
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(from)))
            .expect("phrase patterns are valid regexes");
        optimized = pattern.replace_all(&optimized, *to).to_string();
    }
    normalize(&optimized)
}

/// Tighten instruction emphasis for models that need it.
///
/// Smaller models get stricter JSON-format phrasing; every model gets a
/// trailing format reminder when the prompt requests JSON output.
pub fn apply_model_emphasis(text: &str, model_id: &str) -> String {
    let strict = model_id.contains("3.5") || model_id.contains("instant") || model_id.contains("mini");

    let mut emphasized = if strict {
        text.replace(
            "Format your response as",
            "IMPORTANT: You MUST format your response EXACTLY as",
        )
    } else {
        text.to_string()
    };

    if emphasized.contains("JSON") {
        let reminder = if strict {
            "\n\nYour response MUST be valid JSON in the exact format specified above, with no text outside the JSON structure."
        } else {
            "\n\nEnsure your response is valid JSON following the format specified above."
        };
        emphasized.push_str(reminder);
    }

    emphasized
}

/// Universal normalization: collapse runs of spaces and tabs, trim line
/// ends, cap blank runs at one empty line, drop spaces before sentence
/// punctuation.
fn normalize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;
    for line in text.lines() {
        let mut collapsed = String::with_capacity(line.len());
        let mut last_was_space = false;
        for ch in line.chars() {
            if ch == ' ' || ch == '\t' {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(ch);
                last_was_space = false;
            }
        }
        let trimmed = collapsed.trim_end();

        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            lines.push(String::new());
        } else {
            blank_run = 0;
            lines.push(
                trimmed
                    .replace(" .", ".")
                    .replace(" ,", ",")
                    .replace(" !", "!")
                    .replace(" ?", "?"),
            );
        }
    }
    let mut result = lines.join("\n");
    while result.ends_with('\n') {
        result.pop();
    }
    result
}
