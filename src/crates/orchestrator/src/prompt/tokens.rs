//! Token estimation and budget truncation.
//!
//! The estimate is a deterministic heuristic, not a tokenizer: callers
//! must never rely on equality with provider-side counts. The contract that
//! matters is the truncation property: for any text and `max_tokens >= 3`,
//! `estimate_tokens(truncate_to_max_tokens(text, max_tokens)) <= max_tokens`.

/// Tokens reserved for the trailing ellipsis when truncating.
const ELLIPSIS_RESERVE: usize = 3;

fn ceil_div(value: usize, divisor: usize) -> usize {
    value.div_ceil(divisor)
}

/// Approximate token count:
/// `max(ceil(chars/4), words)` plus structural surcharges — each
/// code-fenced block adds `ceil(block_chars/3)`, each bullet line adds 1,
/// each table row adds 2.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }

    let chars = text.chars().count();
    let words = text.split_whitespace().count();
    let base = ceil_div(chars, 4).max(words);

    let mut surcharge = 0;
    let mut in_fence = false;
    let mut fence_chars = 0;
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            if in_fence {
                surcharge += ceil_div(fence_chars, 3);
                fence_chars = 0;
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fence_chars += line.chars().count();
        } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
            surcharge += 1;
        } else if trimmed.starts_with('|') {
            surcharge += 2;
        }
    }
    // An unterminated fence still carries its surcharge.
    if in_fence {
        surcharge += ceil_div(fence_chars, 3);
    }

    base + surcharge
}

/// Split into whole sentences on `.`, `?` and `!`, keeping the terminator.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '?' | '!') {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Truncate `text` so its estimate fits `max_tokens`.
///
/// Under budget, the text is returned unchanged. Otherwise whole sentences
/// are accumulated greedily against the budget minus the ellipsis reserve;
/// if not even the first sentence fits, words of the first sentence are
/// accumulated instead. `...` is appended whenever anything was dropped.
pub fn truncate_to_max_tokens(text: &str, max_tokens: usize) -> String {
    if estimate_tokens(text) <= max_tokens {
        return text.to_string();
    }

    let budget = max_tokens.saturating_sub(ELLIPSIS_RESERVE);
    let sentences = split_sentences(text);

    let mut kept = String::new();
    for sentence in &sentences {
        let candidate = if kept.is_empty() {
            sentence.clone()
        } else {
            format!("{kept} {sentence}")
        };
        if estimate_tokens(&candidate) <= budget {
            kept = candidate;
        } else {
            break;
        }
    }

    if kept.is_empty() {
        // Fall back to word-by-word accumulation of the first sentence.
        if let Some(first) = sentences.first() {
            for word in first.split_whitespace() {
                let candidate = if kept.is_empty() {
                    word.to_string()
                } else {
                    format!("{kept} {word}")
                };
                if estimate_tokens(&candidate) <= budget {
                    kept = candidate;
                } else {
                    break;
                }
            }
        }
    }

    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_plain_prose_uses_char_or_word_max() {
        // 12 words, 58 chars: ceil(58/4) = 15 > 12.
        let text = "The quick brown fox jumps over the lazy dog near the river";
        assert_eq!(text.chars().count(), 58);
        assert_eq!(estimate_tokens(text), 15);

        // Short words dominate: 6 words, 11 chars → ceil(11/4) = 3 < 6.
        let text = "a b c d e f";
        assert_eq!(estimate_tokens(text), 6);
    }

    #[test]
    fn test_bullet_and_table_surcharges() {
        let plain = "alpha beta";
        let bulleted = "- alpha beta";
        // Bullet adds 1 beyond whatever the base difference is.
        assert!(estimate_tokens(bulleted) > estimate_tokens(plain));

        let table = "| a | b |\n| c | d |";
        let base = ceil_div(table.chars().count(), 4).max(table.split_whitespace().count());
        assert_eq!(estimate_tokens(table), base + 4);
    }

    #[test]
    fn test_code_fence_surcharge() {
        let text = "intro\n```\nlet x = 1;\n```\noutro";
        let fence_chars = "let x = 1;".chars().count();
        let base = ceil_div(text.chars().count(), 4).max(text.split_whitespace().count());
        assert_eq!(estimate_tokens(text), base + ceil_div(fence_chars, 3));
    }

    #[test]
    fn test_truncate_under_budget_is_identity() {
        let text = "Short text.";
        assert_eq!(truncate_to_max_tokens(text, 1000), text);
    }

    #[test]
    fn test_truncate_keeps_whole_sentences() {
        let text = "First sentence here. Second sentence follows. Third one is much longer than the others and keeps going.";
        let truncated = truncate_to_max_tokens(text, 12);
        assert!(truncated.ends_with("..."));
        assert!(truncated.starts_with("First sentence here."));
        assert!(!truncated.contains("Third"));
    }

    #[test]
    fn test_truncate_word_fallback() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let truncated = truncate_to_max_tokens(text, 6);
        assert!(truncated.ends_with("..."));
        assert!(truncated.starts_with("one"));
    }

    #[test]
    fn test_truncation_property_holds() {
        let samples = [
            "A. B. C. D. E. F. G. H. I. J. K. L. M. N. O. P.",
            "This is a long paragraph of text without any terminators at all just words and more words stretching on",
            "- bullet one\n- bullet two\n- bullet three\n| r1 | r2 |\nplain tail here. And another sentence!",
            "```\nfn main() { println!(\"hi\"); }\n```\nSome prose after the fence. More prose follows here.",
        ];
        for text in samples {
            for max_tokens in [3, 5, 8, 13, 21, 50] {
                let truncated = truncate_to_max_tokens(text, max_tokens);
                assert!(
                    estimate_tokens(&truncated) <= max_tokens,
                    "estimate {} exceeds budget {} for {truncated:?}",
                    estimate_tokens(&truncated),
                    max_tokens
                );
            }
        }
    }
}
