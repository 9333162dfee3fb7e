use regex::Regex;
use std::sync::LazyLock;

/// Hard ceiling for a published post.
pub const MAX_POST_CHARS: usize = 280;

static HASHTAG_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\S+").expect("hashtag pattern"));
static PICTOGRAPHS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Extended_Pictographic}").expect("pictograph pattern"));
static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Normalize raw generated text into a publishable post.
///
/// Truncates to [`MAX_POST_CHARS`] first (sanitizing only shortens),
/// then removes square brackets, `#word` tokens and pictographic code
/// points, collapses whitespace, and strips leading/trailing quote
/// runs. The quote/trim step runs to a fixpoint so the result never
/// carries edge quotes and a second pass is a no-op.
pub fn sanitize_post(raw: &str) -> String {
    let truncated: String = raw.chars().take(MAX_POST_CHARS).collect();

    let no_brackets: String = truncated.chars().filter(|c| *c != '[' && *c != ']').collect();
    let no_hashtags = HASHTAG_TOKENS.replace_all(&no_brackets, "");
    let no_pictographs = PICTOGRAPHS.replace_all(&no_hashtags, "");
    let collapsed = WHITESPACE_RUNS.replace_all(&no_pictographs, " ");

    let mut text = collapsed.trim().to_string();
    loop {
        let stripped = text
            .trim_matches(|c| c == '\'' || c == '"')
            .trim()
            .to_string();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_brackets() {
        assert_eq!(sanitize_post("a [quoted] idea"), "a quoted idea");
    }

    #[test]
    fn strips_hashtag_tokens() {
        assert_eq!(sanitize_post("to the moon #Bitcoin #hodl"), "to the moon");
        assert_eq!(sanitize_post("#lead and follow"), "and follow");
    }

    #[test]
    fn strips_pictographs() {
        assert_eq!(sanitize_post("gm 🌞 world 🚀"), "gm world");
        assert_eq!(sanitize_post("🎉🎉🎉"), "");
    }

    #[test]
    fn strips_edge_quote_runs_only() {
        assert_eq!(sanitize_post("\"hello\""), "hello");
        assert_eq!(sanitize_post("''\"deep\"''"), "deep");
        assert_eq!(sanitize_post("it's an \"inner\" quote"), "it's an \"inner\" quote");
    }

    #[test]
    fn strips_quotes_behind_edge_whitespace() {
        assert_eq!(sanitize_post("  \"hello\"  "), "hello");
        assert_eq!(sanitize_post("' \"a\" '"), "a");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_post("  one\n\ttwo   three "), "one two three");
    }

    #[test]
    fn truncates_before_sanitizing() {
        let long = "x".repeat(400);
        assert_eq!(sanitize_post(&long).chars().count(), MAX_POST_CHARS);

        // The bracket at position 279 survives the cut and is then stripped.
        let mut tricky = "y".repeat(279);
        tricky.push('[');
        tricky.push_str(&"z".repeat(100));
        assert_eq!(sanitize_post(&tricky), "y".repeat(279));
    }

    #[test]
    fn empty_and_compliant_inputs_pass_through() {
        assert_eq!(sanitize_post(""), "");
        assert_eq!(sanitize_post("already clean"), "already clean");
    }

    #[test]
    fn idempotent_on_awkward_inputs() {
        let inputs = [
            "",
            "plain",
            "  \"wrapped in space and quotes\"  ",
            "' \"nested\" '",
            "keep #tag 🚀 [x] 'it'",
            "a # b",
            "\"'\"'",
            "   ",
            "mixed ☀️ #sun \"quote\" [note] end",
        ];
        for input in inputs {
            let once = sanitize_post(input);
            let twice = sanitize_post(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn output_invariants_hold() {
        let long = "e".repeat(500);
        let inputs = [
            "",
            "#a#b#c",
            "[[[]]]",
            "🚀🚀 #moon \"quoted\" [bracket]   spaced",
            long.as_str(),
            "'''''",
        ];
        for input in inputs {
            let out = sanitize_post(input);
            assert!(out.chars().count() <= MAX_POST_CHARS);
            assert!(!out.contains('[') && !out.contains(']'), "brackets in {out:?}");
            assert!(!HASHTAG_TOKENS.is_match(&out), "hashtag in {out:?}");
            assert!(!PICTOGRAPHS.is_match(&out), "pictograph in {out:?}");
            assert!(!out.starts_with(['\'', '"']) && !out.ends_with(['\'', '"']));
            assert_eq!(out.trim(), out);
            assert!(!out.contains("  "), "uncollapsed whitespace in {out:?}");
        }
    }
}
