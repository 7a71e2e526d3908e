//! Post-processing: deterministic cleanup of the extracted transcript.
//!
//! The transcript travels inside a JSON string, so models that "helpfully"
//! wrap it in ```` ```markdown ```` fences, emit `\r\n`, or copy zero-width
//! joiners out of the screenshot's text layer leave artefacts that break
//! substring matching and rendering downstream. These rules fix layout
//! only; they never change the words.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence
//! regex sees the raw model output; invisible characters are removed before
//! the final-newline pass so a trailing BOM cannot hide the real end.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all transcript cleanup rules.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Ensure the text ends with exactly one newline
pub fn clean_transcript(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 6: Ensure text ends with a single newline ───────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n**jack** @jack\njust setting up my twttr\n```";
        assert_eq!(
            strip_markdown_fences(input),
            "**jack** @jack\njust setting up my twttr"
        );
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\nhello\n```";
        assert_eq!(strip_markdown_fences(input), "hello");
    }

    #[test]
    fn test_inner_code_block_kept() {
        let input = "Look at this:\n```\nfn main() {}\n```\nneat";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "2h\u{200B} ago\u{FEFF}";
        assert_eq!(remove_invisible_chars(input), "2h ago");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_clean_transcript_full_pipeline() {
        let input = "```markdown\r\n**Jack** @jack   \r\n\r\n\r\n\r\n\r\njust setting up\u{200B} my twttr\r\n```";
        let result = clean_transcript(input);
        assert_eq!(result, "**Jack** @jack\n\n\njust setting up my twttr\n");
    }
}
