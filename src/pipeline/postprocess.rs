//! Render preparation: deterministic cleanup of model-drafted Markdown.
//!
//! The drafting model is asked for Markdown, but what comes back is not
//! always something a Markdown parser turns into the intended document:
//!
//! - the whole answer wrapped in a ` ```markdown ... ``` ` fence, which would
//!   render as one big code block
//! - `\r\n` line endings from some providers
//! - a table glued to the sentence introducing it ("Timeline table:"), which
//!   a parser reads as paragraph text
//! - tables without a header separator row, or with stray separators in the
//!   body
//!
//! These rules only fix structure; words are never changed. They run on each
//! chunk response separately before rendering. The report body kept in
//! [`crate::output::ReportOutput::report`] is the raw model text.
//!
//! ## Rule Order
//!
//! Line endings are normalised before trimming, fences are stripped before
//! any line-based rule sees the text, and tables are separated from their
//! lead-in before separator rows are repaired.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one chunk response.
///
/// Rules (applied in order):
/// 1. Strip an outer markdown fence
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Ensure heading lines have a blank line before them
/// 6. Ensure tables have a blank line before them
/// 7. Insert a separator row into tables missing one
/// 8. Remove separator rows from table bodies
/// 9. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 10. End with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = separate_tables(&s);
    let s = fix_broken_tables(&s);
    let s = remove_mid_table_separators(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*?)\r?\n```\s*$").unwrap());

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
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

// ── Rule 5: Heading spacing ──────────────────────────────────────────────────

static RE_ATX_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}(\s|$)").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if i > 0 && RE_ATX_HEADING.is_match(line) {
            let kept = result.trim_end_matches('\n').len();
            result.truncate(kept);
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 6: Blank line before tables ─────────────────────────────────────────

/// A table directly under a text line is parsed as part of that paragraph.
fn separate_tables(input: &str) -> String {
    let mut result: Vec<&str> = Vec::with_capacity(input.lines().count() + 8);
    let mut prev: Option<&str> = None;
    for line in input.lines() {
        if let Some(p) = prev {
            if is_table_row(line) && !p.trim().is_empty() && !is_table_row(p) {
                result.push("");
            }
        }
        result.push(line);
        prev = Some(line);
    }
    result.join("\n")
}

// ── Rule 7: Fix broken GFM tables ────────────────────────────────────────────

/// Insert a separator row after the header of every table that lacks one.
fn fix_broken_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len() + 10);

    for (i, line) in lines.iter().enumerate() {
        result.push((*line).to_string());

        let starts_table = is_table_row(line)
            && !is_separator_row(line)
            && (i == 0 || !is_table_row(lines[i - 1]));
        if !starts_table {
            continue;
        }

        let next = lines.get(i + 1).copied().unwrap_or("");
        if !is_separator_row(next) {
            let cols = count_cells(line);
            let sep: String = std::iter::once("|")
                .chain(std::iter::repeat_n(" --- |", cols))
                .collect();
            result.push(sep);
        }
    }

    result.join("\n")
}

fn count_cells(row: &str) -> usize {
    row.trim().matches('|').count().saturating_sub(1).max(1)
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

// ── Rule 8: Remove spurious mid-table separator rows ─────────────────────────

/// GFM allows a separator only as the second row of a table.
fn remove_mid_table_separators(input: &str) -> String {
    let mut result: Vec<&str> = Vec::new();
    let mut row_in_table = 0usize;

    for line in input.lines() {
        if is_table_row(line) {
            row_in_table += 1;
            if is_separator_row(line) && row_in_table != 2 {
                continue;
            }
        } else {
            row_in_table = 0;
        }
        result.push(line);
    }

    result.join("\n")
}

// ── Rule 9: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 10: Ensure file ends with single newline ────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n# Report On Title\nConfidential\n```";
        assert_eq!(strip_markdown_fences(input), "# Report On Title\nConfidential");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        assert_eq!(strip_markdown_fences("```\n# A\nB\n```"), "# A\nB");
    }

    #[test]
    fn test_inner_code_block_is_kept() {
        let input = "# A\n\n```\ncode\n```\n\ntext";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_heading_spacing() {
        let result = normalise_heading_spacing("some text\n## II. LIST OF DOCUMENTS\nmore");
        assert!(result.contains("some text\n\n## II. LIST OF DOCUMENTS\n"));
    }

    #[test]
    fn test_hash_without_space_is_not_a_heading() {
        let result = normalise_heading_spacing("Sy.\n#12 survey");
        assert_eq!(result, "Sy.\n#12 survey\n");
    }

    #[test]
    fn test_table_is_separated_from_lead_in() {
        let input = "Timeline table:\n| Period | Holder |\n| --- | --- |\n| 1990 | A |";
        let result = separate_tables(input);
        assert!(result.starts_with("Timeline table:\n\n| Period | Holder |"));
        assert_eq!(result.matches("\n\n").count(), 1);
    }

    #[test]
    fn test_fix_broken_table() {
        let result = fix_broken_tables("| A | B |\n| 1 | 2 |\n| 3 | 4 |");
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "| --- | --- |");
        assert!(!is_separator_row(lines[2]));
    }

    #[test]
    fn test_table_with_separator_unchanged() {
        let input = "| A | B |\n| :--- | ---: |\n| 1 | 2 |";
        assert_eq!(fix_broken_tables(input), input);
    }

    #[test]
    fn test_remove_mid_table_separator() {
        let input = "| A | B |\n| --- | --- |\n| 1 | 2 |\n| --- | --- |\n| 3 | 4 |";
        let result = remove_mid_table_separators(input);
        let sep_count = result.lines().filter(|l| is_separator_row(l)).count();
        assert_eq!(sep_count, 1);
        assert!(result.contains("| 3 | 4 |"));
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Survey\u{200B} No\u{FEFF}. 12\u{00AD}";
        assert_eq!(remove_invisible_chars(input), "Survey No. 12");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("hello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_clean_markdown_full_pipeline() {
        let input = "```markdown\n# Report On Title\r\n\r\nIntro   \n\n\n\n\n\n## I. DESCRIPTION OF THE LANDS\nLands:\n| Survey No. | Extent |\n| 12 | 2 acres |\n```";
        let result = clean_markdown(input);
        assert!(result.starts_with("# Report On Title\n"));
        assert!(result.ends_with("| 12 | 2 acres |\n"));
        assert!(!result.contains("\n\n\n\n"));
        assert!(!result.contains('\r'));
        assert!(result.contains("Lands:\n\n| Survey No. | Extent |\n| --- | --- |\n"));
    }
}
