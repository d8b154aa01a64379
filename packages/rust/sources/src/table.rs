//! Markdown pipe-table parsing and cell cleanup.
//!
//! Job lists are published as GitHub-flavored markdown tables whose cells mix
//! markdown and inline HTML. This module only finds tables and normalizes cell
//! text; mapping columns to posting fields is up to each extractor.

use std::sync::LazyLock;

use regex::Regex;

/// A parsed pipe table: header cells plus body rows, all raw (uncleaned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MarkdownTable {
    /// Index of the first header whose cleaned, lowercased text contains any alias.
    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        self.header.iter().position(|h| {
            let label = clean_cell(h).to_lowercase();
            aliases.iter().any(|a| label.contains(a))
        })
    }
}

/// Find every pipe table in `markdown`.
///
/// A table is a header row, a `---` separator row, then zero or more rows,
/// each line starting with `|`. Anything else ends the table.
pub fn parse_tables(markdown: &str) -> Vec<MarkdownTable> {
    let mut tables = Vec::new();
    let mut lines = markdown.lines().map(str::trim).peekable();

    while let Some(line) = lines.next() {
        if !line.starts_with('|') {
            continue;
        }

        let Some(separator) = lines.peek() else {
            break;
        };
        if !is_separator_row(separator) {
            continue;
        }
        lines.next();

        let header = split_row(line);
        let mut rows = Vec::new();
        while let Some(next) = lines.peek() {
            if !next.starts_with('|') {
                break;
            }
            rows.push(split_row(next));
            lines.next();
        }

        tables.push(MarkdownTable { header, rows });
    }

    tables
}

/// Split a `| a | b |` row into trimmed cells, honoring `\|` escapes.
fn split_row(line: &str) -> Vec<String> {
    let inner = line.trim();
    let inner = inner.strip_prefix('|').unwrap_or(inner);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn is_separator_row(line: &str) -> bool {
    static SEP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^:?-{3,}:?$").expect("valid regex"));

    line.starts_with('|') && {
        let cells = split_row(line);
        !cells.is_empty() && cells.iter().all(|c| SEP_RE.is_match(c))
    }
}

/// Reduce a cell to plain text: images, HTML tags, bold markers and link
/// syntax are removed, `<br>` becomes `", "`, whitespace is collapsed.
pub fn clean_cell(cell: &str) -> String {
    static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)<summary>.*?</summary>").expect("valid regex")
    });
    static BR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)</?br\s*/?>").expect("valid regex"));
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
    static IMAGE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let text = SUMMARY_RE.replace_all(cell, "");
    let text = BR_RE.replace_all(&text, ", ");
    let text = TAG_RE.replace_all(&text, "");
    let text = IMAGE_RE.replace_all(&text, "");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = text.replace("**", "").replace("__", "").replace("&amp;", "&");
    let text = WS_RE.replace_all(&text, " ");

    text.trim().trim_matches(',').trim().to_string()
}

/// First link target in a cell: an HTML `href` wins over a markdown link.
pub fn first_link(cell: &str) -> Option<String> {
    static HREF_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("valid regex"));
    static MD_LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\]\((https?://[^)\s]+)\)").expect("valid regex"));

    HREF_RE
        .captures(cell)
        .or_else(|| MD_LINK_RE.captures(cell))
        .map(|caps| caps[1].replace("&amp;", "&"))
}
