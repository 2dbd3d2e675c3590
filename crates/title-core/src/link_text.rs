use crate::resolver::DisplayRecord;
use regex::Regex;
use std::sync::LazyLock;

/// An unclosed `[[` before the cursor, with the text typed since.
static OPEN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]|#\n]*)$").unwrap());

static DISPLAY_FORBIDDEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\]|]+").unwrap());

/// An in-progress wikilink being typed on one editor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTrigger {
    /// Byte offset of the opening `[[`.
    pub start: usize,
    /// Byte offset where replacement ends; covers an auto-inserted `]]`.
    pub end: usize,
    /// Text typed after `[[`, used as the search query.
    pub query: String,
}

/// Detect a link being typed at `cursor` (a byte offset into `line`).
pub fn find_link_trigger(line: &str, cursor: usize) -> Option<LinkTrigger> {
    let before = line.get(..cursor)?;
    let caps = OPEN_LINK_RE.captures(before)?;
    let whole = caps.get(0)?;
    let query = caps.get(1).map_or("", |m| m.as_str());

    let end = if line[cursor..].starts_with("]]") {
        cursor + 2
    } else {
        cursor
    };
    Some(LinkTrigger {
        start: whole.start(),
        end,
        query: query.to_string(),
    })
}

/// Link target for a document path: markdown drops its extension, other
/// documents keep theirs so the link stays unambiguous.
pub fn link_target(path: &str) -> &str {
    path.strip_suffix(".md").unwrap_or(path)
}

/// Text usable after `|` in a wikilink.
pub fn sanitize_display(display: &str) -> String {
    let flattened = display.replace(['\n', '\r'], " ");
    DISPLAY_FORBIDDEN_RE
        .replace_all(&flattened, "")
        .trim()
        .to_string()
}

/// `[[target|Display]]` for documents with a custom display name,
/// `[[target]]` otherwise.
pub fn format_wikilink(path: &str, record: Option<&DisplayRecord>) -> String {
    let target = link_target(path);
    match record.filter(|r| r.is_custom_display) {
        Some(record) => {
            let display = sanitize_display(&record.display_name);
            if display.is_empty() || display == target {
                format!("[[{}]]", target)
            } else {
                format!("[[{}|{}]]", target, display)
            }
        }
        None => format!("[[{}]]", target),
    }
}
