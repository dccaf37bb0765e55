//! Bounded substring helpers shared by the channel and programme scanners.
//!
//! Every helper works on `&str` slices of the raw document and never looks
//! further than the window it is given.

use std::borrow::Cow;

/// Maximum distance scanned backwards or forwards around a match.
pub const SCAN_WINDOW: usize = 500;

/// Prefix wrapping unparsed character data.
const CDATA_OPEN: &str = "<![CDATA[";
/// Suffix wrapping unparsed character data.
const CDATA_CLOSE: &str = "]]>";

/// Returns the window of at most `window` bytes that ends at `end`, together
/// with the absolute offset where it starts.
pub fn window_before(doc: &str, end: usize, window: usize) -> (usize, &str) {
    let end = doc.floor_char_boundary(end);
    let start = doc.ceil_char_boundary(end.saturating_sub(window));
    (start, doc.get(start..end).unwrap_or_default())
}

/// Returns the window of at most `window` bytes that starts at `start`.
pub fn window_after(doc: &str, start: usize, window: usize) -> &str {
    let start = doc.ceil_char_boundary(start);
    let end = doc.floor_char_boundary(start.saturating_add(window));
    doc.get(start..end).unwrap_or_default()
}

/// Finds every offset where the start tag `<name` begins.
///
/// Offsets where `<name` is only a prefix of a longer tag name are skipped.
pub fn tag_starts<'a>(haystack: &'a str, open: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack
        .match_indices(open)
        .map(|(pos, _)| pos)
        .filter(move |&pos| {
            haystack
                .get(pos..)
                .and_then(|rest| rest.get(open.len()..))
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
        })
}

/// Returns the start tag beginning at `pos`, up to and including `>`.
pub fn open_tag(haystack: &str, pos: usize) -> Option<&str> {
    let rest = haystack.get(pos..)?;
    let end = rest.find('>')?;
    rest.get(..=end)
}

/// Returns `true` if a start tag closes itself (`<icon ... />`).
pub fn is_self_closing(tag: &str) -> bool {
    tag.trim_end_matches('>').trim_end().ends_with('/')
}

/// Reads a quoted attribute value from a start tag.
///
/// The attribute name must be preceded by whitespace, so `start` never
/// matches inside `restart`.
#[allow(clippy::arithmetic_side_effects)]
pub fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut from = 0;
    while let Some(found) = tag.get(from..)?.find(name) {
        let at = from + found;
        let after = at + name.len();
        let preceded_by_space = tag
            .get(..at)
            .and_then(|head| head.chars().next_back())
            .is_some_and(char::is_whitespace);

        if preceded_by_space
            && let Some(value) = tag
                .get(after..)
                .and_then(|rest| rest.trim_start().strip_prefix('='))
                .map(str::trim_start)
            && let Some(quote) = value.chars().next()
            && (quote == '"' || quote == '\'')
        {
            let body = value.get(1..)?;
            let close = body.find(quote)?;
            return body.get(..close);
        }
        from = after;
    }
    None
}

/// Returns the cleaned text of the first `<name>...</name>` element.
pub fn element_text(haystack: &str, name: &str) -> Option<String> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let pos = tag_starts(haystack, &open).next()?;
    let tag = open_tag(haystack, pos)?;
    if is_self_closing(tag) {
        return Some(String::new());
    }

    let body = haystack.get(pos.saturating_add(tag.len())..)?;
    let end = body.find(&close)?;
    body.get(..end).map(text_content)
}

/// Trims element text, unwrapping CDATA or decoding XML entities.
pub fn text_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        return inner.trim().to_owned();
    }
    decode_entities(trimmed).trim().to_owned()
}

/// Decodes XML entities, leaving the text as-is when it is malformed.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}
