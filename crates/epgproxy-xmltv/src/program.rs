//! Programme extraction for one channel and date.

use chrono::NaiveDate;
use serde::Serialize;

use super::scan::{
    SCAN_WINDOW, attribute, element_text, is_self_closing, open_tag, window_after, window_before,
};

/// Start marker of a programme entry.
const PROGRAMME_OPEN: &str = "<programme";
/// End marker of a programme entry.
const PROGRAMME_CLOSE: &str = "</programme>";
/// Upper bound on the size of one programme entry.
const PROGRAMME_BLOCK_LIMIT: usize = 64 * 1024;

/// A programme airing on the requested date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramEntry {
    /// Start time as `HH:MM`.
    pub start: String,
    /// End time as `HH:MM`.
    pub end: String,
    /// Programme title.
    pub title: String,
    /// Programme description, empty when absent.
    pub desc: String,
}

/// Formats a date as the `YYYYMMDD` prefix used by XMLTV timestamps.
#[must_use]
pub fn date_prefix(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Formats an XMLTV timestamp (`YYYYMMDDHHMMSS +zone`) as `HH:MM`.
///
/// Timestamps shorter than 12 characters format to an empty string.
#[must_use]
pub fn format_time(raw: &str) -> String {
    match (raw.get(8..10), raw.get(10..12)) {
        (Some(hour), Some(minute)) => format!("{hour}:{minute}"),
        _ => String::new(),
    }
}

/// Returns every programme of `channel_id` whose start falls on `date`.
///
/// Entries keep document order; nothing is sorted. An empty result is not
/// an error.
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub fn extract_programs(document: &str, channel_id: &str, date: NaiveDate) -> Vec<ProgramEntry> {
    let marker = format!("channel=\"{channel_id}\"");
    let prefix = date_prefix(date);
    let mut programs = Vec::new();

    for (pos, _) in document.match_indices(&marker) {
        let (window_start, before) = window_before(document, pos, SCAN_WINDOW);
        let Some(open_rel) = before.rfind(PROGRAMME_OPEN) else {
            continue;
        };
        // The marker must sit inside the programme start tag itself.
        if before
            .get(open_rel..)
            .is_none_or(|between| between.contains('>'))
        {
            continue;
        }

        let block_start = window_start + open_rel;
        let Some(tag) = open_tag(document, block_start) else {
            continue;
        };
        if is_self_closing(tag) {
            continue;
        }

        let start = attribute(tag, "start").unwrap_or_default();
        if !start.starts_with(&prefix) {
            continue;
        }

        let tail = window_after(document, block_start, PROGRAMME_BLOCK_LIMIT);
        let Some(block) = tail
            .find(PROGRAMME_CLOSE)
            .and_then(|end| tail.get(..end))
        else {
            continue;
        };

        let stop = attribute(tag, "stop").unwrap_or_default();
        programs.push(ProgramEntry {
            start: format_time(start),
            end: format_time(stop),
            title: element_text(block, "title").unwrap_or_default(),
            desc: element_text(block, "desc").unwrap_or_default(),
        });
    }

    tracing::debug!(
        channel_id = %channel_id,
        date = %date,
        count = programs.len(),
        "Programmes extracted"
    );
    programs
}
