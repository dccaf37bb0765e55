//! Channel resolution against a raw XMLTV document.

use serde::Serialize;

use super::alias::AliasIndex;
use super::scan::{
    SCAN_WINDOW, attribute, decode_entities, element_text, is_self_closing, open_tag, tag_starts,
    window_after, window_before,
};

/// Start marker of a channel declaration.
const CHANNEL_OPEN: &str = "<channel";
/// End marker of a channel declaration.
const CHANNEL_CLOSE: &str = "</channel>";
/// Start marker of a display name.
const DISPLAY_NAME_OPEN: &str = "<display-name";
/// Start marker of a channel icon.
const ICON_OPEN: &str = "<icon";
/// Upper bound on the size of one channel declaration.
const CHANNEL_BLOCK_LIMIT: usize = 8 * 1024;

/// A channel found in a guide document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMatch {
    /// XMLTV channel `id` attribute.
    pub id: String,
    /// Display name that matched the query.
    pub display_name: String,
    /// Icon URL, empty when the channel has none.
    pub icon_url: String,
}

/// Resolves a user-typed channel name to a channel declared in `document`.
///
/// An exact, case-insensitive display-name match wins outright. Otherwise
/// every declaration is compared by canonical key and the first one in
/// document order is returned.
#[must_use]
pub fn resolve_channel(document: &str, raw_query: &str, aliases: &AliasIndex) -> Option<ChannelMatch> {
    find_exact(document, raw_query).or_else(|| find_normalized(document, raw_query, aliases))
}

/// Lists every channel declaration in document order.
///
/// `display_name` is the first display name of each channel.
#[must_use]
pub fn list_channels(document: &str) -> Vec<ChannelMatch> {
    channel_blocks(document)
        .map(|block| ChannelMatch {
            id: block.id,
            display_name: block.display_names.into_iter().next().unwrap_or_default(),
            icon_url: block.icon_url,
        })
        .collect()
}

/// Looks for a display name equal to the query, then reads the enclosing
/// channel's id and icon from bounded windows around it.
#[allow(clippy::arithmetic_side_effects)]
fn find_exact(document: &str, raw_query: &str) -> Option<ChannelMatch> {
    let wanted = raw_query.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    for pos in tag_starts(document, DISPLAY_NAME_OPEN) {
        let Some(name) = element_text(window_after(document, pos, SCAN_WINDOW), "display-name")
        else {
            continue;
        };
        if name.to_lowercase() != wanted {
            continue;
        }

        let (window_start, before) = window_before(document, pos, SCAN_WINDOW);
        let Some(channel_rel) = before.rfind(CHANNEL_OPEN) else {
            continue;
        };
        if before
            .get(channel_rel..)
            .is_some_and(|between| between.contains(CHANNEL_CLOSE))
        {
            continue;
        }
        let Some(id) = open_tag(document, window_start + channel_rel)
            .and_then(|tag| attribute(tag, "id"))
        else {
            continue;
        };

        let after = window_after(document, pos, SCAN_WINDOW);
        let scope = after
            .find(CHANNEL_CLOSE)
            .and_then(|end| after.get(..end))
            .unwrap_or(after);

        tracing::debug!(channel_id = %id, query = %raw_query, "Exact display-name match");
        return Some(ChannelMatch {
            id: id.to_owned(),
            display_name: name,
            icon_url: icon_src(scope),
        });
    }

    None
}

/// Compares canonical keys of every declared display name.
fn find_normalized(document: &str, raw_query: &str, aliases: &AliasIndex) -> Option<ChannelMatch> {
    let wanted = aliases.normalize(raw_query);
    if wanted.is_empty() {
        return None;
    }

    let found = channel_blocks(document).find_map(|block| {
        let name = block
            .display_names
            .into_iter()
            .find(|name| aliases.normalize(name) == wanted)?;
        Some(ChannelMatch {
            id: block.id,
            display_name: name,
            icon_url: block.icon_url,
        })
    });

    if let Some(ref channel) = found {
        tracing::debug!(
            channel_id = %channel.id,
            query = %raw_query,
            key = %wanted,
            "Normalized display-name match"
        );
    }
    found
}

/// One parsed channel declaration.
struct ChannelBlock {
    id: String,
    display_names: Vec<String>,
    icon_url: String,
}

/// Iterates channel declarations in document order.
fn channel_blocks(document: &str) -> impl Iterator<Item = ChannelBlock> + '_ {
    tag_starts(document, CHANNEL_OPEN).filter_map(move |pos| {
        let tag = open_tag(document, pos)?;
        if is_self_closing(tag) {
            return None;
        }
        let id = attribute(tag, "id")?.to_owned();

        let tail = window_after(document, pos.saturating_add(tag.len()), CHANNEL_BLOCK_LIMIT);
        let body = tail
            .find(CHANNEL_CLOSE)
            .and_then(|end| tail.get(..end))
            .unwrap_or(tail);

        let display_names = tag_starts(body, DISPLAY_NAME_OPEN)
            .filter_map(|name_pos| body.get(name_pos..))
            .filter_map(|rest| element_text(rest, "display-name"))
            .filter(|name| !name.is_empty())
            .collect();

        Some(ChannelBlock {
            id,
            display_names,
            icon_url: icon_src(body),
        })
    })
}

/// Reads the `src` of the first `<icon>` in `scope`.
fn icon_src(scope: &str) -> String {
    tag_starts(scope, ICON_OPEN)
        .next()
        .and_then(|pos| open_tag(scope, pos))
        .and_then(|tag| attribute(tag, "src"))
        .map(|src| decode_entities(src).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    const GUIDE: &str = include_str!("../../../fixtures/xmltv/guide.xml");

    fn aliases() -> AliasIndex {
        AliasIndex::builtin().unwrap()
    }

    #[test]
    fn test_exact_match_returns_id_and_icon() {
        // Arrange & Act
        let channel = resolve_channel(GUIDE, "CCTV1", &aliases()).unwrap();

        // Assert
        assert_eq!(
            channel,
            ChannelMatch {
                id: String::from("c1"),
                display_name: String::from("CCTV1"),
                icon_url: String::from("https://example.com/logo/cctv1.png"),
            }
        );
    }

    #[test]
    fn test_exact_match_is_case_insensitive_and_trimmed() {
        // Arrange & Act
        let channel = resolve_channel(GUIDE, "  hunan tv ", &aliases()).unwrap();

        // Assert
        assert_eq!(channel.id, "hunan");
        assert_eq!(channel.display_name, "Hunan TV");
        assert_eq!(channel.icon_url, "");
    }

    #[test]
    fn test_plus_channel_is_not_confused() {
        // Arrange
        let aliases = aliases();

        // Act
        let plain = resolve_channel(GUIDE, "CCTV5", &aliases).unwrap();
        let plus = resolve_channel(GUIDE, "CCTV5+", &aliases).unwrap();
        let spaced_plus = resolve_channel(GUIDE, "cctv 5+", &aliases).unwrap();

        // Assert
        assert_eq!(plain.id, "c5");
        assert_eq!(plus.id, "c5p");
        assert_eq!(spaced_plus.id, "c5p");
    }

    #[test]
    fn test_spelling_variants_fall_back_to_normalized_match() {
        // Arrange
        let aliases = aliases();

        // Act & Assert
        for raw in ["CCTV-1", "CCTV 1", "cctv1", "央视一套"] {
            let channel = resolve_channel(GUIDE, raw, &aliases).unwrap();
            assert_eq!(channel.id, "c1", "raw = {raw}");
        }
    }

    #[test]
    fn test_alias_and_noise_suffix_match() {
        // Arrange
        let aliases = aliases();

        // Act
        let hunan = resolve_channel(GUIDE, "湖南台", &aliases).unwrap();
        let news = resolve_channel(GUIDE, "CCTV13", &aliases).unwrap();

        // Assert
        assert_eq!(hunan.id, "hunan");
        assert_eq!(hunan.display_name, "湖南卫视高清");
        assert_eq!(news.id, "news");
        assert_eq!(news.icon_url, "https://example.com/logo/news.png?size=64&fmt=png");
    }

    #[test]
    fn test_unknown_channel_is_not_found() {
        // Arrange & Act & Assert
        assert_eq!(resolve_channel(GUIDE, "Nonexistent TV", &aliases()), None);
        assert_eq!(resolve_channel(GUIDE, "   ", &aliases()), None);
    }

    #[test]
    fn test_first_match_in_document_order_wins() {
        // Arrange
        let doc = r#"<tv>
  <channel id="first"><display-name>CCTV-1</display-name></channel>
  <channel id="second"><display-name>CCTV 1 HD</display-name></channel>
</tv>"#;

        // Act
        let channel = resolve_channel(doc, "cctv1综合", &aliases()).unwrap();

        // Assert
        assert_eq!(channel.id, "first");
    }

    #[test]
    fn test_exact_match_ignores_unclosed_window() {
        // Arrange: the display name sits outside any channel declaration
        let doc = r#"<tv><channel id="x"><display-name>Other</display-name></channel>
<display-name>Orphan</display-name></tv>"#;

        // Act & Assert
        assert_eq!(resolve_channel(doc, "Orphan", &AliasIndex::default()), None);
    }

    #[test]
    fn test_list_channels_in_document_order() {
        // Arrange & Act
        let channels = list_channels(GUIDE);

        // Assert
        let ids: Vec<&str> = channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c5", "c5p", "hunan", "news"]);
        assert_eq!(channels[3].display_name, "湖南卫视高清");
        assert_eq!(channels[2].icon_url, "https://example.com/logo/cctv5p.png");
    }

    #[test]
    fn test_malformed_document_does_not_panic() {
        // Arrange
        let docs = [
            "",
            "<channel",
            "<channel id=\"a\"><display-name>A",
            "<display-name>CCTV1</display-name>",
            "<channel id=\"a\"/><channel id=\"b\"><display-name>B</display-name>",
        ];

        // Act & Assert
        for doc in docs {
            let _ = resolve_channel(doc, "CCTV1", &aliases());
            let _ = list_channels(doc);
        }
    }
}
