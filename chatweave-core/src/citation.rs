//! Citation annotation
//!
//! Rewrites message text by splicing `[i1,i2,...](@ref)` markers at the
//! character offsets given by citation tags. Tags sharing a position are
//! combined into a single marker.
//!
//! Markers are spliced from the highest offset down: an insertion only shifts
//! text after its own position, so every not-yet-processed (lower) offset
//! stays valid. Annotating already annotated text is not supported; callers
//! must annotate each tag set exactly once.

use crate::types::{QuoteInfo, Reference};

/// Tags that share one position, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationGroup {
    /// Character offset into the original content
    pub position: usize,
    /// Reference ordinals cited at this position
    pub indices: Vec<i64>,
    /// Metadata for each ordinal, when a matching reference was known
    pub sources: Vec<Option<Reference>>,
}

impl CitationGroup {
    /// The inline marker for this group, e.g. `[1,2](@ref)`
    pub fn marker(&self) -> String {
        let ids: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
        format!("[{}](@ref)", ids.join(","))
    }
}

/// Result of annotating a piece of content
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    pub content: String,
    /// Groups in the order they were spliced (descending position)
    pub groups: Vec<CitationGroup>,
}

/// Group tags by position, resolving each ordinal against `references`
/// (`reference.id == index`), and sort the groups by position descending.
pub fn group_tags(tags: &[QuoteInfo], references: &[Reference]) -> Vec<CitationGroup> {
    let mut groups: Vec<CitationGroup> = Vec::new();

    for tag in tags {
        let index_id = tag.index.to_string();
        let source = references.iter().find(|r| r.id == index_id).cloned();

        match groups.iter_mut().find(|g| g.position == tag.position) {
            Some(group) => {
                group.indices.push(tag.index);
                group.sources.push(source);
            }
            None => groups.push(CitationGroup {
                position: tag.position,
                indices: vec![tag.index],
                sources: vec![source],
            }),
        }
    }

    // Stable sort keeps arrival order for equal positions
    groups.sort_by(|a, b| b.position.cmp(&a.position));
    groups
}

/// Annotate `content` with citation markers.
///
/// Positions are character (not byte) offsets. A position past the end of
/// the content is clamped to the end rather than rejected.
pub fn annotate(content: &str, tags: &[QuoteInfo], references: &[Reference]) -> Annotated {
    if tags.is_empty() {
        return Annotated {
            content: content.to_string(),
            groups: Vec::new(),
        };
    }

    let groups = group_tags(tags, references);
    let char_len = content.chars().count();
    let mut result = content.to_string();

    for group in &groups {
        let position = if group.position > char_len {
            tracing::warn!(
                position = group.position,
                content_len = char_len,
                "Citation offset past end of content, clamping"
            );
            char_len
        } else {
            group.position
        };

        // Offsets below `position` are untouched by earlier (higher) splices,
        // so the byte index can be computed on the partially annotated text.
        let byte_index = byte_offset(&result, position);
        result.insert_str(byte_index, &group.marker());
    }

    Annotated {
        content: result,
        groups,
    }
}

/// Byte index of the `char_pos`-th character, or the end of the string.
fn byte_offset(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
