//! Resource discovery from the portal's freeform reservation list.
//!
//! The list view renders anchors whose onclick payload carries the only
//! usable label. Nothing about the entries is stable except the number
//! embedded in the label text, so ordering leans on that number and
//! falls back to the label itself.

use std::sync::LazyLock;

use regex::Regex;

use crate::records::Resource;
use crate::text::{embedded_number, normalize};

/// One raw selectable entry as scraped from the list view.
#[derive(Debug, Clone)]
pub struct RawListEntry {
    /// Position in the rendered list, used to re-locate the entry when
    /// clicking it later.
    pub position: usize,
    /// Visible anchor text, often empty.
    pub text: String,
    /// Embedded action descriptor (the onclick payload), when present.
    pub action: Option<String>,
}

static QUOTED_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']*)'").unwrap());

/// Best human label for an entry: the first quoted action-descriptor
/// segment mentioning the target phrase, else the visible text.
fn entry_label(entry: &RawListEntry, phrase_folded: &str) -> String {
    if let Some(action) = &entry.action {
        for caps in QUOTED_SEGMENT_RE.captures_iter(action) {
            let candidate = caps[1].trim();
            if normalize(candidate).contains(phrase_folded) {
                return candidate.to_string();
            }
        }
    }
    entry.text.trim().to_string()
}

/// Resolve raw list entries into the ordered resource directory.
///
/// Entries are filtered to those whose normalized label contains the
/// normalized `phrase`, then sorted by `(stable_key, label, position)`
/// with a missing key sorting last, and finally assigned dense ordinals.
/// Two entries sharing a key resolve by label order; when no entry
/// carries a key at all this degrades to list order.
pub fn resolve_resources(entries: &[RawListEntry], phrase: &str) -> Vec<Resource> {
    let phrase_folded = normalize(phrase);

    let mut matched: Vec<(Option<u32>, String, usize)> = Vec::new();
    for entry in entries {
        let label = entry_label(entry, &phrase_folded);
        if label.is_empty() || !normalize(&label).contains(&phrase_folded) {
            continue;
        }
        matched.push((embedded_number(&label), label, entry.position));
    }

    matched.sort_by(|a, b| {
        (a.0.unwrap_or(u32::MAX), &a.1, a.2).cmp(&(b.0.unwrap_or(u32::MAX), &b.1, b.2))
    });

    matched
        .into_iter()
        .enumerate()
        .map(|(ordinal, (stable_key, label, position))| Resource {
            ordinal,
            label,
            stable_key,
            position,
        })
        .collect()
}
