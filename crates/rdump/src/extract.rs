//! 🔍 The Record Extractor: one line in, one destination key out.
//!
//! Every input line is searched for an embedded resource link
//! (`href="[pips-host:/pips/api/v1/<path>/]"`). The captured path, with every
//! `/` swapped for `_`, becomes the record's destination key. No link? The line
//! gets a number from the fallback counter instead, and a warning gets logged
//! with the first 100 characters so somebody can go squint at it later.
//!
//! 🧠 Knowledge graph:
//! - Keys are content-derived, so reloading the same file lands on the same keys
//!   (overwrites, not duplicates).
//! - The fallback counter is the only shared state. It lives inside the
//!   [`Extractor`], which the supervisor hands to every reader behind an `Arc`.
//! - The grouping tag is the key up to its first `_`.
//!
//! 🦆 The duck checked every href. The duck found most of them.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

/// 🎯 The resource-link pattern. Group 1 is the slash-delimited path.
pub const DEFAULT_LINK_PATTERN: &str =
    r#"^.*? href="\[pips-host:(?:/pips)?/?api/v1/([^"]+)/\]""#;

// -- 📏 how much of an unmatched line makes it into the log
const PREVIEW_CHARS: usize = 100;

/// 🏷️ What the extractor figured out about a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub destination_key: String,
    pub grouping_tag: String,
}

/// 🔍 Derives destination keys from lines. Safe to share across every reader thread.
#[derive(Debug)]
pub struct Extractor {
    link_pattern: Regex,
    // -- 🔢 last fallback id handed out. 0 means "nobody has missed yet"
    fallback_ids: AtomicU64,
}

impl Extractor {
    /// 🚀 An extractor using [`DEFAULT_LINK_PATTERN`].
    pub fn new() -> Result<Self> {
        Self::with_pattern(DEFAULT_LINK_PATTERN)
    }

    /// 🔧 An extractor with a custom link pattern. The first capture group is the path.
    ///
    /// Fails if the pattern doesn't compile or has no capture group, because a
    /// pattern that can't capture would quietly send every record to the fallback.
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        let link_pattern = Regex::new(pattern).with_context(|| {
            format!("💀 The link pattern '{pattern}' is not a regex the regex crate recognizes. It tried. It squinted. No.")
        })?;
        if link_pattern.captures_len() < 2 {
            anyhow::bail!(
                "💀 The link pattern '{pattern}' has no capture group, so there is nothing to turn into a destination key. Wrap the path part in (...)."
            );
        }
        Ok(Self {
            link_pattern,
            fallback_ids: AtomicU64::new(0),
        })
    }

    /// 🔄 Derive the destination key and grouping tag for one line. Never fails.
    pub fn extract(&self, line: &str) -> Extracted {
        let destination_key = match self.link_pattern.captures(line).and_then(|c| c.get(1)) {
            Some(path) => path.as_str().replace('/', "_"),
            None => {
                warn!("no uri: {}", preview(line));
                // -- ✅ fetch_add hands back the old value; ids start at 1
                (self.fallback_ids.fetch_add(1, Ordering::Relaxed) + 1).to_string()
            }
        };
        let grouping_tag = grouping_tag_of(&destination_key).to_string();
        Extracted {
            destination_key,
            grouping_tag,
        }
    }
}

/// 📂 Everything before the first underscore. No underscore, no trimming.
pub fn grouping_tag_of(destination_key: &str) -> &str {
    match destination_key.find('_') {
        Some(idx) => &destination_key[..idx],
        None => destination_key,
    }
}

// -- ✂️ first 100 chars, counted in chars so we never slice a code point in half
fn preview(line: &str) -> &str {
    match line.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
