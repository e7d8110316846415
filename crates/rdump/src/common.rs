//! 📦 Common data structures, the building blocks of rdump.
//!
//! 🎬 INT. A GZIP FILE, 3:47 AM. A line of markup wakes up, gets a name
//! from the extractor, climbs into a [`RecordBatch`] with 499 strangers, and
//! rides the dispatcher all the way to the document store. It never comes back.
//! Lines never come back. That's the deal.
//!
//! These structs ferry records from the reader tasks to the writer workers.
//! They don't ask questions. They carry the data.

use serde::{Deserialize, Serialize};

/// 🎯 A singular `Record`: one input line plus the names we derived for it.
///
/// Immutable once the extractor hands it over. Owned by exactly one batch
/// until that batch is written (or fails to be, which is also a kind of closure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    /// 🏷️ Where the record lands in the store. Content-derived, or a fallback counter value.
    pub destination_key: String,
    /// 📂 The coarse category: destination key up to its first underscore.
    pub grouping_tag: String,
    /// 📜 The line exactly as read, untouched. We don't validate. We just carry.
    pub payload: String,
}

/// 📦 A `RecordBatch`: an ordered, bounded run of records from a single file.
///
/// Never split, never merged. Filled by one reader, dispatched whole, written whole.
/// Like a carpool with a strict seat limit and no detours.
/// 🧮 Most records a fresh batch reserves room for before any arrive.
const MAX_PREALLOCATED_RECORDS: usize = 1024;

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordBatch {
    pub records: Vec<Record>,
    capacity: usize,
}

impl RecordBatch {
    /// 🏗️ An empty batch that considers itself full at `capacity` records.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity.min(MAX_PREALLOCATED_RECORDS)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// ✅ Time to ship? Readers dispatch the moment this flips to true.
    pub(crate) fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// 🔄 Turn the batch into store-ready [`Content`], preserving file order.
    ///
    /// Consumes the batch: once it's headed for the store the reader has no
    /// business touching it again.
    pub(crate) fn into_contents(self, format: DocumentFormat) -> Vec<Content> {
        self.records
            .into_iter()
            .map(|record| Content::from_record(record, format))
            .collect()
    }
}

/// 📄 Which document format the store should treat the payload as.
///
/// The loader only ever writes one format per run (XML unless configured otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Xml,
    Json,
    Text,
    Binary,
}

/// 📨 The unit the store's batch insert understands.
///
/// Built from a [`Record`]: the destination key becomes the `uri`, the
/// grouping tag becomes the single collection, the payload rides along as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Content {
    pub uri: String,
    pub content: String,
    pub format: DocumentFormat,
    pub collections: Vec<String>,
}

impl Content {
    pub(crate) fn from_record(record: Record, format: DocumentFormat) -> Self {
        Self {
            uri: record.destination_key,
            content: record.payload,
            format,
            collections: vec![record.grouping_tag],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_record(key: &str, tag: &str, payload: &str) -> Record {
        Record {
            destination_key: key.to_string(),
            grouping_tag: tag.to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn the_one_where_the_batch_knows_when_the_carpool_is_full() {
        let mut batch = RecordBatch::with_capacity(2);
        assert!(batch.is_empty());
        assert!(!batch.is_full());

        batch.push(a_record("a_1", "a", "one"));
        assert!(!batch.is_full());
        batch.push(a_record("a_2", "a", "two"));
        assert!(batch.is_full());
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn the_one_where_a_huge_capacity_does_not_reserve_a_huge_vec() {
        let mut batch = RecordBatch::with_capacity(usize::MAX);
        assert!(batch.records.capacity() <= MAX_PREALLOCATED_RECORDS);

        batch.push(a_record("a_1", "a", "one"));
        assert!(!batch.is_full());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn the_one_where_records_become_content_in_file_order() {
        let mut batch = RecordBatch::with_capacity(3);
        batch.push(a_record("foo_bar", "foo", "<a/>"));
        batch.push(a_record("17", "17", "plain"));

        let contents = batch.into_contents(DocumentFormat::Xml);

        assert_eq!(
            contents,
            vec![
                Content {
                    uri: "foo_bar".to_string(),
                    content: "<a/>".to_string(),
                    format: DocumentFormat::Xml,
                    collections: vec!["foo".to_string()],
                },
                Content {
                    uri: "17".to_string(),
                    content: "plain".to_string(),
                    format: DocumentFormat::Xml,
                    collections: vec!["17".to_string()],
                },
            ]
        );
    }

    #[test]
    fn the_one_where_content_serializes_with_a_lowercase_format() {
        let content = Content::from_record(a_record("x_y", "x", "hi"), DocumentFormat::Xml);
        let json = serde_json::to_string(&content).expect("💀 Content should serialize");
        assert_eq!(
            json,
            r#"{"uri":"x_y","content":"hi","format":"xml","collections":["x"]}"#
        );
    }
}
