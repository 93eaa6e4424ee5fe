//! Document filters and index pre-filters
//!
//! A [`DocumentFilter`] decides whether a materialized document is part of a
//! `read_all` result. A filter may additionally expose an [`IndexPreFilter`],
//! which lets an indexing adapter reject candidates from their extracted
//! index values alone, before the document body is ever read.

use serde_json::{Map, Value};

use super::document::{Document, DocumentId};

/// Values extracted from a document for its index entry.
pub type IndexValues = Map<String, Value>;

/// Rejects index entries without reading the document body.
pub trait IndexPreFilter: Send + Sync {
    fn includes_index_values(&self, values: &IndexValues) -> bool;
}

/// Decides whether a document is included in a listing.
pub trait DocumentFilter: Send + Sync {
    fn includes(&self, id: &DocumentId, document: &Document) -> bool;

    /// Index pre-filter capability, if this filter has one.
    fn index_pre_filter(&self) -> Option<&dyn IndexPreFilter> {
        None
    }
}

/// Includes every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl DocumentFilter for AcceptAll {
    fn includes(&self, _id: &DocumentId, _document: &Document) -> bool {
        true
    }
}

/// Document filter backed by a closure.
pub struct CallbackFilter<F> {
    callback: F,
}

impl<F> CallbackFilter<F>
where
    F: Fn(&DocumentId, &Document) -> bool + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> DocumentFilter for CallbackFilter<F>
where
    F: Fn(&DocumentId, &Document) -> bool + Send + Sync,
{
    fn includes(&self, id: &DocumentId, document: &Document) -> bool {
        (self.callback)(id, document)
    }
}

/// Document filter with an index pre-filter, both backed by closures.
pub struct CallbackIndexPreFilter<D, I> {
    document: D,
    index: I,
}

impl<D, I> CallbackIndexPreFilter<D, I>
where
    D: Fn(&DocumentId, &Document) -> bool + Send + Sync,
    I: Fn(&IndexValues) -> bool + Send + Sync,
{
    pub fn new(document: D, index: I) -> Self {
        Self { document, index }
    }
}

impl<D, I> IndexPreFilter for CallbackIndexPreFilter<D, I>
where
    D: Fn(&DocumentId, &Document) -> bool + Send + Sync,
    I: Fn(&IndexValues) -> bool + Send + Sync,
{
    fn includes_index_values(&self, values: &IndexValues) -> bool {
        (self.index)(values)
    }
}

impl<D, I> DocumentFilter for CallbackIndexPreFilter<D, I>
where
    D: Fn(&DocumentId, &Document) -> bool + Send + Sync,
    I: Fn(&IndexValues) -> bool + Send + Sync,
{
    fn includes(&self, id: &DocumentId, document: &Document) -> bool {
        (self.document)(id, document)
    }

    fn index_pre_filter(&self) -> Option<&dyn IndexPreFilter> {
        Some(self)
    }
}

/// Matches documents whose top-level `field` equals `value`.
///
/// Acts as an index pre-filter when the field is among the extracted
/// index values; an entry without the field is kept for the body check.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEquals {
    field: String,
    value: Value,
}

impl FieldEquals {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl IndexPreFilter for FieldEquals {
    fn includes_index_values(&self, values: &IndexValues) -> bool {
        match values.get(&self.field) {
            Some(v) => *v == self.value,
            None => true,
        }
    }
}

impl DocumentFilter for FieldEquals {
    fn includes(&self, _id: &DocumentId, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }

    fn index_pre_filter(&self) -> Option<&dyn IndexPreFilter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_accept_all_has_no_pre_filter() {
        let id = DocumentId::from(1);
        assert!(AcceptAll.includes(&id, &Document::new()));
        assert!(AcceptAll.index_pre_filter().is_none());
    }

    #[test]
    fn test_callback_index_pre_filter_exposes_both_predicates() {
        let filter = CallbackIndexPreFilter::new(
            |_id: &DocumentId, d: &Document| d.contains_key("group"),
            |v: &IndexValues| v.get("type") == Some(&json!("foo")),
        );
        let pre = filter.index_pre_filter().unwrap();
        assert!(pre.includes_index_values(&doc(json!({"type": "foo"}))));
        assert!(!pre.includes_index_values(&doc(json!({"type": "bar"}))));
        assert!(filter.includes(&DocumentId::from(1), &doc(json!({"group": 1}))));
    }

    #[test]
    fn test_field_equals() {
        let filter = FieldEquals::new("type", "foo");
        let id = DocumentId::from(1);
        assert!(filter.includes(&id, &doc(json!({"type": "foo"}))));
        assert!(!filter.includes(&id, &doc(json!({"type": "bar"}))));
        assert!(!filter.includes(&id, &doc(json!({}))));

        let pre = filter.index_pre_filter().unwrap();
        assert!(!pre.includes_index_values(&doc(json!({"type": "bar"}))));
        // Field not extracted: cannot reject from the index
        assert!(pre.includes_index_values(&doc(json!({}))));
    }
}
