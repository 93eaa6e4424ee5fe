//! Index value extraction strategies

use serde_json::Value;

use crate::adapter::{Document, IndexValues};

/// Picks the values stored alongside an id in the index.
pub trait IndexValueExtractor: Send + Sync {
    fn extract(&self, document: &Document) -> IndexValues;
}

/// Extracts nothing. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndexValueExtractor;

impl IndexValueExtractor for NoIndexValueExtractor {
    fn extract(&self, _document: &Document) -> IndexValues {
        IndexValues::new()
    }
}

/// Projects a fixed set of top-level fields; missing fields extract as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIndexValueExtractor {
    fields: Vec<String>,
}

impl FieldIndexValueExtractor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl IndexValueExtractor for FieldIndexValueExtractor {
    fn extract(&self, document: &Document) -> IndexValues {
        self.fields
            .iter()
            .map(|field| (field.clone(), document.get(field).cloned().unwrap_or(Value::Null)))
            .collect()
    }
}

/// Extractor backed by a closure.
pub struct CallbackIndexValueExtractor<F> {
    callback: F,
}

impl<F> CallbackIndexValueExtractor<F>
where
    F: Fn(&Document) -> IndexValues + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> IndexValueExtractor for CallbackIndexValueExtractor<F>
where
    F: Fn(&Document) -> IndexValues + Send + Sync,
{
    fn extract(&self, document: &Document) -> IndexValues {
        (self.callback)(document)
    }
}
