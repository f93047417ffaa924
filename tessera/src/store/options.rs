use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

use crate::common::{Document, Value, DOC_ID, LOB_METADATA};

/// Sort direction of a [FindOptions] sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Maps an index order (`1` / `-1`) to a sort order.
    pub fn from_index_order(order: i32) -> SortOrder {
        if order < 0 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

/// Sort, paging and projection options for a store read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    sort_by: Vec<(String, SortOrder)>,
    skip: Option<usize>,
    limit: Option<usize>,
    projection: Option<Vec<String>>,
}

impl FindOptions {
    pub fn new() -> FindOptions {
        FindOptions::default()
    }

    pub fn sort_by(mut self, field_name: &str, sort_order: SortOrder) -> FindOptions {
        self.sort_by.push((field_name.to_string(), sort_order));
        self
    }

    pub fn skip(mut self, skip: usize) -> FindOptions {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: usize) -> FindOptions {
        self.limit = Some(limit);
        self
    }

    /// Restricts returned documents to `fields` plus `_id`.
    pub fn project(mut self, fields: Vec<&str>) -> FindOptions {
        self.projection = Some(fields.into_iter().map(str::to_string).collect());
        self
    }

    pub fn get_sort_by(&self) -> &[(String, SortOrder)] {
        &self.sort_by
    }

    pub fn get_skip(&self) -> Option<usize> {
        self.skip
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn get_projection(&self) -> Option<&[String]> {
        self.projection.as_deref()
    }

    /// Orders two documents by the configured sort keys. A missing field
    /// sorts as `Null`.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, order) in &self.sort_by {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = match order {
                SortOrder::Ascending => left.cmp(right),
                SortOrder::Descending => right.cmp(left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Applies sort, skip, limit and projection to `documents`.
    pub fn apply(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if !self.sort_by.is_empty() {
            documents.sort_by(|a, b| self.compare(a, b));
        }

        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        let paged = documents.into_iter().skip(skip).take(limit);

        match &self.projection {
            None => paged.collect(),
            Some(fields) => paged
                .map(|doc| {
                    let mut projected = Document::new();
                    for field in std::iter::once(DOC_ID).chain(fields.iter().map(String::as_str)) {
                        if let Some(value) = doc.get(field) {
                            // fields came from the document, so the key is valid
                            let _ = projected.put(field, value.clone());
                        }
                    }
                    projected
                })
                .collect(),
        }
    }
}

/// Result of a raw script evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptResult {
    /// A single document, or `None` when nothing matched.
    Document(Option<Document>),
    Documents(Vec<Document>),
    /// A list of raw values, e.g. the output of `distinct`.
    Values(Vec<Value>),
    Scalar(Value),
}

/// Hex encoded SHA-256 digest of `content`.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A binary payload stored in a large-object bucket.
///
/// The content hash is computed on construction. `file_id` stays `Null`
/// until the store assigns one.
#[derive(Clone, PartialEq)]
pub struct LargeObject {
    file_id: Value,
    filename: String,
    content: Vec<u8>,
    content_hash: String,
    metadata: Document,
    upload_date: DateTime<Utc>,
}

impl LargeObject {
    pub fn new(filename: &str, content: Vec<u8>, metadata: Document) -> Self {
        LargeObject {
            file_id: Value::Null,
            filename: filename.to_string(),
            content_hash: content_hash(&content),
            content,
            metadata,
            upload_date: Utc::now(),
        }
    }

    pub fn with_file_id(mut self, file_id: Value) -> Self {
        self.file_id = file_id;
        self
    }

    pub fn file_id(&self) -> &Value {
        &self.file_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn metadata(&self) -> &Document {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Document) {
        self.metadata = metadata;
    }

    pub fn upload_date(&self) -> &DateTime<Utc> {
        &self.upload_date
    }

    pub fn length(&self) -> usize {
        self.content.len()
    }

    /// Whether `content` hashes to the same digest as this object.
    pub fn has_same_content(&self, content: &[u8]) -> bool {
        self.content_hash == content_hash(content)
    }

    /// The file description filters are evaluated against:
    /// `_id`, `filename`, `length`, `content_hash`, `upload_date`, `metadata`.
    pub fn file_document(&self) -> Document {
        let mut doc = Document::new();
        let fields: [(&str, Value); 6] = [
            (DOC_ID, self.file_id.clone()),
            ("filename", Value::from(self.filename.as_str())),
            ("length", Value::from(self.content.len())),
            ("content_hash", Value::from(self.content_hash.as_str())),
            ("upload_date", Value::from(self.upload_date.to_rfc3339())),
            (LOB_METADATA, Value::Document(self.metadata.clone())),
        ];
        for (key, value) in fields {
            let _ = doc.put(key, value);
        }
        doc
    }
}

impl Debug for LargeObject {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeObject")
            .field("file_id", &self.file_id)
            .field("filename", &self.filename)
            .field("length", &self.content.len())
            .field("content_hash", &self.content_hash)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn people() -> Vec<Document> {
        vec![
            doc! { _id: 1, name: "carol", age: 40 },
            doc! { _id: 2, name: "alice", age: 30 },
            doc! { _id: 3, name: "bob", age: 30 },
        ]
    }

    #[test]
    fn test_sort_by_multiple_keys() {
        let options = FindOptions::new()
            .sort_by("age", SortOrder::Descending)
            .sort_by("name", SortOrder::Ascending);
        let sorted = options.apply(people());
        let ids: Vec<&Value> = sorted.iter().filter_map(|d| d.id()).collect();
        assert_eq!(ids, vec![&Value::I32(1), &Value::I32(2), &Value::I32(3)]);
    }

    #[test]
    fn test_skip_and_limit() {
        let options = FindOptions::new()
            .sort_by("_id", SortOrder::Ascending)
            .skip(1)
            .limit(1);
        let page = options.apply(people());
        assert_eq!(page, vec![doc! { _id: 2, name: "alice", age: 30 }]);
    }

    #[test]
    fn test_projection_keeps_id() {
        let options = FindOptions::new().project(vec!["name"]).limit(1);
        let projected = options.apply(people());
        assert_eq!(projected, vec![doc! { _id: 1, name: "carol" }]);
    }

    #[test]
    fn test_missing_sort_field_sorts_first() {
        let docs = vec![doc! { _id: 1, rank: 2 }, doc! { _id: 2 }];
        let sorted = FindOptions::new().sort_by("rank", SortOrder::Ascending).apply(docs);
        assert_eq!(sorted[0].id(), Some(&Value::I32(2)));
    }

    #[test]
    fn test_sort_order_from_index_order() {
        assert_eq!(SortOrder::from_index_order(1), SortOrder::Ascending);
        assert_eq!(SortOrder::from_index_order(-1), SortOrder::Descending);
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_large_object_file_document() {
        let object = LargeObject::new("photo.png", vec![1, 2, 3], doc! { id: 7 })
            .with_file_id(Value::from("f-1"));
        let file = object.file_document();
        assert_eq!(file.id(), Some(&Value::from("f-1")));
        assert_eq!(file.get("length"), Some(&Value::U64(3)));
        assert_eq!(file.get("metadata.id"), Some(&Value::I32(7)));
        assert!(object.has_same_content(&[1, 2, 3]));
        assert!(!object.has_same_content(&[3, 2, 1]));
    }
}
