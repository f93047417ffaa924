use im::OrdMap;

use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

/// A store document: an ordered map of field names to [Value]s.
///
/// Keys containing the field separator (`.`) address embedded documents,
/// so `doc.get("address.city")` reads the `city` field of the nested
/// `address` document. The `_id` field holds the primary key of the
/// entity the document was mapped from. Compound keys are stored as an
/// embedded document under `_id`.
///
/// Cloning is cheap: the underlying `im::OrdMap` shares structure between
/// clones.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: OrdMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of top-level fields.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`, creating intermediate embedded
    /// documents for dotted keys.
    ///
    /// # Errors
    ///
    /// Fails if the key is empty, or if a dotted key runs through an
    /// existing field that is not a document.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) -> TesseraResult<()> {
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(TesseraError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();
        match key.split_once(FIELD_SEPARATOR) {
            None => {
                self.data.insert(key.to_string(), value);
                Ok(())
            }
            Some((head, rest)) => {
                let mut nested = match self.data.get(head) {
                    Some(Value::Document(existing)) => existing.clone(),
                    Some(Value::Null) | None => Document::new(),
                    Some(other) => {
                        log::error!("Field {} holds {} and cannot be embedded into", head, other);
                        return Err(TesseraError::new(
                            &format!("Field {} is not a document", head),
                            ErrorKind::InvalidOperation,
                        ));
                    }
                };
                nested.put(rest, value)?;
                self.data.insert(head.to_string(), Value::Document(nested));
                Ok(())
            }
        }
    }

    /// Returns the value at `key`, walking embedded documents for dotted
    /// keys. Missing fields yield `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value);
        }

        let (head, rest) = key.split_once(FIELD_SEPARATOR)?;
        match self.data.get(head) {
            Some(Value::Document(nested)) => nested.get(rest),
            _ => None,
        }
    }

    /// Returns the `_id` field, if present.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    /// Removes the value at `key` and returns it.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.data.remove(key) {
            return Some(value);
        }

        let (head, rest) = key.split_once(FIELD_SEPARATOR)?;
        let mut nested = match self.data.get(head) {
            Some(Value::Document(nested)) => nested.clone(),
            _ => return None,
        };
        let removed = nested.remove(rest);
        if removed.is_some() {
            self.data.insert(head.to_string(), Value::Document(nested));
        }
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Top-level field names in key order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Copies every top-level field of `other` into this document,
    /// overwriting fields that already exist.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            self.data.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// ```rust
/// use tessera::doc;
///
/// let empty = doc!{};
/// let user = doc!{
///     name: "Alice",
///     age: 30,
///     address: {
///         city: "Pune",
///     },
///     tags: ["admin", "user"]
/// };
/// assert_eq!(user.size(), 4);
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::common::Document::new()
    };

    () => {
        $crate::common::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::common::Document::new();
            $(
                doc.put(&$crate::common::normalize(stringify!($key)), $crate::doc_value!($value))
                .expect(&format!("Failed to put value {} in document", stringify!($value)));
            )*
            doc
        }
    };
}

/// Helper macro converting the values of a [doc!] literal.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
