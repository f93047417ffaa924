use crate::common::Value;

/// Shape of the result a native script produces, decided by its
/// trailing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// `findOne`, `findAndModify`
    Single,
    /// `find`, `aggregate`
    Multiple,
    /// `count`, `dataSize`, `storageSize`, `totalIndexSize`, `totalSize`
    Scalar,
    /// `distinct` and anything else
    Raw,
}

impl QueryKind {
    pub fn of(script: &str) -> QueryKind {
        match trailing_call(script) {
            Some("findOne") | Some("findAndModify") => QueryKind::Single,
            Some("find") | Some("aggregate") => QueryKind::Multiple,
            Some("count") | Some("dataSize") | Some("storageSize") | Some("totalIndexSize")
            | Some("totalSize") => QueryKind::Scalar,
            _ => QueryKind::Raw,
        }
    }
}

/// Name of the last top-level method call in `script`, ignoring a
/// trailing `toArray()`.
pub fn trailing_call(script: &str) -> Option<&str> {
    let bytes = script.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut last = None;

    for (position, &byte) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if byte == q {
                quote = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' => quote = Some(byte),
            b'(' => {
                if depth == 0 {
                    let start = script[..position]
                        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                        .map(|i| i + 1)
                        .unwrap_or(0);
                    let name = &script[start..position];
                    if !name.is_empty() && name != "toArray" {
                        last = Some(name);
                    }
                }
                depth += 1;
            }
            b')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    last
}

/// Result of [DocumentClient::load_data](crate::client::DocumentClient::load_data).
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedData<E> {
    Count(u64),
    Entities(Vec<E>),
}

/// Result of [DocumentClient::execute_native_query](crate::client::DocumentClient::execute_native_query).
#[derive(Debug, Clone, PartialEq)]
pub enum NativeQueryResult<E> {
    Entity(Option<E>),
    Entities(Vec<E>),
    Scalar(Value),
    Values(Vec<Value>),
}
