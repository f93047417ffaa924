use crate::common::{Document, Value};
use crate::errors::{ErrorKind, TesseraError, TesseraResult};

/// Conversion between a Rust type and a document [Value].
///
/// Entities derive this with `#[derive(Convertible)]`; the derive maps
/// every named field to a document field of the same name.
pub trait Convertible: Sized {
    fn to_value(&self) -> TesseraResult<Value>;
    fn from_value(value: &Value) -> TesseraResult<Self>;
}

/// Converts a [Value] into `T`.
pub fn from_value<T: Convertible>(value: &Value) -> TesseraResult<T> {
    T::from_value(value)
}

/// Converts a [Value] into `T`, treating a missing field as `Null`.
pub fn field_value<T: Convertible>(doc: &Document, field: &str) -> TesseraResult<T> {
    match doc.get(field) {
        Some(value) => T::from_value(value),
        None => T::from_value(&Value::Null).map_err(|e| {
            TesseraError::new_with_cause(
                &format!("Missing field {}", field),
                ErrorKind::ObjectMappingError,
                e,
            )
        }),
    }
}

fn mapping_error(value: &Value, expected: &str) -> TesseraError {
    log::error!("Value {} is not {}", value, expected);
    TesseraError::new(
        &format!("Value is not {}", expected),
        ErrorKind::ObjectMappingError,
    )
}

impl Convertible for bool {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value.as_bool().ok_or_else(|| mapping_error(value, "a bool"))
    }
}

impl Convertible for i32 {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::I32(*self))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_integer()
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| mapping_error(value, "an i32"))
    }
}

impl Convertible for i64 {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::I64(*self))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_integer()
            .and_then(|i| i64::try_from(i).ok())
            .ok_or_else(|| mapping_error(value, "an i64"))
    }
}

impl Convertible for u32 {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::I64(*self as i64))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_integer()
            .and_then(|i| u32::try_from(i).ok())
            .ok_or_else(|| mapping_error(value, "a u32"))
    }
}

impl Convertible for u64 {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::U64(*self))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .ok_or_else(|| mapping_error(value, "a u64"))
    }
}

impl Convertible for f64 {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::F64(*self))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value.as_decimal().ok_or_else(|| mapping_error(value, "an f64"))
    }
}

impl Convertible for String {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mapping_error(value, "a string"))
    }
}

impl Convertible for Document {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        value
            .as_document()
            .cloned()
            .ok_or_else(|| mapping_error(value, "a document"))
    }
}

impl Convertible for Value {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        Ok(value.clone())
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn to_value(&self) -> TesseraResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Convertible> Convertible for Vec<T> {
    fn to_value(&self) -> TesseraResult<Value> {
        let mut values = Vec::with_capacity(self.len());
        for item in self {
            values.push(item.to_value()?);
        }
        Ok(Value::Array(values))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(mapping_error(other, "an array")),
        }
    }
}

/// Binary payload of an entity field.
///
/// Stored as [Value::Bytes]. A field of this type is what an entity's
/// `lob` attribute points at.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Blob(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Convertible for Blob {
    fn to_value(&self) -> TesseraResult<Value> {
        Ok(Value::Bytes(self.0.clone()))
    }

    fn from_value(value: &Value) -> TesseraResult<Self> {
        match value {
            Value::Bytes(bytes) => Ok(Blob(bytes.clone())),
            Value::Null => Ok(Blob::default()),
            other => Err(mapping_error(other, "binary data")),
        }
    }
}
