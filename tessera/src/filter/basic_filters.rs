use std::any::Any;
use std::fmt::Display;

use crate::common::{Document, Value};
use crate::errors::TesseraResult;

use super::FilterProvider;

pub(crate) struct AllFilter;

impl FilterProvider for AllFilter {
    fn apply(&self, _entry: &Document) -> TesseraResult<bool> {
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Display for AllFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{}}")
    }
}

/// Matches documents whose field equals a value. A missing field is
/// compared as `null`.
pub(crate) struct EqualsFilter {
    field_name: String,
    field_value: Value,
}

impl EqualsFilter {
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        EqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for EqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} == {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for EqualsFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> TesseraResult<bool> {
        let value = entry.get(&self.field_name).unwrap_or(&Value::Null);
        Ok(value == &self.field_value)
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) struct NotEqualsFilter {
    field_name: String,
    field_value: Value,
}

impl NotEqualsFilter {
    pub(crate) fn new(field_name: String, field_value: Value) -> Self {
        NotEqualsFilter {
            field_name,
            field_value,
        }
    }
}

impl Display for NotEqualsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} != {})", self.field_name, self.field_value)
    }
}

impl FilterProvider for NotEqualsFilter {
    fn apply(&self, entry: &Document) -> TesseraResult<bool> {
        let value = entry.get(&self.field_name).unwrap_or(&Value::Null);
        Ok(value != &self.field_value)
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn field_value(&self) -> Option<&Value> {
        Some(&self.field_value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Matches documents whose field equals any of a set of values.
pub(crate) struct InFilter {
    field_name: String,
    field_values: Vec<Value>,
}

impl InFilter {
    pub(crate) fn new(field_name: String, field_values: Vec<Value>) -> Self {
        InFilter {
            field_name,
            field_values,
        }
    }
}

impl Display for InFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .field_values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({} in [{}])", self.field_name, values)
    }
}

impl FilterProvider for InFilter {
    #[inline]
    fn apply(&self, entry: &Document) -> TesseraResult<bool> {
        let value = entry.get(&self.field_name).unwrap_or(&Value::Null);
        Ok(self.field_values.iter().any(|candidate| candidate == value))
    }

    fn field_name(&self) -> Option<&str> {
        Some(&self.field_name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
