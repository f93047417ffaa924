use crate::common::Value;

use super::{EqualsFilter, Filter, InFilter, NotEqualsFilter};

/// Starts a filter on `field_name`.
pub fn field(field_name: &str) -> FluentFilter {
    FluentFilter {
        field_name: field_name.to_string(),
    }
}

pub struct FluentFilter {
    field_name: String,
}

impl FluentFilter {
    #[inline]
    pub fn eq<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(EqualsFilter::new(self.field_name, value.into()))
    }

    #[inline]
    pub fn ne<T: Into<Value>>(self, value: T) -> Filter {
        Filter::new(NotEqualsFilter::new(self.field_name, value.into()))
    }

    /// Matches documents whose field equals any of `values`.
    #[inline]
    pub fn in_array(self, values: Vec<Value>) -> Filter {
        Filter::new(InFilter::new(self.field_name, values))
    }
}
