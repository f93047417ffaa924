use crate::common::{Document, Value, DOC_ID};
use crate::errors::TesseraResult;
use std::any::Any;
use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::sync::Arc;

use super::{AllFilter, AndFilter, EqualsFilter, OrFilter};

/// Evaluates a predicate on a document.
///
/// Store bindings that push predicates down to a native query language
/// can inspect a filter through `field_name`, `field_value` and
/// `logical_filters` instead of calling `apply`.
pub trait FilterProvider: Any + Send + Sync + Display {
    /// Returns `Ok(true)` if the document matches.
    fn apply(&self, entry: &Document) -> TesseraResult<bool>;

    /// The field this filter tests, if it tests a single field.
    fn field_name(&self) -> Option<&str> {
        None
    }

    /// The operand this filter compares against, if it has exactly one.
    fn field_value(&self) -> Option<&Value> {
        None
    }

    /// The operands of a logical filter.
    fn logical_filters(&self) -> Option<&[Filter]> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A document predicate.
///
/// Cloning is cheap; all clones share the same provider.
#[derive(Clone)]
pub struct Filter {
    inner: Arc<dyn FilterProvider>,
}

impl Filter {
    pub fn new<T: FilterProvider + 'static>(inner: T) -> Self {
        Filter {
            inner: Arc::new(inner),
        }
    }

    /// Combines this filter with another using logical AND.
    pub fn and(&self, filter: Filter) -> Self {
        Filter::new(AndFilter::new(vec![self.clone(), filter]))
    }

    /// Combines this filter with another using logical OR.
    pub fn or(&self, filter: Filter) -> Self {
        Filter::new(OrFilter::new(vec![self.clone(), filter]))
    }

    pub fn is_all(&self) -> bool {
        self.as_any().is::<AllFilter>()
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter{}", self.inner)
    }
}

impl Deref for Filter {
    type Target = Arc<dyn FilterProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Matches every document.
pub fn all() -> Filter {
    Filter::new(AllFilter)
}

/// Matches the document whose `_id` equals `id`.
pub fn by_id<T: Into<Value>>(id: T) -> Filter {
    Filter::new(EqualsFilter::new(DOC_ID.to_string(), id.into()))
}

/// Matches documents satisfying all of `filters`. An empty list matches
/// everything.
pub fn and(filters: Vec<Filter>) -> Filter {
    if filters.is_empty() {
        return all();
    }
    if filters.len() == 1 {
        return filters[0].clone();
    }
    Filter::new(AndFilter::new(filters))
}

/// Matches documents satisfying at least one of `filters`.
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::new(OrFilter::new(filters))
}
