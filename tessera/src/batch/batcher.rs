use indexmap::IndexMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::common::Document;
use crate::errors::{ErrorKind, TesseraError, TesseraResult};
use crate::graph::{EntityEventBus, Node};

/// Threshold at which staged nodes are written automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BatchSize {
    /// Nodes are only written on explicit execution.
    #[default]
    Unbounded,
    Bounded(usize),
}

impl BatchSize {
    /// Creates a bounded batch size.
    ///
    /// # Errors
    ///
    /// A size of `0` is a `ConfigurationError`.
    pub fn new(size: usize) -> TesseraResult<BatchSize> {
        if size == 0 {
            log::error!("Batch size must be greater than zero");
            return Err(TesseraError::new(
                "Batch size must be greater than zero",
                ErrorKind::ConfigurationError,
            ));
        }
        Ok(BatchSize::Bounded(size))
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            BatchSize::Unbounded => None,
            BatchSize::Bounded(size) => Some(*size),
        }
    }

    /// Whether a queue of `pending` nodes must be executed.
    pub fn is_reached(&self, pending: usize) -> bool {
        matches!(self, BatchSize::Bounded(size) if pending >= *size)
    }
}

impl FromStr for BatchSize {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let size = s.trim().parse::<usize>().map_err(|e| {
            log::error!("Invalid batch size {}: {}", s, e);
            TesseraError::new(
                &format!("Invalid batch size {}", s),
                ErrorKind::ConfigurationError,
            )
        })?;
        BatchSize::new(size)
    }
}

impl Display for BatchSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchSize::Unbounded => write!(f, "unbounded"),
            BatchSize::Bounded(size) => write!(f, "{}", size),
        }
    }
}

/// Row counts of one batch execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Distinct collections that received a bulk insert.
    pub collections: usize,
    /// Dirty nodes written.
    pub nodes: usize,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub large_objects: u64,
}

/// What a single node's write turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeWrite {
    /// Documents to bulk insert, keyed by collection.
    Insert(IndexMap<String, Document>),
    Updated(u64),
    Deleted(u64),
    LargeObject,
}

/// Store-facing half of batch execution.
pub trait BatchWriter {
    fn entity_events(&self) -> &EntityEventBus;

    /// Performs the immediate part of a node's write. Inserts are returned
    /// for grouping instead of being written.
    fn stage_node(&self, node: &Node) -> TesseraResult<NodeWrite>;

    fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> TesseraResult<u64>;
}

/// Staging interface for writes.
pub trait Batcher {
    /// Stages `node`, executing the batch when the threshold is reached.
    fn add_batch(&self, node: Node) -> TesseraResult<()>;

    /// Writes every staged dirty node and returns the number of distinct
    /// collections bulk inserted.
    fn execute_batch(&self) -> TesseraResult<usize>;

    fn execute_batch_with_report(&self) -> TesseraResult<BatchReport>;

    /// Replaces the staged node of the same entity. Returns `false` if the
    /// entity has nothing staged.
    fn replace(&self, node: Node) -> bool;

    /// Drops staged nodes without writing them.
    fn clear(&self);

    fn batch_size(&self) -> BatchSize;

    /// Number of staged nodes.
    fn pending(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_batch_size_is_configuration_error() {
        let err = BatchSize::new(0).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_parse_batch_size() {
        assert_eq!("25".parse::<BatchSize>().unwrap(), BatchSize::Bounded(25));
        assert_eq!(" 2 ".parse::<BatchSize>().unwrap(), BatchSize::Bounded(2));
        assert_eq!(
            "0".parse::<BatchSize>().unwrap_err().kind(),
            &ErrorKind::ConfigurationError
        );
        assert_eq!(
            "ten".parse::<BatchSize>().unwrap_err().kind(),
            &ErrorKind::ConfigurationError
        );
    }

    #[test]
    fn test_threshold() {
        assert!(!BatchSize::Unbounded.is_reached(10_000));
        assert!(!BatchSize::Bounded(2).is_reached(1));
        assert!(BatchSize::Bounded(2).is_reached(2));
        assert_eq!(BatchSize::Bounded(3).limit(), Some(3));
        assert_eq!(BatchSize::Unbounded.to_string(), "unbounded");
    }
}
