use indexmap::IndexMap;

use crate::batch::{BatchReport, BatchSize, BatchWriter, NodeWrite};
use crate::common::Document;
use crate::errors::TesseraResult;
use crate::graph::Node;

/// Queue of staged nodes and the algorithm that drains it.
#[derive(Debug, Default)]
pub struct BatchDispatcher {
    batch_size: BatchSize,
    nodes: Vec<Node>,
}

impl BatchDispatcher {
    pub fn new(batch_size: BatchSize) -> Self {
        BatchDispatcher {
            batch_size,
            nodes: Vec::new(),
        }
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `node`. When the queue reaches the batch size it is
    /// executed through `writer` and cleared, and the report is returned.
    pub fn add_batch(
        &mut self,
        node: Node,
        writer: &dyn BatchWriter,
    ) -> TesseraResult<Option<BatchReport>> {
        self.nodes.push(node);
        if self.batch_size.is_reached(self.nodes.len()) {
            log::debug!("Batch size {} reached, executing batch", self.batch_size);
            let report = self.execute_batch_with_report(writer)?;
            return Ok(Some(report));
        }
        Ok(None)
    }

    /// Writes every dirty node and returns the number of distinct
    /// collections bulk inserted.
    pub fn execute_batch(&mut self, writer: &dyn BatchWriter) -> TesseraResult<usize> {
        Ok(self.execute_batch_with_report(writer)?.collections)
    }

    /// Writes every dirty node, in staging order.
    ///
    /// Removals, updates and large objects are written as their node is
    /// visited and the node is marked clean. Inserts are grouped and sent
    /// as one bulk insert per collection; their nodes are marked clean only
    /// once every bulk insert succeeded.
    ///
    /// When a node fails, the inserts grouped before it are still sent and
    /// the error is returned. The queue is kept so a later execution
    /// retries the nodes still dirty. Insert nodes whose bulk insert failed
    /// are retried as updates, which insert the rows still missing.
    pub fn execute_batch_with_report(
        &mut self,
        writer: &dyn BatchWriter,
    ) -> TesseraResult<BatchReport> {
        let mut report = BatchReport::default();
        let mut inserts: IndexMap<String, Vec<Document>> = IndexMap::new();
        let mut grouped = Vec::new();
        let mut failure = None;

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if !node.is_dirty() {
                continue;
            }

            match write_node(node, writer, &mut report, &mut inserts) {
                Ok(true) => grouped.push(index),
                Ok(false) => node.clear_dirty(),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            report.nodes += 1;
        }

        let inserted = bulk_insert_all(inserts, writer, &mut report);
        for index in grouped {
            let node = &mut self.nodes[index];
            if inserted.is_ok() {
                node.clear_dirty();
            } else {
                node.mark_dirty(true);
            }
        }

        match (failure, inserted) {
            (Some(e), Ok(_)) => Err(e),
            (Some(e), Err(insert_error)) => {
                log::error!("Bulk insert after failed node also failed: {}", insert_error);
                Err(e)
            }
            (None, Err(e)) => Err(e),
            (None, Ok(_)) => {
                self.nodes.clear();
                Ok(report)
            }
        }
    }

    /// Swaps the queued node with the same key for `node`, so the queue
    /// holds one write per entity. A queued insert not yet written stays
    /// an insert. Returns `false` if no such node is queued.
    pub fn replace(&mut self, mut node: Node) -> bool {
        let key = node.key();
        match self.nodes.iter_mut().find(|queued| queued.key() == key) {
            Some(queued) => {
                if queued.is_dirty() && !queued.is_update() {
                    node.reset_update();
                }
                *queued = node;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Writes one node and reports whether its documents joined the insert
/// groups. A node's documents are grouped only after its post-write event
/// fired.
fn write_node(
    node: &Node,
    writer: &dyn BatchWriter,
    report: &mut BatchReport,
    inserts: &mut IndexMap<String, Vec<Document>>,
) -> TesseraResult<bool> {
    node.handle_pre_event(writer.entity_events())?;
    let write = writer.stage_node(node)?;
    node.handle_post_event(writer.entity_events())?;

    match write {
        NodeWrite::Insert(documents) => {
            for (collection, document) in documents {
                inserts.entry(collection).or_default().push(document);
            }
            return Ok(true);
        }
        NodeWrite::Updated(count) => report.updated += count,
        NodeWrite::Deleted(count) => report.deleted += count,
        NodeWrite::LargeObject => report.large_objects += 1,
    }
    Ok(false)
}

fn bulk_insert_all(
    inserts: IndexMap<String, Vec<Document>>,
    writer: &dyn BatchWriter,
    report: &mut BatchReport,
) -> TesseraResult<()> {
    for (collection, documents) in inserts {
        report.inserted += writer.bulk_insert(&collection, documents)?;
        report.collections += 1;
    }
    Ok(())
}
