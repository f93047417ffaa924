use indexmap::IndexMap;

use crate::common::Value;

/// Whether join rows are to be written or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinTableOperation {
    #[default]
    Insert,
    Delete,
}

/// Rows of a many-to-many join table, grouped by owning id.
///
/// Each (parent, child) pair becomes one row holding the parent under the
/// join column and the child under the inverse join column. A row's `_id`
/// is the parent id followed by the child id.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTableData {
    table_name: String,
    join_column: String,
    inverse_join_column: String,
    operation: JoinTableOperation,
    entries: IndexMap<Value, Vec<Value>>,
}

impl JoinTableData {
    pub fn new(
        table_name: &str,
        join_column: &str,
        inverse_join_column: &str,
        operation: JoinTableOperation,
    ) -> Self {
        JoinTableData {
            table_name: table_name.to_string(),
            join_column: join_column.to_string(),
            inverse_join_column: inverse_join_column.to_string(),
            operation,
            entries: IndexMap::new(),
        }
    }

    pub fn add_entry(&mut self, parent_id: Value, child_ids: Vec<Value>) {
        self.entries.entry(parent_id).or_default().extend(child_ids);
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn join_column(&self) -> &str {
        &self.join_column
    }

    pub fn inverse_join_column(&self) -> &str {
        &self.inverse_join_column
    }

    pub fn operation(&self) -> JoinTableOperation {
        self.operation
    }

    pub fn entries(&self) -> &IndexMap<Value, Vec<Value>> {
        &self.entries
    }

    /// Every (parent, child) pair, in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries
            .iter()
            .flat_map(|(parent, children)| children.iter().map(move |child| (parent, child)))
    }

    pub fn row_id(parent: &Value, child: &Value) -> String {
        format!("{}{}", parent.to_plain_string(), child.to_plain_string())
    }
}
