//! Write batching.
//!
//! Nodes staged with [Batcher::add_batch] are held until the configured
//! [BatchSize] is reached or the batch is executed explicitly. Execution
//! walks the staged nodes in order and fires the pre-write event for
//! each dirty node. Removals are deleted immediately. Updates and
//! large-object writes run as they are met. Inserts are grouped by
//! collection and sent as one bulk insert per collection once every node
//! has been visited. Execution is not atomic: a failure leaves earlier
//! writes in place.

mod batcher;
mod dispatcher;

pub use batcher::*;
pub use dispatcher::*;
