//! Redistribution policies.
//!
//! - `batch`: fixed-size sequential batching, plus its partitioned parallel form
//! - `bins`: label routing, one independent unit per input file

pub mod batch;
pub mod bins;

pub use batch::{
    execute_assignment, plan_batches, repackage_batches, repackage_batches_parallel,
    BatchAssignment, BatchCursor, BatchOptions, BatchPlan, SourceSlice,
};
pub use bins::{bin_input, destination_path, group_by_label, DestinationLocks};
