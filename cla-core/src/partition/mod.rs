//! Variable partition: which variables are basic (IN) and which sit at a
//! bound (OUT).

pub mod ordered_set;
pub mod variables;

pub use ordered_set::OrderedIndexSet;
pub use variables::{BoundSide, VarState, VariablePartition};
