//! Row-level data conversion: scalar matrix, array literals, synthetic
//! keys, and the per-table driving loop.

pub mod array;
pub mod engine;
pub mod scalar;
pub mod synth;

pub use array::convert_array;
pub use engine::{run_table, RowConverter, RowOutcome, TableStats};
pub use scalar::convert_scalar;
pub use synth::{bit_reverse, SyntheticKeyState};
