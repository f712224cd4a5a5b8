pub mod coerce;
pub mod rows;
pub mod shape;

pub use rows::RowSet;
pub use shape::{normalize_level_counts, FieldCandidates, WireShape};
