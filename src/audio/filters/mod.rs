//! Sample-domain filters.

pub mod tempo;

pub use tempo::{TempoFilter, TempoState, TempoStats};
