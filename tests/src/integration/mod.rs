//! Integration scenarios over the in-memory log store.

pub mod lifecycle;
pub mod projections;
pub mod round_trip;
