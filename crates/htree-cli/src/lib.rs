//! Library half of the demo CLI: the in-memory "Warehouse" fixture, kept
//! separate from `main.rs` so integration tests can drive it directly
//! instead of shelling out to the binary.

pub mod fixture;
