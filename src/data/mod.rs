//! Storage engine: the two ring tiers, their segment handles, and the coordinator.
pub mod async_io;
pub mod backing_ring;
pub mod coordinator;
pub mod memory_ring;
pub mod segment;
